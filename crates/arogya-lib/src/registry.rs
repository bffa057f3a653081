use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MonitorError;
use crate::vitals::VitalSigns;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    /// Seconds since the Unix epoch.
    pub time: i64,
    pub heart_rate: u32,
    pub spo2: u32,
    pub temperature: f64,
    pub respiratory_rate: u32,
    pub ecg_summary: String,
}

impl VitalsRecord {
    pub fn new(time: i64, vitals: &VitalSigns, ecg_summary: String) -> Self {
        Self {
            time,
            heart_rate: vitals.heart_rate,
            spo2: vitals.spo2,
            temperature: vitals.temperature,
            respiratory_rate: vitals.respiratory_rate,
            ecg_summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub sex: String,
    /// Newest first.
    pub history: Vec<VitalsRecord>,
}

/// In-memory patient table plus the pointer to the active patient.
///
/// Not synchronised on its own; [`crate::Monitor`] keeps it behind its session lock.
#[derive(Debug, Default)]
pub struct PatientRegistry {
    patients: BTreeMap<String, PatientRecord>,
    current: Option<String>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers are `len + 1`, which stays unique only because patients
    /// are never removed.
    pub fn register(&mut self, name: &str, age: u32, sex: &str) -> String {
        let id = (self.patients.len() + 1).to_string();
        self.patients.insert(
            id.clone(),
            PatientRecord {
                id: id.clone(),
                name: name.to_string(),
                age,
                sex: sex.to_string(),
                history: Vec::new(),
            },
        );
        self.current = Some(id.clone());
        info!("registered patient {} ({})", id, name);
        id
    }

    pub fn lookup(&self, id: &str) -> Result<&PatientRecord, MonitorError> {
        self.patients
            .get(id)
            .ok_or_else(|| MonitorError::PatientNotFound(id.to_string()))
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Result<&PatientRecord, MonitorError> {
        let id = self.current.as_deref().ok_or(MonitorError::NoPatientSelected)?;
        self.lookup(id)
    }

    /// Prepend `record` to the current patient's history and keep the newest `cap`.
    pub fn record_vitals(
        &mut self,
        record: VitalsRecord,
        cap: usize,
    ) -> Result<&PatientRecord, MonitorError> {
        let id = self.current.as_deref().ok_or(MonitorError::NoPatientSelected)?;
        let patient = self
            .patients
            .get_mut(id)
            .ok_or_else(|| MonitorError::PatientNotFound(id.to_string()))?;
        patient.history.insert(0, record);
        patient.history.truncate(cap);
        Ok(patient)
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}
