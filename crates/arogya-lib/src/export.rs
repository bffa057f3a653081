use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::registry::{PatientRecord, VitalsRecord};

const HEADER: [&str; 6] = [
    "Time",
    "Heart Rate",
    "SpO2",
    "Temperature",
    "Respiratory Rate",
    "ECG",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub time: String,
    pub heart_rate: u32,
    pub spo2: u32,
    pub temperature: f64,
    pub respiratory_rate: u32,
    pub ecg: String,
}

impl ExportRow {
    pub fn from_record(record: &VitalsRecord) -> Self {
        Self {
            time: format_local_time(record.time),
            heart_rate: record.heart_rate,
            spo2: record.spo2,
            temperature: record.temperature,
            respiratory_rate: record.respiratory_rate,
            ecg: record.ecg_summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryExport {
    pub patient_id: String,
    pub rows: Vec<ExportRow>,
}

impl HistoryExport {
    pub fn from_patient(patient: &PatientRecord) -> Self {
        Self {
            patient_id: patient.id.clone(),
            rows: patient.history.iter().map(ExportRow::from_record).collect(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("patient_{}_data.csv", self.patient_id)
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        write_csv(&mut buf, &self.rows)?;
        String::from_utf8(buf).context("export is not valid UTF-8")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("creating export {}", path.display()))?;
        write_csv(file, &self.rows).with_context(|| format!("writing export {}", path.display()))
    }
}

/// `%Y-%m-%d %H:%M:%S` in the local timezone; falls back to the raw seconds.
pub fn format_local_time(epoch_secs: i64) -> String {
    match Local.timestamp_opt(epoch_secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => epoch_secs.to_string(),
    }
}

pub fn write_csv<W: Write>(writer: W, rows: &[ExportRow]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(&[
            row.time.clone(),
            row.heart_rate.to_string(),
            row.spo2.to_string(),
            format!("{:?}", row.temperature),
            row.respiratory_rate.to_string(),
            row.ecg.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
