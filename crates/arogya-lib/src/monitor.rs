use log::{debug, info};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::buffer::RingBuffer;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::export::HistoryExport;
use crate::registry::{PatientRecord, PatientRegistry, VitalsRecord};
use crate::vitals::{
    ecg_summary, evaluate_alerts, AlertThresholds, RandomVitals, VitalsReport, VitalsSynth,
};

/// Monitoring flag and patient table, always read and written together.
#[derive(Debug, Default)]
struct Session {
    monitoring: bool,
    registry: PatientRegistry,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorLimits {
    pub buffer_capacity: usize,
    pub snapshot_len: usize,
    pub history_len: usize,
}

impl Default for MonitorLimits {
    fn default() -> Self {
        Self {
            buffer_capacity: 500,
            snapshot_len: 100,
            history_len: 5,
        }
    }
}

/// Shared state for one bedside monitor: the sample buffer fed by the
/// acquisition loop, and the session state touched by request handling.
///
/// Lock order is session, then buffer, then synthesiser. The acquisition
/// loop releases the session lock before appending to the buffer.
pub struct Monitor {
    session: Mutex<Session>,
    buffer: RingBuffer,
    synth: Mutex<Box<dyn VitalsSynth>>,
    thresholds: AlertThresholds,
    limits: MonitorLimits,
}

impl Monitor {
    pub fn new(
        limits: MonitorLimits,
        thresholds: AlertThresholds,
        synth: Box<dyn VitalsSynth>,
    ) -> Self {
        Self {
            session: Mutex::new(Session::default()),
            buffer: RingBuffer::new(limits.buffer_capacity),
            synth: Mutex::new(synth),
            thresholds,
            limits,
        }
    }

    pub fn from_config(cfg: &MonitorConfig) -> Self {
        let limits = MonitorLimits {
            buffer_capacity: cfg.buffer_capacity,
            snapshot_len: cfg.snapshot_len,
            history_len: cfg.history_len,
        };
        Self::new(
            limits,
            cfg.thresholds,
            Box::new(RandomVitals::new(cfg.seed)),
        )
    }

    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    pub fn limits(&self) -> MonitorLimits {
        self.limits
    }

    pub fn start_monitoring(&self) {
        self.session().monitoring = true;
        info!("monitoring started");
    }

    pub fn stop_monitoring(&self) {
        self.session().monitoring = false;
        info!("monitoring stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.session().monitoring
    }

    pub fn register_patient(&self, name: &str, age: u32, sex: &str) -> String {
        self.session().registry.register(name, age, sex)
    }

    pub fn lookup_patient(&self, id: &str) -> Result<PatientRecord, MonitorError> {
        self.session().registry.lookup(id).cloned()
    }

    pub fn current_patient(&self) -> Result<PatientRecord, MonitorError> {
        self.session().registry.current().cloned()
    }

    pub fn patient_count(&self) -> usize {
        self.session().registry.len()
    }

    /// Produce a vitals report for the current patient and append it to the
    /// patient's history. Without a current patient nothing is recorded.
    pub fn compute_vitals(&self) -> Result<VitalsReport, MonitorError> {
        let mut session = self.session();
        let patient_name = session.registry.current()?.name.clone();

        let vitals = self.synth().sample();
        let ecg_signal = self.buffer.snapshot(self.limits.snapshot_len);
        let record = VitalsRecord::new(unix_now(), &vitals, ecg_summary(&ecg_signal));
        let patient = session
            .registry
            .record_vitals(record, self.limits.history_len)?;
        let alerts = evaluate_alerts(&vitals, &self.thresholds);
        debug!(
            "vitals for patient {}: {:?} ({} ecg samples, alerts {:?})",
            patient.id,
            vitals,
            ecg_signal.len(),
            alerts
        );
        Ok(VitalsReport {
            patient_name,
            heart_rate: vitals.heart_rate,
            spo2: vitals.spo2,
            temperature: vitals.temperature,
            respiratory_rate: vitals.respiratory_rate,
            ecg_signal,
            alerts,
            history: patient.history.clone(),
        })
    }

    pub fn export_history(&self) -> Result<HistoryExport, MonitorError> {
        let session = self.session();
        let patient = session.registry.current()?;
        Ok(HistoryExport::from_patient(patient))
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn synth(&self) -> MutexGuard<'_, Box<dyn VitalsSynth>> {
        self.synth.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vitals::{Alert, FixedVitals, VitalSigns};

    fn vitals(heart_rate: u32, spo2: u32, temperature: f64) -> VitalSigns {
        VitalSigns {
            heart_rate,
            spo2,
            temperature,
            respiratory_rate: 16,
        }
    }

    fn fixed_monitor(queue: Vec<VitalSigns>) -> Monitor {
        Monitor::new(
            MonitorLimits::default(),
            AlertThresholds::default(),
            Box::new(FixedVitals::new(queue)),
        )
    }

    #[test]
    fn vitals_without_patient_is_rejected_without_side_effects() {
        let monitor = fixed_monitor(vec![vitals(75, 97, 36.8)]);
        monitor.buffer().append(1.0);
        assert_eq!(
            monitor.compute_vitals().unwrap_err(),
            MonitorError::NoPatientSelected
        );
        assert_eq!(
            monitor.export_history().unwrap_err(),
            MonitorError::NoPatientSelected
        );
        assert_eq!(monitor.patient_count(), 0);
        assert_eq!(monitor.buffer().len(), 1);

        // the rejected call must not have consumed a synthesised reading
        monitor.register_patient("Asha", 34, "Female");
        let report = monitor.compute_vitals().unwrap();
        assert_eq!(report.heart_rate, 75);
        assert_eq!(report.history.len(), 1);
    }

    #[test]
    fn report_carries_snapshot_summary_and_alerts() {
        let monitor = fixed_monitor(vec![vitals(110, 98, 37.0)]);
        monitor.register_patient("Ravi", 61, "Male");
        for v in [1.0, 3.0, 2.0] {
            monitor.buffer().append(v);
        }
        let report = monitor.compute_vitals().unwrap();
        assert_eq!(report.patient_name, "Ravi");
        assert_eq!(report.ecg_signal, vec![1.0, 3.0, 2.0]);
        assert_eq!(report.alerts, vec![Alert::HeartRateAbnormal]);
        assert_eq!(report.history[0].ecg_summary, "1.0 - 3.0");
        assert_eq!(report.vitals(), vitals(110, 98, 37.0));
    }

    #[test]
    fn empty_buffer_uses_placeholder_summary() {
        let monitor = fixed_monitor(vec![vitals(75, 85, 39.0)]);
        monitor.register_patient("Asha", 34, "Female");
        let report = monitor.compute_vitals().unwrap();
        assert!(report.ecg_signal.is_empty());
        assert_eq!(report.history[0].ecg_summary, "-- - --");
        assert!(report.alerts.contains(&Alert::Spo2Low));
        assert!(report.alerts.contains(&Alert::TemperatureAbnormal));
    }

    #[test]
    fn snapshot_is_limited_to_most_recent_samples() {
        let monitor = fixed_monitor(vec![vitals(75, 97, 36.8)]);
        monitor.register_patient("Asha", 34, "Female");
        for i in 0..250 {
            monitor.buffer().append(i as f64);
        }
        let report = monitor.compute_vitals().unwrap();
        assert_eq!(report.ecg_signal.len(), 100);
        assert_eq!(report.ecg_signal[0], 150.0);
        assert_eq!(report.ecg_signal[99], 249.0);
    }

    #[test]
    fn history_is_capped_and_newest_first() {
        let queue = (0..9).map(|i| vitals(60 + i, 97, 36.8)).collect();
        let monitor = fixed_monitor(queue);
        monitor.register_patient("Asha", 34, "Female");
        let mut last = None;
        for _ in 0..9 {
            last = Some(monitor.compute_vitals().unwrap());
        }
        let report = last.unwrap();
        assert_eq!(report.history.len(), 5);
        let rates: Vec<u32> = report.history.iter().map(|r| r.heart_rate).collect();
        assert_eq!(rates, vec![68, 67, 66, 65, 64]);
        assert_eq!(monitor.current_patient().unwrap().history.len(), 5);
    }

    #[test]
    fn export_lists_history_newest_first() {
        let monitor = fixed_monitor(vec![vitals(70, 97, 36.8), vitals(80, 97, 36.8)]);
        let id = monitor.register_patient("Asha", 34, "Female");
        monitor.compute_vitals().unwrap();
        monitor.compute_vitals().unwrap();
        let export = monitor.export_history().unwrap();
        assert_eq!(export.patient_id, id);
        let rates: Vec<u32> = export.rows.iter().map(|r| r.heart_rate).collect();
        assert_eq!(rates, vec![80, 70]);
    }

    #[test]
    fn monitoring_flag_toggles() {
        let monitor = Monitor::default();
        assert!(!monitor.is_monitoring());
        monitor.start_monitoring();
        assert!(monitor.is_monitoring());
        monitor.stop_monitoring();
        assert!(!monitor.is_monitoring());
    }

    #[test]
    fn lookup_returns_registered_patient() {
        let monitor = Monitor::default();
        let id = monitor.register_patient("Asha", 34, "Female");
        let record = monitor.lookup_patient(&id).unwrap();
        assert_eq!(record.age, 34);
        assert_eq!(record.sex, "Female");
        assert!(matches!(
            monitor.lookup_patient("42"),
            Err(MonitorError::PatientNotFound(_))
        ));
    }
}
