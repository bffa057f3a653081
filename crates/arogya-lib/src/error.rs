use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Vitals or export requested before any patient was registered.
    #[error("No patient selected")]
    NoPatientSelected,
    #[error("patient {0} not found")]
    PatientNotFound(String),
}
