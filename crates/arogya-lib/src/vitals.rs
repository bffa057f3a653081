use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::registry::VitalsRecord;

pub const EMPTY_ECG_SUMMARY: &str = "-- - --";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub heart_rate: u32,
    pub spo2: u32,
    pub temperature: f64,
    pub respiratory_rate: u32,
}

pub trait VitalsSynth: Send {
    fn sample(&mut self) -> VitalSigns;
}

/// Gaussian draws around clinical baselines, standing in for real sensors
/// until they are wired up.
pub struct RandomVitals {
    rng: StdRng,
}

impl RandomVitals {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::from_entropy(),
        }
    }

    fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        match Normal::new(mean, sd) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }
}

impl VitalsSynth for RandomVitals {
    fn sample(&mut self) -> VitalSigns {
        // Integer vitals truncate toward zero before clamping.
        let heart_rate = (self.normal(75.0, 5.0) as i64).max(1);
        let spo2 = (self.normal(97.0, 1.0) as i64).clamp(80, 100);
        let temperature = round_tenths(self.normal(36.8, 0.3));
        let respiratory_rate = (self.normal(16.0, 2.0) as i64).clamp(10, 25);
        VitalSigns {
            heart_rate: heart_rate as u32,
            spo2: spo2 as u32,
            temperature,
            respiratory_rate: respiratory_rate as u32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixedVitals {
    queue: Vec<VitalSigns>,
    next: usize,
}

impl FixedVitals {
    pub fn new(queue: Vec<VitalSigns>) -> Self {
        Self { queue, next: 0 }
    }
}

impl VitalsSynth for FixedVitals {
    fn sample(&mut self) -> VitalSigns {
        let idx = self.next.min(self.queue.len().saturating_sub(1));
        self.next += 1;
        self.queue.get(idx).copied().unwrap_or(VitalSigns {
            heart_rate: 75,
            spo2: 97,
            temperature: 36.8,
            respiratory_rate: 16,
        })
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `"{min} - {max}"` over the snapshot, or [`EMPTY_ECG_SUMMARY`].
pub fn ecg_summary(samples: &[f64]) -> String {
    let mut iter = samples.iter().copied();
    let first = match iter.next() {
        Some(first) => first,
        None => return EMPTY_ECG_SUMMARY.to_string(),
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    format!("{:?} - {:?}", min, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alert {
    #[serde(rename = "Heart Rate abnormal")]
    HeartRateAbnormal,
    #[serde(rename = "SpO2 low")]
    Spo2Low,
    #[serde(rename = "Temperature abnormal")]
    TemperatureAbnormal,
}

impl Alert {
    pub fn label(&self) -> &'static str {
        match self {
            Alert::HeartRateAbnormal => "Heart Rate abnormal",
            Alert::Spo2Low => "SpO2 low",
            Alert::TemperatureAbnormal => "Temperature abnormal",
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Clinical bands; a vital outside its band raises the matching [`Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub heart_rate_min: u32,
    pub heart_rate_max: u32,
    pub spo2_min: u32,
    pub temperature_min: f64,
    pub temperature_max: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heart_rate_min: 60,
            heart_rate_max: 100,
            spo2_min: 90,
            temperature_min: 36.0,
            temperature_max: 38.0,
        }
    }
}

/// Every alert whose predicate fires, in a fixed order. Predicates are
/// independent of each other.
pub fn evaluate_alerts(vitals: &VitalSigns, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if vitals.heart_rate < thresholds.heart_rate_min
        || vitals.heart_rate > thresholds.heart_rate_max
    {
        alerts.push(Alert::HeartRateAbnormal);
    }
    if vitals.spo2 < thresholds.spo2_min {
        alerts.push(Alert::Spo2Low);
    }
    if vitals.temperature < thresholds.temperature_min
        || vitals.temperature > thresholds.temperature_max
    {
        alerts.push(Alert::TemperatureAbnormal);
    }
    alerts
}

#[derive(Debug, Clone, Serialize)]
pub struct VitalsReport {
    pub patient_name: String,
    pub heart_rate: u32,
    pub spo2: u32,
    pub temperature: f64,
    pub respiratory_rate: u32,
    pub ecg_signal: Vec<f64>,
    pub alerts: Vec<Alert>,
    #[serde(rename = "last_5_records")]
    pub history: Vec<VitalsRecord>,
}

impl VitalsReport {
    pub fn vitals(&self) -> VitalSigns {
        VitalSigns {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            temperature: self.temperature,
            respiratory_rate: self.respiratory_rate,
        }
    }
}
