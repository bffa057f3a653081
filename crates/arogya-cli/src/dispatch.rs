use anyhow::{anyhow, Context, Result};
use arogya_lib::Monitor;
use log::info;
use serde_json::{json, Value};

pub struct Dispatcher<'a> {
    monitor: &'a Monitor,
}

impl<'a> Dispatcher<'a> {
    pub fn new(monitor: &'a Monitor) -> Self {
        Self { monitor }
    }

    pub fn supported_methods() -> &'static [&'static str] {
        &[
            "start_monitoring",
            "stop_monitoring",
            "set_patient",
            "vitals",
            "export",
            "patient",
            "status",
        ]
    }

    pub fn execute(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let params = params.unwrap_or_else(|| json!({}));
        match method {
            "start_monitoring" => {
                self.monitor.start_monitoring();
                Ok(json!({ "status": "Monitoring started" }))
            }
            "stop_monitoring" => {
                self.monitor.stop_monitoring();
                Ok(json!({ "status": "Monitoring stopped" }))
            }
            "set_patient" => {
                let name = Self::require_param_str(&params, "name")?;
                let age = Self::param_age(&params)?;
                let sex = params
                    .get("sex")
                    .and_then(|value| value.as_str())
                    .unwrap_or_default()
                    .to_string();
                let id = self.monitor.register_patient(&name, age, &sex);
                Ok(json!({ "status": "Patient set", "id": id, "name": name }))
            }
            "vitals" => {
                let report = self.monitor.compute_vitals()?;
                serde_json::to_value(report).context("serializing vitals report")
            }
            "export" => {
                let export = self.monitor.export_history()?;
                Ok(json!({
                    "file_name": export.file_name(),
                    "csv": export.to_csv_string()?,
                    "rows": export.rows,
                }))
            }
            "patient" => {
                let id = Self::require_param_str(&params, "id")?;
                let record = self.monitor.lookup_patient(&id)?;
                serde_json::to_value(record).context("serializing patient record")
            }
            "status" => Ok(json!({
                "monitoring": self.monitor.is_monitoring(),
                "patients": self.monitor.patient_count(),
                "buffered_samples": self.monitor.buffer().len(),
            })),
            _ => Err(anyhow!("unsupported method {}", method)),
        }
    }

    fn require_param_str(params: &Value, key: &str) -> Result<String> {
        params
            .get(key)
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .ok_or_else(|| anyhow!("parameter '{}' is required", key))
    }

    // Form inputs arrive as either numbers or numeric strings.
    fn param_age(params: &Value) -> Result<u32> {
        match params.get("age") {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| anyhow!("parameter 'age' must be a non-negative integer")),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(0),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u32>()
                .with_context(|| format!("parameter 'age' is not a number: {}", s)),
            Some(other) => Err(anyhow!("parameter 'age' has unsupported type: {}", other)),
        }
    }

    pub fn log_summary(&self) {
        info!("Supported methods: {:?}", Self::supported_methods());
        let limits = self.monitor.limits();
        info!(
            "Buffer capacity {} samples, {} per report, {} records of history",
            limits.buffer_capacity, limits.snapshot_len, limits.history_len
        );
    }
}
