use crate::config::{SourceConfig, SourceKind};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

const LINE_QUEUE: usize = 256;

/// Anything that can hand out one raw sensor reading at a time.
///
/// `None` means "nothing usable this cycle": no connection, a timeout, or a
/// line that does not parse as a number. Callers skip the cycle and retry.
pub trait SampleSource: Send {
    fn read(&mut self) -> Option<f64>;
}

impl SampleSource for Box<dyn SampleSource> {
    fn read(&mut self) -> Option<f64> {
        (**self).read()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl SampleSource for Disconnected {
    fn read(&mut self) -> Option<f64> {
        None
    }
}

/// Newline-delimited numeric readings from an arbitrary byte stream
/// (serial device node, TCP socket, replay file).
pub struct LineSource {
    lines: Receiver<String>,
    timeout: Duration,
}

impl LineSource {
    pub fn spawn<R>(label: &str, stream: R, timeout: Duration) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = bounded(LINE_QUEUE);
        let name = format!("sensor-reader:{label}");
        let thread_label = label.to_string();
        std::thread::Builder::new().name(name).spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) => {
                        info!("sensor stream {} reached EOF", thread_label);
                        break;
                    }
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&raw).into_owned();
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!("sensor stream {} read failed: {}", thread_label, err);
                        break;
                    }
                }
            }
        })?;
        Ok(Self { lines: rx, timeout })
    }
}

impl SampleSource for LineSource {
    fn read(&mut self) -> Option<f64> {
        let line = match self.lines.recv_timeout(self.timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
        };
        parse_sample(&line)
    }
}

/// Parse one sensor line; anything that is not a finite number is discarded.
pub fn parse_sample(line: &str) -> Option<f64> {
    let trimmed = line.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            debug!("discarding unparsable sensor line {:?}", trimmed);
            None
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedSource {
    queue: VecDeque<Option<f64>>,
}

impl ScriptedSource {
    pub fn new(readings: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(values.into_iter().map(Some))
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl SampleSource for ScriptedSource {
    fn read(&mut self) -> Option<f64> {
        self.queue.pop_front().flatten()
    }
}

// (phase center, amplitude, width) for P, Q, R, S, T.
const ECG_WAVES: [(f64, f64, f64); 5] = [
    (0.20, 5.0, 0.025),
    (0.37, -5.0, 0.010),
    (0.40, 35.0, 0.012),
    (0.43, -8.0, 0.010),
    (0.70, 10.0, 0.040),
];

/// Periodic ECG-like trace around a baseline of 50, for running without hardware.
pub struct SyntheticEcg {
    rng: StdRng,
    fs: f64,
    beat_period_s: f64,
    noise_sd: f64,
    index: u64,
}

impl SyntheticEcg {
    pub const BASELINE: f64 = 50.0;

    pub fn new(rate_bpm: f64, fs: f64, seed: u64) -> Self {
        let rate_bpm = if rate_bpm.is_finite() && rate_bpm > 0.0 {
            rate_bpm
        } else {
            72.0
        };
        Self {
            rng: StdRng::seed_from_u64(seed),
            fs: fs.max(1.0),
            beat_period_s: 60.0 / rate_bpm,
            noise_sd: 0.5,
            index: 0,
        }
    }

    fn clean_value(&self, t: f64) -> f64 {
        let phase = (t % self.beat_period_s) / self.beat_period_s;
        let wave: f64 = ECG_WAVES
            .iter()
            .map(|&(center, amp, width)| {
                amp * (-((phase - center).powi(2)) / (2.0 * width * width)).exp()
            })
            .sum();
        Self::BASELINE + wave
    }
}

impl SampleSource for SyntheticEcg {
    fn read(&mut self) -> Option<f64> {
        let t = self.index as f64 / self.fs;
        self.index += 1;
        let noise: f64 = self.rng.sample(StandardNormal);
        Some(self.clean_value(t) + noise * self.noise_sd)
    }
}

/// Open a sensor device node. A missing device degrades to [`Disconnected`].
pub fn open_device(path: &Path, timeout: Duration) -> Box<dyn SampleSource> {
    let label = path.display().to_string();
    let opened = File::open(path).and_then(|file| LineSource::spawn(&label, file, timeout));
    match opened {
        Ok(source) => {
            info!("sensor connected on {}", label);
            Box::new(source)
        }
        Err(err) => {
            warn!("sensor not connected ({}): {}", label, err);
            Box::new(Disconnected)
        }
    }
}

/// Connect to a sensor bridge that streams readings over TCP.
pub fn connect_tcp(addr: &str, timeout: Duration) -> Box<dyn SampleSource> {
    let connected =
        TcpStream::connect(addr).and_then(|stream| LineSource::spawn(addr, stream, timeout));
    match connected {
        Ok(source) => {
            info!("sensor connected via tcp {}", addr);
            Box::new(source)
        }
        Err(err) => {
            warn!("sensor not connected (tcp {}): {}", addr, err);
            Box::new(Disconnected)
        }
    }
}

/// Build the configured sample source. Never fails: unusable transports
/// fall back to [`Disconnected`].
pub fn open_source(cfg: &SourceConfig, seed: Option<u64>) -> Box<dyn SampleSource> {
    let timeout = Duration::from_millis(cfg.read_timeout_ms);
    match cfg.kind {
        SourceKind::Disconnected => {
            info!("no sensor configured; acquisition will idle");
            Box::new(Disconnected)
        }
        SourceKind::Synthetic => {
            info!("using synthetic ECG at {} bpm", cfg.synthetic_rate_bpm);
            Box::new(SyntheticEcg::new(
                cfg.synthetic_rate_bpm,
                cfg.synthetic_fs,
                seed.unwrap_or(0),
            ))
        }
        SourceKind::Device => match cfg.path.as_deref() {
            Some(path) => open_device(path, timeout),
            None => {
                warn!("device source selected without a path");
                Box::new(Disconnected)
            }
        },
        SourceKind::Tcp => match cfg.addr.as_deref() {
            Some(addr) => connect_tcp(addr, timeout),
            None => {
                warn!("tcp source selected without an address");
                Box::new(Disconnected)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    #[test]
    fn parse_sample_accepts_numbers_and_rejects_noise() {
        assert_eq!(parse_sample("512\r\n"), Some(512.0));
        assert_eq!(parse_sample("  1.25 "), Some(1.25));
        assert_eq!(parse_sample(""), None);
        assert_eq!(parse_sample("!leads off"), None);
        assert_eq!(parse_sample("NaN"), None);
    }

    #[test]
    fn line_source_skips_garbage_and_ends_quietly() {
        let data = Cursor::new(b"1.5\nabc\n2.0\n".to_vec());
        let mut source =
            LineSource::spawn("cursor", data, Duration::from_millis(500)).expect("spawn reader");
        assert_eq!(source.read(), Some(1.5));
        assert_eq!(source.read(), None);
        assert_eq!(source.read(), Some(2.0));
        assert_eq!(source.read(), None);
        assert_eq!(source.read(), None);
    }

    #[test]
    fn scripted_source_plays_back_in_order() {
        let mut source = ScriptedSource::new([Some(1.0), None, Some(3.0)]);
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.read(), Some(1.0));
        assert_eq!(source.read(), None);
        assert_eq!(source.read(), Some(3.0));
        assert_eq!(source.read(), None);
    }

    #[test]
    fn synthetic_ecg_stays_near_baseline_with_r_peaks() {
        let mut source = SyntheticEcg::new(60.0, 200.0, 7);
        let samples: Vec<f64> = (0..400).filter_map(|_| source.read()).collect();
        assert_eq!(samples.len(), 400);
        let max = samples.iter().cloned().fold(f64::MIN, f64::max);
        let min = samples.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max > SyntheticEcg::BASELINE + 25.0, "max {max}");
        assert!(min > SyntheticEcg::BASELINE - 15.0, "min {min}");
    }

    #[test]
    fn missing_device_falls_back_to_disconnected() {
        let path = PathBuf::from("/nonexistent/arogya/ttyACM9");
        let mut source = open_device(&path, Duration::from_millis(10));
        assert_eq!(source.read(), None);
    }
}
