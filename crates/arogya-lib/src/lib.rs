pub mod acquisition;
pub mod buffer;
pub mod config;
pub mod error;
pub mod export;
pub mod monitor;
pub mod registry;
pub mod source;
pub mod vitals;

pub use acquisition::Acquisition;
pub use buffer::RingBuffer;
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use monitor::Monitor;
