//! Test doubles shared by the behavioural suites.

mod config_loader;
mod device_service;
mod reporter;
mod session;
mod signals;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use device_service::{RecordingDeviceService, descriptor};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use session::{RecordingSession, SessionCall};
pub use signals::ScriptedSignals;
