use thiserror::Error;

/// A capability collaborator (sensor, LED, display) failed.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("sensor read failed: {0}")]
    Read(String),
    #[error("render failed: {0}")]
    Render(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("target temperature {0} is not a finite value")]
    InvalidTarget(f32),
    #[error("cannot start while cooling down")]
    CoolingDown,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown timezone {0:?}")]
    Timezone(String),
}
