pub mod config;
pub mod dispatch;
pub mod error;
pub mod indicator;
pub mod lifecycle;
pub mod mocks;
pub mod navigator;
pub mod ports;
pub mod router;
pub mod sample_log;
pub mod sampler;
pub mod topics;
pub mod types;

pub use config::{
    DehydratorConfig, IndicatorConfig, LifecycleConfig, NavigatorConfig, NetworkConfig,
    PlantHostConfig, SamplerConfig,
};
pub use dispatch::{LifecycleDispatcher, SampleQueryDispatcher};
pub use error::{ConfigError, LifecycleError, PortError};
pub use indicator::StatusIndicator;
pub use lifecycle::{LifecycleController, LifecycleEngine, TurnOffOutcome, TurnOnOutcome};
pub use navigator::{InputEvent, Navigator};
pub use ports::{ActuatorPort, Clock, DisplayPort, LedPort, MenuPort, MenuValue, Sensor, SystemClock};
pub use router::{DeviceEvent, EventBus, EventRouter};
pub use sample_log::SampleLog;
pub use sampler::PeriodicSampler;
pub use topics::*;
pub use types::{
    CommandResult, IndicatorState, LifecycleSnapshot, NavigatorMode, ProcessState, Rgb,
    SampleRecord, StatusView, SENTINEL_READING, SENTINEL_STATUS,
};
