//! Central event routing.
//!
//! Encoder/button callbacks, sensor change notifications and the network
//! layer all post [`DeviceEvent`]s into one [`EventBus`]; a single
//! [`EventRouter`] task consumes them in order, so input handling never
//! runs concurrently with itself.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::indicator::StatusIndicator;
use crate::lifecycle::LifecycleController;
use crate::navigator::{InputEvent, Navigator};
use crate::types::IndicatorState;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Input(InputEvent),
    TemperatureChanged(f32),
    /// The network layer is up; `address` is informational only.
    NetworkConnected { address: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::Sender<DeviceEvent>,
}

impl EventBus {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DeviceEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Returns false once the router has stopped.
    pub async fn post(&self, event: DeviceEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Non-blocking post for callers that must not wait; drops the event
    /// when the queue is full.
    pub fn try_post(&self, event: DeviceEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("event queue full, dropping {event:?}");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

pub struct EventRouter {
    indicator: StatusIndicator,
    navigator: Option<Arc<Navigator>>,
    lifecycle: Option<Arc<LifecycleController>>,
}

impl EventRouter {
    pub fn new(indicator: StatusIndicator) -> Self {
        Self {
            indicator,
            navigator: None,
            lifecycle: None,
        }
    }

    pub fn with_navigator(
        mut self,
        navigator: Arc<Navigator>,
        lifecycle: Arc<LifecycleController>,
    ) -> Self {
        self.navigator = Some(navigator);
        self.lifecycle = Some(lifecycle);
        self
    }

    pub async fn route(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Input(input) => match &self.navigator {
                Some(navigator) => navigator.handle(input).await,
                None => debug!("no navigator attached, ignoring {input:?}"),
            },
            DeviceEvent::TemperatureChanged(temp_c) => {
                if let Some(lifecycle) = &self.lifecycle {
                    lifecycle.update_temperature(temp_c).await;
                }
                if let Some(navigator) = &self.navigator {
                    navigator.on_temperature_changed(temp_c).await;
                }
            }
            DeviceEvent::NetworkConnected { address } => {
                info!("network connected at {address}");
                self.indicator.set_steady(IndicatorState::Idle);
            }
        }
    }

    /// Routes events until every [`EventBus`] handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<DeviceEvent>) {
        while let Some(event) = rx.recv().await {
            self.route(event).await;
        }
        debug!("event bus closed, router exiting");
    }
}
