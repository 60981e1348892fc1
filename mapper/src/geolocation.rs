use std::time::Duration;

use async_trait::async_trait;
use shared::Coordinate;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

const WATCH_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may hand back.
    pub maximum_age: Duration,
    /// Minimum spacing between fixes forwarded to the controller.
    pub min_interval: Duration,
    /// Fixes less precise than this are dropped.
    pub max_accuracy_m: Option<f64>,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
            min_interval: Duration::from_secs(5),
            max_accuracy_m: Some(50.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub timestamp: Instant,
}

impl PositionFix {
    pub fn now(coordinate: Coordinate, accuracy_m: Option<f64>) -> Self {
        Self {
            coordinate,
            accuracy_m,
            timestamp: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("geolocation permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("position request timed out")]
    Timeout,
}

/// Device geolocation.
#[async_trait]
pub trait GeoPositionProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<PositionFix, GeoError>;

    /// Starts a continuous watch. The provider keeps producing fixes until
    /// the receiver is dropped.
    fn watch_position(
        &self,
        options: &PositionOptions,
    ) -> Result<mpsc::Receiver<PositionFix>, GeoError>;
}

/// Debounce and accuracy filter applied to a raw fix stream.
#[derive(Debug, Clone)]
pub struct PositionGate {
    min_interval: Duration,
    max_accuracy_m: Option<f64>,
    last_accepted: Option<Instant>,
}

impl PositionGate {
    pub fn new(options: &PositionOptions) -> Self {
        Self {
            min_interval: options.min_interval,
            max_accuracy_m: options.max_accuracy_m,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, fix: &PositionFix) -> bool {
        if let (Some(max), Some(accuracy)) = (self.max_accuracy_m, fix.accuracy_m) {
            if accuracy > max {
                return false;
            }
        }
        if let Some(last) = self.last_accepted {
            if fix.timestamp.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_accepted = Some(fix.timestamp);
        true
    }
}

/// A running position watch. Dropping it stops the forwarding task, which
/// drops the provider's stream and ends the platform subscription.
pub struct TrackingSubscription {
    updates: mpsc::Receiver<PositionFix>,
    task: JoinHandle<()>,
}

impl TrackingSubscription {
    pub fn spawn(
        provider: &dyn GeoPositionProvider,
        options: &PositionOptions,
    ) -> Result<Self, GeoError> {
        let mut source = provider.watch_position(options)?;
        let mut gate = PositionGate::new(options);
        let (tx, updates) = mpsc::channel(WATCH_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(fix) = source.recv().await {
                if !gate.accept(&fix) {
                    tracing::trace!("position fix gated out: {fix:?}");
                    continue;
                }
                if tx.send(fix).await.is_err() {
                    break;
                }
            }
            tracing::debug!("position watch ended");
        });

        Ok(Self { updates, task })
    }

    /// Next accepted fix, `None` once the provider stops.
    pub async fn next(&mut self) -> Option<PositionFix> {
        self.updates.recv().await
    }

    /// Stops the watch. Dropping the subscription has the same effect.
    pub fn cancel(self) {}
}

impl Drop for TrackingSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
