//! Driver configuration and capacity limits

use embassy_time::Duration;

/// Name of the byte-stream node the driver is published as.
pub const DEVICE_NAME: &str = "IRQ_KEY";
/// Device class the node is created under.
pub const CLASS_NAME: &str = "key_drv";

/// Settle time between the last edge and the debounced sample.
pub const DEFAULT_DEBOUNCE_MS: u64 = 10;

/// Maximum number of keys the registry can hold bindings for.
pub const MAX_KEYS: usize = 8;
/// Maximum number of async-notify subscribers.
pub const MAX_SUBSCRIBERS: usize = 8;
/// Maximum number of distinct wakers parked on the event slot at once.
/// Registering past this wakes every parked waker so they re-register.
pub const MAX_WAITERS: usize = 4;

/// How an edge interrupt turns into a published key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProducerMode {
    /// Sample and publish on every raw edge, bounces included.
    Direct,
    /// Arm a retriggerable timer per edge and sample once it settles.
    #[default]
    Debounced,
}

/// Configuration for [`KeyDriver`](crate::KeyDriver)
///
/// Uses struct literal update syntax.
///
/// # Example
///
/// ```
/// use embassy_time::Duration;
/// use irq_key::{DriverConfig, ProducerMode};
///
/// let config = DriverConfig {
///     mode: ProducerMode::Debounced,
///     debounce: Duration::from_millis(20),
///     ..Default::default()
/// };
/// assert_eq!(config.device_name, "IRQ_KEY");
/// ```
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Direct or debounced producer
    pub mode: ProducerMode,
    /// Debounce delay, only used in [`ProducerMode::Debounced`]
    pub debounce: Duration,
    /// Device node name
    pub device_name: &'static str,
    /// Device class name
    pub class_name: &'static str,
}

impl DriverConfig {
    /// Undebounced configuration: one publish per raw edge.
    pub fn direct() -> Self {
        Self {
            mode: ProducerMode::Direct,
            ..Default::default()
        }
    }

    /// Debounced configuration with the default settle time.
    pub fn debounced() -> Self {
        Self::default()
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: ProducerMode::Debounced,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            device_name: DEVICE_NAME,
            class_name: CLASS_NAME,
        }
    }
}
