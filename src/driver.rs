//! Key driver: lifecycle and the two producer variants
//!
//! [`KeyDriver`] is the one context object shared by interrupt handlers, the
//! debounce timer callback and every consumer. All of its state sits behind
//! critical-section mutexes so it can be used through `&self` from any of
//! those contexts.
//!
//! # Example
//!
//! ```ignore
//! static TIMER: OneShotTimer = OneShotTimer::new();
//!
//! let driver = KeyDriver::new(
//!     KeyDescriptor::s5pv210_buttons(),
//!     binder,
//!     sampler,
//!     &TIMER,
//!     notifier,
//!     DriverConfig::debounced(),
//! );
//! driver.open()?;
//!
//! // timer task
//! TIMER.run(|| driver.on_timer_fire()).await;
//!
//! // reader task
//! let mut byte = [0u8; 1];
//! driver.read(&mut byte).await?;
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::{
    AsyncNotifier, BindError, DebounceTimer, DriverConfig, EdgeHandler, EventSlot,
    InterruptBinder, KeyDescriptor, KeyEvent, KeyRegistry, MAX_SUBSCRIBERS, NoNotifier, NoTimer,
    NotifyReason, PinSampler, ProducerMode, SlotError, SubscribeError, SubscriberSet,
    TimerService,
};

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Key driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    #[error("Failed to bind key interrupts: {0}")]
    Bind(#[from] BindError),
    #[error("Invalid read size {requested}, expected 1")]
    InvalidArgument { requested: usize },
    #[error("No key event pending")]
    WouldBlock,
    #[error("Read interrupted")]
    Interrupted,
    #[error("Driver is closed")]
    Closed,
    #[error("Driver is already open")]
    AlreadyOpen,
    #[error("Subscriber table is full")]
    SubscribersFull,
}

impl From<SlotError> for DriverError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::WouldBlock => DriverError::WouldBlock,
            SlotError::Closed => DriverError::Closed,
        }
    }
}

impl From<SubscribeError> for DriverError {
    fn from(err: SubscribeError) -> Self {
        match err {
            SubscribeError::Full => DriverError::SubscribersFull,
        }
    }
}

// ============================================================================
// KEY DRIVER
// ============================================================================

/// Interrupt-driven key driver over a fixed key table.
///
/// - `B` claims interrupt lines ([`InterruptBinder`])
/// - `S` samples key pins ([`PinSampler`])
/// - `T` is the debounce timer ([`TimerService`]), [`NoTimer`] when direct
/// - `N` delivers async notifications ([`AsyncNotifier`])
pub struct KeyDriver<'d, B, S, T = NoTimer, N = NoNotifier>
where
    B: InterruptBinder<'d>,
{
    pub(crate) keys: &'d [KeyDescriptor],
    pub(crate) config: DriverConfig,
    pub(crate) sampler: S,
    pub(crate) notifier: N,
    pub(crate) registry: Mutex<CriticalSectionRawMutex, RefCell<KeyRegistry<'d, B>>>,
    pub(crate) debounce: Mutex<CriticalSectionRawMutex, RefCell<DebounceTimer<'d, T>>>,
    pub(crate) subscribers: Mutex<CriticalSectionRawMutex, RefCell<SubscriberSet<MAX_SUBSCRIBERS>>>,
    pub(crate) slot: EventSlot,
}

impl<'d, B, S> KeyDriver<'d, B, S>
where
    B: InterruptBinder<'d>,
    S: PinSampler,
{
    /// Undebounced driver without async notification delivery.
    pub fn direct(keys: &'d [KeyDescriptor], binder: B, sampler: S) -> Self {
        Self::new(keys, binder, sampler, NoTimer, NoNotifier, DriverConfig::direct())
    }
}

impl<'d, B, S, T, N> KeyDriver<'d, B, S, T, N>
where
    B: InterruptBinder<'d>,
    S: PinSampler,
    T: TimerService,
    N: AsyncNotifier,
{
    /// Create a closed driver. Nothing is bound until [`open`](Self::open).
    pub fn new(
        keys: &'d [KeyDescriptor],
        binder: B,
        sampler: S,
        timer: T,
        notifier: N,
        mut config: DriverConfig,
    ) -> Self {
        if config.mode == ProducerMode::Debounced && !T::FIRES {
            warn!(
                "{}: debounced mode without a timer, falling back to direct",
                config.device_name
            );
            config.mode = ProducerMode::Direct;
        }
        let debounce = DebounceTimer::new(timer, config.debounce);
        Self {
            keys,
            config,
            sampler,
            notifier,
            registry: Mutex::new(RefCell::new(KeyRegistry::new(binder))),
            debounce: Mutex::new(RefCell::new(debounce)),
            subscribers: Mutex::new(RefCell::new(SubscriberSet::new())),
            slot: EventSlot::new_closed(),
        }
    }

    /// Bind every key's interrupt and start accepting reads.
    ///
    /// All or nothing: if any binding fails, the ones already made are
    /// released and the driver stays closed.
    pub fn open(&self) -> Result<(), DriverError> {
        self.registry.lock(|registry| {
            let mut registry = registry.borrow_mut();
            if !self.slot.is_closed() {
                return Err(DriverError::AlreadyOpen);
            }
            self.slot.open();
            if let Err(err) = registry.register_all(self.keys) {
                self.slot.close();
                warn!("{} open failed: {}", self.config.device_name, err);
                return Err(err.into());
            }
            info!(
                "{} open, {} keys bound",
                self.config.device_name,
                registry.bound_count()
            );
            Ok(())
        })
    }

    /// Release every interrupt binding, disarm the debounce timer and wake
    /// blocked readers, which then fail with [`DriverError::Closed`].
    ///
    /// Subscriptions are left in place; they are dropped only through
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn close(&self) {
        // closed first: an edge racing with close must not rearm the timer
        self.slot.close();
        self.registry
            .lock(|registry| registry.borrow_mut().unregister_all());
        self.debounce.lock(|debounce| debounce.borrow_mut().disarm());
        info!("{} closed", self.config.device_name);
    }

    pub fn is_open(&self) -> bool {
        !self.slot.is_closed()
    }

    pub fn keys(&self) -> &'d [KeyDescriptor] {
        self.keys
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Debounce timer callback. Samples the most recently interrupting key
    /// if the armed deadline has passed; otherwise does nothing.
    pub fn on_timer_fire(&self) {
        let key = self.debounce.lock(|debounce| {
            let mut debounce = debounce.borrow_mut();
            if self.slot.is_closed() {
                debounce.disarm();
                return None;
            }
            debounce.fire()
        });
        if let Some(key) = key {
            self.sample_and_publish(key);
        }
    }

    /// Number of interrupt lines currently claimed.
    pub fn bound_count(&self) -> usize {
        self.registry.lock(|registry| registry.borrow().bound_count())
    }

    /// Inspect the binding service, e.g. to check what is still claimed.
    pub fn with_binder<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        self.registry.lock(|registry| f(registry.borrow().binder()))
    }

    /// Inspect the debounce state.
    pub fn with_debounce<R>(&self, f: impl FnOnce(&DebounceTimer<'d, T>) -> R) -> R {
        self.debounce.lock(|debounce| f(&*debounce.borrow()))
    }

    fn sample_and_publish(&self, key: &KeyDescriptor) {
        let level = self.sampler.read_level(key.pin);
        let event = KeyEvent::from_level(key, level);
        trace!("{}: {}", key.name, event);
        self.publish(event);
    }

    /// Store `event`, wake waiters and notify each subscriber once.
    fn publish(&self, event: KeyEvent) {
        if !self.slot.publish(event) {
            trace!("{} closed, event dropped", self.config.device_name);
            return;
        }
        self.subscribers.lock(|subscribers| {
            subscribers
                .borrow()
                .notify_all(&self.notifier, NotifyReason::DataReady)
        });
    }
}

impl<'d, B, S, T, N> EdgeHandler<'d> for KeyDriver<'d, B, S, T, N>
where
    B: InterruptBinder<'d>,
    S: PinSampler,
    T: TimerService,
    N: AsyncNotifier,
{
    /// Interrupt entry point for a bound key.
    fn on_edge(&self, key: &'d KeyDescriptor) {
        if self.slot.is_closed() {
            trace!("edge on {} while closed, ignored", key.name);
            return;
        }
        match self.config.mode {
            ProducerMode::Direct => self.sample_and_publish(key),
            ProducerMode::Debounced => self.debounce.lock(|debounce| {
                // re-checked under the lock so close() cannot slip in between
                if !self.slot.is_closed() {
                    debounce.borrow_mut().on_edge(key);
                }
            }),
        }
    }
}
