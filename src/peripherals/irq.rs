//! irq.rs — interrupt binding and the key registry
//!
//! The platform owns the actual interrupt lines. [`InterruptBinder`] claims a
//! line for a key and remembers the key as the callback context; every edge on
//! that line is then dispatched to an [`EdgeHandler`] with the same
//! descriptor. [`KeyRegistry`] tracks the claimed lines so they can be rolled
//! back or released as a set.

use embedded_hal_async::digital::Wait;
use heapless::Vec;

use crate::{KeyDescriptor, MAX_KEYS};

/// Interrupt binding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BindError {
    #[error("Interrupt line {irq} is unavailable")]
    Unavailable { irq: u32 },
    #[error("Binding table is full")]
    TableFull,
    #[error("Interrupt line was never bound")]
    NotBound,
}

/// Which transitions of the line raise an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeMode {
    Rising,
    Falling,
    Both,
}

/// Callback invoked in interrupt context for every edge on a bound line.
///
/// Implementations must not block.
pub trait EdgeHandler<'d> {
    fn on_edge(&self, key: &'d KeyDescriptor);
}

impl<'d, H: EdgeHandler<'d> + ?Sized> EdgeHandler<'d> for &H {
    fn on_edge(&self, key: &'d KeyDescriptor) {
        (**self).on_edge(key)
    }
}

/// Interrupt binding service.
pub trait InterruptBinder<'d> {
    /// Handle to a claimed line, consumed by [`unbind`](Self::unbind).
    type Token;

    /// Claim `key.irq` in `mode` with `key` as the callback context.
    fn bind(&mut self, key: &'d KeyDescriptor, mode: EdgeMode) -> Result<Self::Token, BindError>;

    /// Release a line claimed by [`bind`](Self::bind).
    fn unbind(&mut self, token: Self::Token) -> Result<(), BindError>;
}

/// Set of interrupt bindings held for a key table.
pub struct KeyRegistry<'d, B: InterruptBinder<'d>> {
    binder: B,
    bound: Vec<(&'d KeyDescriptor, B::Token), MAX_KEYS>,
}

impl<'d, B: InterruptBinder<'d>> KeyRegistry<'d, B> {
    pub fn new(binder: B) -> Self {
        Self {
            binder,
            bound: Vec::new(),
        }
    }

    /// Bind a both-edges interrupt for `key`.
    pub fn register(&mut self, key: &'d KeyDescriptor) -> Result<(), BindError> {
        if self.bound.is_full() {
            return Err(BindError::TableFull);
        }
        let token = self.binder.bind(key, EdgeMode::Both)?;
        if self.bound.push((key, token)).is_err() {
            return Err(BindError::TableFull);
        }
        debug!("bound irq {} for {}", key.irq, key.name);
        Ok(())
    }

    /// Bind every key in `keys`, all or nothing.
    ///
    /// On failure, every binding made by this call or before it is released
    /// before the error is returned.
    pub fn register_all(&mut self, keys: &'d [KeyDescriptor]) -> Result<(), BindError> {
        for key in keys {
            if let Err(err) = self.register(key) {
                warn!("binding {} failed ({}), rolling back", key.name, err);
                self.unregister_all();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Release every binding, newest first.
    ///
    /// Best effort: an unbind failure is logged and the rest still get released.
    pub fn unregister_all(&mut self) {
        while let Some((key, token)) = self.bound.pop() {
            match self.binder.unbind(token) {
                Ok(()) => debug!("released irq {} for {}", key.irq, key.name),
                Err(err) => warn!("failed to release irq {} for {}: {}", key.irq, key.name, err),
            }
        }
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    pub fn is_bound(&self, key: &KeyDescriptor) -> bool {
        self.bound.iter().any(|(bound, _)| bound.irq == key.irq)
    }

    pub fn binder(&self) -> &B {
        &self.binder
    }
}

/// Forward every edge seen on an async input pin to `handler`.
///
/// This is the task-based alternative to an interrupt binding: the pin's own
/// interrupt wakes the task, which then runs the same edge path an ISR would.
/// Only returns if the pin reports an error.
pub async fn watch_edges<'d, P, H>(mut pin: P, key: &'d KeyDescriptor, handler: H) -> P::Error
where
    P: Wait,
    H: EdgeHandler<'d>,
{
    loop {
        if let Err(err) = pin.wait_for_any_edge().await {
            warn!("edge watch on {} stopped", key.name);
            return err;
        }
        handler.on_edge(key);
    }
}
