//! subscribers.rs — async-notify subscriptions

use heapless::Vec;

/// Opaque identity of an async-notify subscriber (e.g. an owning process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriberHandle(pub u32);

/// Why a subscriber is being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyReason {
    /// A key event is ready to be read.
    DataReady,
}

/// Delivery side of async notification. Called at publish time, possibly
/// from interrupt context, so it must not block.
pub trait AsyncNotifier {
    fn notify(&self, handle: SubscriberHandle, reason: NotifyReason);
}

impl<N: AsyncNotifier + ?Sized> AsyncNotifier for &N {
    fn notify(&self, handle: SubscriberHandle, reason: NotifyReason) {
        (**self).notify(handle, reason)
    }
}

/// Notifier for drivers nobody subscribes to.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifier;

impl AsyncNotifier for NoNotifier {
    fn notify(&self, _handle: SubscriberHandle, _reason: NotifyReason) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeError {
    #[error("Subscriber table is full")]
    Full,
}

/// Bounded set of subscriber handles, each present at most once.
#[derive(Debug, Default)]
pub struct SubscriberSet<const N: usize> {
    handles: Vec<SubscriberHandle, N>,
}

impl<const N: usize> SubscriberSet<N> {
    pub const fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Add `handle`. Subscribing twice is a no-op.
    pub fn subscribe(&mut self, handle: SubscriberHandle) -> Result<(), SubscribeError> {
        if self.contains(handle) {
            return Ok(());
        }
        self.handles
            .push(handle)
            .map_err(|_| SubscribeError::Full)
    }

    /// Remove `handle`, returning whether it was subscribed.
    pub fn unsubscribe(&mut self, handle: SubscriberHandle) -> bool {
        match self.handles.iter().position(|h| *h == handle) {
            Some(index) => {
                self.handles.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Notify every subscriber once. Returns how many were notified.
    pub fn notify_all<A: AsyncNotifier>(&self, notifier: &A, reason: NotifyReason) -> usize {
        for handle in &self.handles {
            notifier.notify(*handle, reason);
        }
        self.handles.len()
    }

    pub fn contains(&self, handle: SubscriberHandle) -> bool {
        self.handles.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
