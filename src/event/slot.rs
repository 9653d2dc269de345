//! slot.rs — single-slot key event store with waker registration

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll, Waker};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

use crate::{KeyEvent, MAX_WAITERS};

/// Reasons a drain cannot hand out an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotError {
    #[error("No key event pending")]
    WouldBlock,
    #[error("Event slot is closed")]
    Closed,
}

struct SlotState {
    value: KeyEvent,
    pending: bool,
    closed: bool,
    waiters: MultiWakerRegistration<MAX_WAITERS>,
}

/// Last key event plus its pending flag.
///
/// `publish` overwrites; there is no queue, so an event that was never
/// drained is lost once the next one arrives. Only [`drain`](Self::drain)
/// and [`try_drain`](Self::try_drain) clear the pending flag.
///
/// Designed for a single draining consumer. Two concurrent drains are not
/// excluded from each other: whichever polls first after a publish gets the
/// event and the other keeps waiting.
pub struct EventSlot {
    state: Mutex<CriticalSectionRawMutex, RefCell<SlotState>>,
}

impl EventSlot {
    /// An open, empty slot.
    pub const fn new() -> Self {
        Self::with_closed(false)
    }

    /// A closed slot; call [`open`](Self::open) before draining.
    pub const fn new_closed() -> Self {
        Self::with_closed(true)
    }

    const fn with_closed(closed: bool) -> Self {
        Self {
            state: Mutex::new(RefCell::new(SlotState {
                value: KeyEvent::pressed(0),
                pending: false,
                closed,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Store `event`, mark it pending and wake every registered waiter.
    ///
    /// A closed slot refuses the event and returns `false`.
    pub fn publish(&self, event: KeyEvent) -> bool {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.closed {
                return false;
            }
            state.value = event;
            state.pending = true;
            state.waiters.wake();
            true
        })
    }

    /// Take the pending event without waiting.
    pub fn try_drain(&self) -> Result<KeyEvent, SlotError> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            Self::take(&mut state)
        })
    }

    /// Take the pending event, or register `cx`'s waker and stay pending.
    ///
    /// The predicate is evaluated on every poll, so a wake that raced with
    /// another drain simply parks the caller again.
    pub fn poll_drain(&self, cx: &mut Context<'_>) -> Poll<Result<KeyEvent, SlotError>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match Self::take(&mut state) {
                Err(SlotError::WouldBlock) => {
                    state.waiters.register(cx.waker());
                    Poll::Pending
                }
                other => Poll::Ready(other),
            }
        })
    }

    /// Wait until an event is pending, then take it.
    ///
    /// Dropping the future before it completes leaves the slot untouched.
    pub async fn drain(&self) -> Result<KeyEvent, SlotError> {
        poll_fn(|cx| self.poll_drain(cx)).await
    }

    /// Whether an undrained event is waiting. Does not clear it.
    pub fn peek_ready(&self) -> bool {
        self.state.lock(|state| state.borrow().pending)
    }

    /// Park `waker` until the next publish or close.
    pub fn register(&self, waker: &Waker) {
        self.state
            .lock(|state| state.borrow_mut().waiters.register(waker));
    }

    /// Reopen the slot with nothing pending.
    pub fn open(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.pending = false;
            state.closed = false;
        });
    }

    /// Close the slot and wake every waiter so it observes the close.
    pub fn close(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.closed = true;
            state.waiters.wake();
        });
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock(|state| state.borrow().closed)
    }

    fn take(state: &mut SlotState) -> Result<KeyEvent, SlotError> {
        if state.closed {
            return Err(SlotError::Closed);
        }
        if !state.pending {
            return Err(SlotError::WouldBlock);
        }
        state.pending = false;
        Ok(state.value)
    }
}

impl Default for EventSlot {
    fn default() -> Self {
        Self::new()
    }
}
