//! Consumer side of the key driver: blocking read, readiness poll and
//! async-notify subscription, all over the same event slot.

use core::future::Future;
use core::ops::BitOr;
use core::task::Context;

use embassy_futures::select::{Either, select};

use crate::{
    AsyncNotifier, DriverError, InterruptBinder, KeyDriver, PinSampler, SubscriberHandle,
    TimerService,
};

/// Readiness bits reported by [`KeyDriver::poll`], using the POSIX `poll(2)`
/// values so an endpoint can pass them through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollMask(u16);

impl PollMask {
    pub const EMPTY: PollMask = PollMask(0);
    /// `POLLIN`
    pub const READABLE: PollMask = PollMask(0x0001);
    /// `POLLHUP`
    pub const HANGUP: PollMask = PollMask(0x0010);
    /// `POLLRDNORM`
    pub const READ_NORMAL: PollMask = PollMask(0x0040);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: PollMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PollMask {
    type Output = PollMask;

    fn bitor(self, rhs: PollMask) -> PollMask {
        PollMask(self.0 | rhs.0)
    }
}

impl<'d, B, S, T, N> KeyDriver<'d, B, S, T, N>
where
    B: InterruptBinder<'d>,
    S: PinSampler,
    T: TimerService,
    N: AsyncNotifier,
{
    /// Wait for the next key event and write it into `buf`.
    ///
    /// `buf` must be exactly one byte long. Returns the number of bytes
    /// written (always 1). This is the only consumer that clears the pending
    /// event; run a single reader at a time.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, DriverError> {
        check_read_size(buf)?;
        let event = self.slot.drain().await?;
        buf[0] = event.as_byte();
        Ok(1)
    }

    /// Like [`read`](Self::read), but gives up with
    /// [`DriverError::Interrupted`] once `cancel` completes. A cancelled read
    /// leaves the pending event in place.
    pub async fn read_or_cancel<C>(&self, buf: &mut [u8], cancel: C) -> Result<usize, DriverError>
    where
        C: Future,
    {
        check_read_size(buf)?;
        match select(self.slot.drain(), cancel).await {
            Either::First(event) => {
                buf[0] = event?.as_byte();
                Ok(1)
            }
            Either::Second(_) => {
                debug!("{} read interrupted", self.config.device_name);
                Err(DriverError::Interrupted)
            }
        }
    }

    /// Non-blocking read: [`DriverError::WouldBlock`] when nothing is pending.
    pub fn try_read(&self, buf: &mut [u8]) -> Result<usize, DriverError> {
        check_read_size(buf)?;
        let event = self.slot.try_drain()?;
        buf[0] = event.as_byte();
        Ok(1)
    }

    /// Readiness query for multiplexing loops.
    ///
    /// Parks `cx`'s waker so the caller is woken by the next publish or
    /// close, then reports the current state. Never drains.
    pub fn poll(&self, cx: &mut Context<'_>) -> PollMask {
        self.slot.register(cx.waker());
        if self.slot.is_closed() {
            PollMask::HANGUP
        } else if self.slot.peek_ready() {
            PollMask::READABLE | PollMask::READ_NORMAL
        } else {
            PollMask::EMPTY
        }
    }

    /// Whether a key event is waiting to be read.
    pub fn is_ready(&self) -> bool {
        self.slot.peek_ready()
    }

    /// Start delivering a data-ready notification to `handle` on every
    /// publish. Independent of [`open`](Self::open) and
    /// [`close`](Self::close).
    pub fn subscribe(&self, handle: SubscriberHandle) -> Result<(), DriverError> {
        self.subscribers
            .lock(|subscribers| subscribers.borrow_mut().subscribe(handle))?;
        debug!("subscriber {} added", handle.0);
        Ok(())
    }

    /// Stop notifying `handle`. Returns whether it was subscribed.
    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        self.subscribers
            .lock(|subscribers| subscribers.borrow_mut().unsubscribe(handle))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock(|subscribers| subscribers.borrow().len())
    }
}

fn check_read_size(buf: &[u8]) -> Result<(), DriverError> {
    if buf.len() != 1 {
        return Err(DriverError::InvalidArgument {
            requested: buf.len(),
        });
    }
    Ok(())
}
