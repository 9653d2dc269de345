//! Host-side stand-ins for the platform services the driver talks to.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::{Duration as StdDuration, Instant as StdInstant};

use embassy_time::Instant;
use irq_key::{
    AsyncNotifier, BindError, EdgeMode, InterruptBinder, KeyDescriptor, Level, NotifyReason,
    PinSampler, SubscriberHandle, TimerService,
};

pub const S1: usize = 0;
pub const S2: usize = 1;
pub const S3: usize = 2;

pub fn keys() -> &'static [KeyDescriptor; 8] {
    KeyDescriptor::s5pv210_buttons()
}

pub fn key(index: usize) -> &'static KeyDescriptor {
    &keys()[index]
}

/// Claims lines in a list; refuses `fail_at` if set.
#[derive(Debug, Default)]
pub struct FakeBinder {
    pub fail_at: Option<u32>,
    pub claimed: Vec<u32>,
    pub released: Vec<u32>,
}

impl FakeBinder {
    pub fn failing_at(irq: u32) -> Self {
        Self {
            fail_at: Some(irq),
            ..Default::default()
        }
    }
}

impl<'d> InterruptBinder<'d> for FakeBinder {
    type Token = u32;

    fn bind(&mut self, key: &'d KeyDescriptor, mode: EdgeMode) -> Result<u32, BindError> {
        assert_eq!(mode, EdgeMode::Both);
        if self.fail_at == Some(key.irq) {
            return Err(BindError::Unavailable { irq: key.irq });
        }
        assert!(!self.claimed.contains(&key.irq), "irq {} bound twice", key.irq);
        self.claimed.push(key.irq);
        Ok(key.irq)
    }

    fn unbind(&mut self, token: u32) -> Result<(), BindError> {
        let before = self.claimed.len();
        self.claimed.retain(|irq| *irq != token);
        self.released.push(token);
        if self.claimed.len() == before {
            return Err(BindError::NotBound);
        }
        Ok(())
    }
}

/// Pin levels set by the test; every pin idles high (released).
#[derive(Debug, Default)]
pub struct FakePins {
    levels: Mutex<HashMap<u32, Level>>,
    reads: Mutex<Vec<u32>>,
}

impl FakePins {
    pub fn set(&self, key: &KeyDescriptor, level: Level) {
        self.levels.lock().unwrap().insert(key.pin, level);
    }

    pub fn press(&self, key: &KeyDescriptor) {
        self.set(key, Level::Low);
    }

    pub fn release(&self, key: &KeyDescriptor) {
        self.set(key, Level::High);
    }

    /// Pins sampled so far, in order.
    pub fn reads(&self) -> Vec<u32> {
        self.reads.lock().unwrap().clone()
    }
}

impl PinSampler for FakePins {
    fn read_level(&self, pin: u32) -> Level {
        self.reads.lock().unwrap().push(pin);
        self.levels
            .lock()
            .unwrap()
            .get(&pin)
            .copied()
            .unwrap_or(Level::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Arm(u64),
    Rearm(u64),
    Disarm,
}

/// Timer whose clock only moves when the test says so.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ms: Arc<AtomicU64>,
    calls: Arc<Mutex<Vec<TimerCall>>>,
}

impl ManualTimer {
    pub fn set_now(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TimerService for ManualTimer {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms.load(Ordering::SeqCst))
    }

    fn arm_once(&mut self, deadline: Instant) {
        self.calls
            .lock()
            .unwrap()
            .push(TimerCall::Arm(deadline.as_millis()));
    }

    fn rearm(&mut self, deadline: Instant) {
        self.calls
            .lock()
            .unwrap()
            .push(TimerCall::Rearm(deadline.as_millis()));
    }

    fn disarm(&mut self) {
        self.calls.lock().unwrap().push(TimerCall::Disarm);
    }
}

/// Records every notification in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<SubscriberHandle>>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<SubscriberHandle> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn count_for(&self, handle: SubscriberHandle) -> usize {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|h| **h == handle)
            .count()
    }
}

impl AsyncNotifier for RecordingNotifier {
    fn notify(&self, handle: SubscriberHandle, reason: NotifyReason) {
        assert_eq!(reason, NotifyReason::DataReady);
        self.delivered.lock().unwrap().push(handle);
    }
}

#[derive(Debug, Default)]
pub struct CountingWaker(pub AtomicUsize);

impl CountingWaker {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Wake for CountingWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn counting_waker() -> (Arc<CountingWaker>, Waker) {
    let counter = Arc::new(CountingWaker::default());
    (counter.clone(), Waker::from(counter))
}

/// Unparks the thread that is running [`park_on`].
struct ThreadWaker {
    thread: Thread,
    wakes: AtomicUsize,
}

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
        self.thread.unpark();
    }
}

/// Run `fut` to completion on the current thread, sleeping between polls.
///
/// The future is only polled again once its waker fires, so a future that
/// never registers a waker panics after `timeout` instead of spinning.
/// Returns the output and how many wakes it took.
pub fn park_on<F: Future>(fut: F, timeout: StdDuration) -> (F::Output, usize) {
    let waker = Arc::new(ThreadWaker {
        thread: thread::current(),
        wakes: AtomicUsize::new(0),
    });
    let task_waker = Waker::from(waker.clone());
    let mut cx = Context::from_waker(&task_waker);
    let mut fut = pin!(fut);
    let deadline = StdInstant::now() + timeout;
    loop {
        let seen = waker.wakes.load(Ordering::SeqCst);
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return (out, waker.wakes.load(Ordering::SeqCst));
        }
        // park can return spuriously; wait for an actual wake
        while waker.wakes.load(Ordering::SeqCst) == seen {
            let now = StdInstant::now();
            assert!(now < deadline, "future was never woken");
            thread::park_timeout(deadline - now);
        }
    }
}
