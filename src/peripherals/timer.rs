//! timer.rs — retriggerable one-shot timer for debouncing

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

use crate::KeyDescriptor;

/// One-shot timer service.
///
/// The platform invokes the driver's timer callback once the armed deadline
/// passes. A rearm moves the deadline; it never queues a second fire.
/// Deadlines are compared against [`now`](Self::now), so a fire that lands
/// early by that clock is rearmed for the same deadline.
pub trait TimerService {
    /// `false` for services that never call back.
    const FIRES: bool = true;

    fn now(&self) -> Instant;
    fn arm_once(&mut self, deadline: Instant);
    fn rearm(&mut self, deadline: Instant);
    fn disarm(&mut self);
}

/// Timer service for drivers that never debounce.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimer;

impl TimerService for NoTimer {
    const FIRES: bool = false;

    fn now(&self) -> Instant {
        Instant::MIN
    }

    fn arm_once(&mut self, _deadline: Instant) {}

    fn rearm(&mut self, _deadline: Instant) {}

    fn disarm(&mut self) {}
}

/// Debounce bookkeeping: the last key that saw an edge and the deadline the
/// timer is currently armed for (none while disarmed).
pub struct DebounceTimer<'d, T> {
    timer: T,
    delay: Duration,
    last: Option<&'d KeyDescriptor>,
    deadline: Option<Instant>,
}

impl<'d, T: TimerService> DebounceTimer<'d, T> {
    pub fn new(timer: T, delay: Duration) -> Self {
        Self {
            timer,
            delay,
            last: None,
            deadline: None,
        }
    }

    /// Record `key` and push the deadline out to `now + delay`.
    ///
    /// The most recent key wins, even when it differs from the key that
    /// originally armed the timer.
    pub fn on_edge(&mut self, key: &'d KeyDescriptor) {
        let deadline = self.timer.now() + self.delay;
        self.last = Some(key);
        match self.deadline {
            Some(_) => self.timer.rearm(deadline),
            None => self.timer.arm_once(deadline),
        }
        self.deadline = Some(deadline);
        trace!("debounce armed for {}", key.name);
    }

    /// Settle the timer, returning the key to sample.
    ///
    /// `None` when disarmed or when the fire is early for the current
    /// deadline. An early fire rearms for that deadline, covering both a fire
    /// left over from before a rearm and a backend running slightly ahead.
    pub fn fire(&mut self) -> Option<&'d KeyDescriptor> {
        let deadline = self.deadline?;
        if self.timer.now() < deadline {
            self.timer.rearm(deadline);
            return None;
        }
        self.deadline = None;
        self.last
    }

    /// Cancel any outstanding fire and forget the recorded key.
    pub fn disarm(&mut self) {
        if self.deadline.take().is_some() {
            self.timer.disarm();
        }
        self.last = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_key(&self) -> Option<&'d KeyDescriptor> {
        self.last
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

/// [`TimerService`] backed by `embassy-time`.
///
/// Arm, rearm and disarm only post a command; [`run`](Self::run) waits for
/// the deadline and calls back. Hand `&OneShotTimer` to the driver and run
/// the future in a task next to it.
pub struct OneShotTimer {
    command: Signal<CriticalSectionRawMutex, Option<Instant>>,
}

impl OneShotTimer {
    pub const fn new() -> Self {
        Self {
            command: Signal::new(),
        }
    }

    /// Drive the timer: call `on_fire` every time an armed deadline passes.
    pub async fn run<F: FnMut()>(&self, mut on_fire: F) -> ! {
        let mut deadline: Option<Instant> = None;
        loop {
            deadline = match deadline {
                None => self.command.wait().await,
                Some(at) => match select(Timer::at(at), self.command.wait()).await {
                    Either::First(()) => {
                        on_fire();
                        None
                    }
                    Either::Second(next) => next,
                },
            };
        }
    }
}

impl Default for OneShotTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService for &OneShotTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn arm_once(&mut self, deadline: Instant) {
        self.command.signal(Some(deadline));
    }

    fn rearm(&mut self, deadline: Instant) {
        self.command.signal(Some(deadline));
    }

    fn disarm(&mut self) {
        self.command.signal(None);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::Cell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Arm(u64),
        Rearm(u64),
        Disarm,
    }

    /// Manual clock; records every call the debouncer makes.
    #[derive(Clone, Default)]
    struct FakeTimer {
        now_ms: Rc<Cell<u64>>,
        calls: Rc<core::cell::RefCell<Vec<Call>>>,
    }

    impl FakeTimer {
        fn set_now(&self, ms: u64) {
            self.now_ms.set(ms);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl TimerService for FakeTimer {
        fn now(&self) -> Instant {
            Instant::from_millis(self.now_ms.get())
        }

        fn arm_once(&mut self, deadline: Instant) {
            self.calls.borrow_mut().push(Call::Arm(deadline.as_millis()));
        }

        fn rearm(&mut self, deadline: Instant) {
            self.calls.borrow_mut().push(Call::Rearm(deadline.as_millis()));
        }

        fn disarm(&mut self) {
            self.calls.borrow_mut().push(Call::Disarm);
        }
    }

    fn keys() -> &'static [KeyDescriptor; 8] {
        KeyDescriptor::s5pv210_buttons()
    }

    #[test]
    fn starts_disarmed_and_ignores_spurious_fire() {
        let timer = FakeTimer::default();
        let mut debounce = DebounceTimer::new(timer.clone(), Duration::from_millis(10));
        timer.set_now(1_000);
        assert!(!debounce.is_armed());
        assert_eq!(debounce.fire(), None);
        assert!(timer.calls().is_empty());
    }

    #[test]
    fn burst_of_edges_coalesces_to_last_edge_plus_delay() {
        let timer = FakeTimer::default();
        let mut debounce = DebounceTimer::new(timer.clone(), Duration::from_millis(10));
        let s1 = &keys()[0];

        for at in [100, 102, 105, 107] {
            timer.set_now(at);
            debounce.on_edge(s1);
        }
        assert_eq!(debounce.deadline(), Some(Instant::from_millis(117)));
        assert_eq!(
            timer.calls(),
            [Call::Arm(110), Call::Rearm(112), Call::Rearm(115), Call::Rearm(117)]
        );

        // the deadline the first edge asked for is stale by now
        timer.set_now(110);
        assert_eq!(debounce.fire(), None);
        assert!(debounce.is_armed());
        assert_eq!(timer.calls().last(), Some(&Call::Rearm(117)));

        timer.set_now(117);
        assert_eq!(debounce.fire(), Some(s1));
        assert!(!debounce.is_armed());
        assert_eq!(debounce.fire(), None);
    }

    #[test]
    fn last_interrupting_key_wins() {
        let timer = FakeTimer::default();
        let mut debounce = DebounceTimer::new(timer.clone(), Duration::from_millis(10));
        let (a, b) = (&keys()[0], &keys()[1]);

        timer.set_now(0);
        debounce.on_edge(a);
        timer.set_now(4);
        debounce.on_edge(b);
        assert_eq!(debounce.last_key(), Some(b));

        timer.set_now(14);
        assert_eq!(debounce.fire(), Some(b));
    }

    #[test]
    fn early_fire_rearms_for_the_same_deadline() {
        let timer = FakeTimer::default();
        let mut debounce = DebounceTimer::new(timer.clone(), Duration::from_millis(10));
        let s4 = &keys()[3];
        timer.set_now(50);
        debounce.on_edge(s4);

        // backend clock is a tick behind ours
        timer.set_now(59);
        assert_eq!(debounce.fire(), None);
        assert_eq!(timer.calls(), [Call::Arm(60), Call::Rearm(60)]);
        assert_eq!(debounce.deadline(), Some(Instant::from_millis(60)));

        timer.set_now(60);
        assert_eq!(debounce.fire(), Some(s4));
        assert_eq!(timer.calls().len(), 2);
    }

    #[test]
    fn disarm_cancels_outstanding_fire() {
        let timer = FakeTimer::default();
        let mut debounce = DebounceTimer::new(timer.clone(), Duration::from_millis(10));
        debounce.on_edge(&keys()[2]);
        debounce.disarm();
        assert_eq!(timer.calls(), [Call::Arm(10), Call::Disarm]);

        timer.set_now(50);
        assert_eq!(debounce.fire(), None);
        assert_eq!(debounce.last_key(), None);

        // disarming twice does not touch the timer again
        debounce.disarm();
        assert_eq!(timer.calls().len(), 2);
    }

    #[test]
    fn one_shot_timer_fires_once_per_settled_deadline() {
        let timer = OneShotTimer::new();
        let fired = Cell::new(0u32);

        let scenario = async {
            let mut service = &timer;
            let start = service.now();
            service.arm_once(start + Duration::from_millis(20));
            Timer::after_millis(5).await;
            service.rearm(Instant::now() + Duration::from_millis(20));
            Timer::after_millis(80).await;
            let after_first = fired.get();

            service.arm_once(Instant::now() + Duration::from_millis(20));
            service.disarm();
            Timer::after_millis(60).await;
            (after_first, fired.get())
        };

        let runner = timer.run(|| fired.set(fired.get() + 1));
        match embassy_futures::block_on(select(scenario, runner)) {
            Either::First((after_first, total)) => {
                assert_eq!(after_first, 1);
                assert_eq!(total, 1);
            }
            Either::Second(never) => match never {},
        }
    }
}
