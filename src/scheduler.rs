use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};
use tracing::error;

/// Handle to a scheduled single-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

/// The event-loop seam of the input core.
///
/// `defer` runs a task on the next loop iteration, never synchronously; this
/// is what keeps deferred button replay from re-entering the dispatch that
/// scheduled it. `schedule` arms a single-shot timer.
pub trait Scheduler {
    fn defer(&self, task: Box<dyn FnOnce()>);
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Option<TimerToken>;
    fn cancel(&self, token: TimerToken);
}

/// [`Scheduler`] implementation over a calloop event loop.
pub struct CalloopScheduler<D: 'static> {
    handle: LoopHandle<'static, D>,
    tokens: Rc<RefCell<HashMap<u64, RegistrationToken>>>,
    next_token: Cell<u64>,
}

impl<D: 'static> CalloopScheduler<D> {
    pub fn new(handle: LoopHandle<'static, D>) -> Self {
        Self {
            handle,
            tokens: Rc::new(RefCell::new(HashMap::new())),
            next_token: Cell::new(1),
        }
    }
}

impl<D: 'static> Scheduler for CalloopScheduler<D> {
    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.handle.insert_idle(move |_| task());
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Option<TimerToken> {
        let id = self.next_token.get();
        self.next_token.set(id + 1);

        let tokens = self.tokens.clone();
        let mut task = Some(task);
        let registration = self
            .handle
            .insert_source(Timer::from_duration(delay), move |_, _, _| {
                tokens.borrow_mut().remove(&id);
                if let Some(task) = task.take() {
                    task();
                }
                TimeoutAction::Drop
            });
        match registration {
            Ok(registration) => {
                self.tokens.borrow_mut().insert(id, registration);
                Some(TimerToken(id))
            }
            Err(err) => {
                error!("failed to register timer source: {err}");
                None
            }
        }
    }

    fn cancel(&self, token: TimerToken) {
        if let Some(registration) = self.tokens.borrow_mut().remove(&token.0) {
            self.handle.remove(registration);
        }
    }
}

struct ManualTimer {
    id: u64,
    deadline: Duration,
    task: Box<dyn FnOnce()>,
}

/// Deterministic [`Scheduler`] with a virtual clock, for tests and embedders
/// that pump their own loop.
#[derive(Default)]
pub struct ManualScheduler {
    deferred: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    timers: RefCell<Vec<ManualTimer>>,
    now: Cell<Duration>,
    next_token: Cell<u64>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Runs everything deferred so far. Tasks deferred while draining run on
    /// the next call, like a real loop iteration boundary.
    pub fn dispatch_pending(&self) {
        let batch: Vec<_> = self.deferred.borrow_mut().drain(..).collect();
        for task in batch {
            task();
        }
    }

    /// Advances the virtual clock and fires every timer that became due, in
    /// deadline order.
    pub fn advance(&self, by: Duration) {
        let now = self.now.get() + by;
        self.now.set(now);

        loop {
            let due = {
                let mut timers = self.timers.borrow_mut();
                let next = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= now)
                    .min_by_key(|(_, t)| t.deadline)
                    .map(|(i, _)| i);
                next.map(|i| timers.remove(i))
            };
            match due {
                Some(timer) => (timer.task)(),
                None => break,
            }
        }
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.deferred.borrow_mut().push_back(task);
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Option<TimerToken> {
        let id = self.next_token.get();
        self.next_token.set(id + 1);
        self.timers.borrow_mut().push(ManualTimer {
            id,
            deadline: self.now.get() + delay,
            task,
        });
        Some(TimerToken(id))
    }

    fn cancel(&self, token: TimerToken) {
        self.timers.borrow_mut().retain(|t| t.id != token.0);
    }
}
