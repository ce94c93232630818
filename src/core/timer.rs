//! Re-armable timer running on its own thread
//!
//! A [`Timer`] owns one private thread that sleeps on a condition variable
//! until the next due instant, invokes its callback, and either re-arms itself
//! with the configured interval or goes idle. Changing the schedule wakes the
//! thread so the new schedule takes effect immediately.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::core::sync::lock_or_recover;

type TimerCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Schedule {
    next_fire: Instant,
    interval: Option<Duration>,
}

#[derive(Debug, Default)]
struct TimerState {
    schedule: Option<Schedule>,
    shutdown: bool,
    fired: u64,
}

struct TimerShared {
    state: Mutex<TimerState>,
    signal: Condvar,
}

/// Timer with a private thread; dropping the timer stops and joins the thread
pub struct Timer {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    name: String,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl Timer {
    /// Spawn an idle timer thread that will run `callback` whenever it fires
    pub fn spawn<F>(name: impl Into<String>, callback: F) -> io::Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = name.into();
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            signal: Condvar::new(),
        });
        let callback: TimerCallback = Arc::new(callback);

        let thread_shared = Arc::clone(&shared);
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_timer(thread_shared, callback, thread_name))?;
        let thread_id = handle.thread().id();

        Ok(Self {
            shared,
            handle: Some(handle),
            thread_id,
            name,
        })
    }

    /// Re-arm the timer
    ///
    /// `delay` of `None` is the infinite sentinel and disarms the timer.
    /// `interval` of `None` (or zero) makes the timer fire once. A delay too
    /// large to represent as an instant never elapses and also disarms.
    pub fn change(&self, delay: Option<Duration>, interval: Option<Duration>) {
        let next_fire = delay.and_then(|delay| {
            let next_fire = Instant::now().checked_add(delay);
            if next_fire.is_none() {
                log::debug!("Timer '{}' delay {:?} is out of range; disarming", self.name, delay);
            }
            next_fire
        });
        let mut state = lock_or_recover(&self.shared.state, "timer state");
        state.schedule = next_fire.map(|next_fire| Schedule {
            next_fire,
            interval: interval.filter(|i| !i.is_zero()),
        });
        self.shared.signal.notify_all();
    }

    /// Stop firing until re-armed
    pub fn disarm(&self) {
        self.change(None, None);
    }

    pub fn is_armed(&self) -> bool {
        lock_or_recover(&self.shared.state, "timer state")
            .schedule
            .is_some()
    }

    /// Number of times the callback has been invoked
    pub fn fired_count(&self) -> u64 {
        lock_or_recover(&self.shared.state, "timer state").fired
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        {
            let mut state = lock_or_recover(&self.shared.state, "timer state");
            state.shutdown = true;
            state.schedule = None;
            self.shared.signal.notify_all();
        }

        // A timer dropped from inside its own callback cannot join itself
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Timer thread '{}' terminated abnormally", self.name);
            }
        }
    }
}

fn run_timer(shared: Arc<TimerShared>, callback: TimerCallback, name: String) {
    let mut state = lock_or_recover(&shared.state, "timer state");
    loop {
        if state.shutdown {
            return;
        }

        let schedule = match state.schedule {
            Some(schedule) => schedule,
            None => {
                state = shared
                    .signal
                    .wait(state)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                continue;
            }
        };

        let now = Instant::now();
        if now < schedule.next_fire {
            state = shared
                .signal
                .wait_timeout(state, schedule.next_fire - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .0;
            continue;
        }

        // An interval past the representable range leaves the timer idle
        state.schedule = schedule.interval.and_then(|interval| {
            now.checked_add(interval).map(|next_fire| Schedule {
                next_fire,
                interval: Some(interval),
            })
        });
        state.fired += 1;
        drop(state);

        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            log::warn!("Timer '{}' callback panicked; timer keeps running", name);
        }

        state = lock_or_recover(&shared.state, "timer state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_timer_is_idle_until_armed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = Timer::spawn("idle-timer", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!timer.is_armed());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_shot_timer_fires_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = Timer::spawn("one-shot", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.change(Some(Duration::from_millis(10)), None);
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 1));

        thread::sleep(Duration::from_millis(60));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
        assert_eq!(timer.fired_count(), 1);
    }

    #[test]
    fn test_periodic_timer_fires_repeatedly_until_disarmed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = Timer::spawn("periodic", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.change(Some(Duration::ZERO), Some(Duration::from_millis(10)));
        assert!(wait_for(|| hits.load(Ordering::SeqCst) >= 3));

        timer.disarm();
        thread::sleep(Duration::from_millis(30));
        let settled = hits.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn test_panicking_callback_does_not_kill_timer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = Timer::spawn("panicky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick fails");
            }
        })
        .unwrap();

        timer.change(Some(Duration::ZERO), Some(Duration::from_millis(5)));
        assert!(wait_for(|| hits.load(Ordering::SeqCst) >= 2));
    }

    #[test]
    fn test_unrepresentable_delay_disarms_instead_of_panicking() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = Timer::spawn("far-future", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.change(Some(Duration::from_millis(10)), Some(Duration::from_millis(10)));
        assert!(timer.is_armed());

        timer.change(Some(Duration::MAX), None);
        assert!(!timer.is_armed());

        let settled = hits.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(hits.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn test_unrepresentable_interval_fires_once_then_idles() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = Timer::spawn("huge-interval", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.change(Some(Duration::ZERO), Some(Duration::MAX));
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 1));
        assert!(wait_for(|| !timer.is_armed()));

        // The timer thread survived and still honours a new schedule
        timer.change(Some(Duration::ZERO), None);
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 2));
    }
}
