//! Fixed-cadence tick loop. A single `TickDriver` owns the authoritative
//! timeline; everything that needs to happen "once per tick" is driven from
//! here rather than from client-triggered events.

use std::thread;
use std::time::{Duration, Instant};

pub struct TickDriver {
    tick_duration: Duration,
    tick: u64,
}

impl TickDriver {
    pub fn new(ticks_per_second: u64) -> TickDriver {
        assert!(ticks_per_second > 0, "tick rate must be positive");
        TickDriver {
            tick_duration: Duration::from_nanos(1_000_000_000 / ticks_per_second),
            tick: 0,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Runs a single tick, invoking `body` and then sleeping off whatever
    /// time remains in the tick budget. Returns the tick number that was
    /// just processed and advances the counter for the next call.
    pub fn run_once<F: FnMut(u64)>(&mut self, mut body: F) -> u64 {
        let started = Instant::now();
        let tick = self.tick;

        body(tick);

        let elapsed = started.elapsed();
        if elapsed < self.tick_duration {
            thread::sleep(self.tick_duration - elapsed);
        }

        self.tick += 1;
        tick
    }

    /// Drives `body` forever at the configured tick rate. `should_stop` is
    /// checked once per tick so callers can wire up graceful shutdown.
    pub fn run<F: FnMut(u64), S: Fn() -> bool>(&mut self, mut body: F, should_stop: S) {
        loop {
            if should_stop() {
                break;
            }
            self.run_once(&mut body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_once_advances_tick() {
        let mut driver = TickDriver::new(1000);
        let first = driver.run_once(|_| {});
        let second = driver.run_once(|_| {});

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(driver.current_tick(), 2);
    }

    #[test]
    fn test_run_stops_when_requested() {
        let mut driver = TickDriver::new(2000);
        let mut count = 0;
        let mut stop_after = 3;

        driver.run(
            |_| count += 1,
            || {
                stop_after -= 1;
                stop_after < 0
            },
        );

        assert_eq!(count, 3);
    }
}
