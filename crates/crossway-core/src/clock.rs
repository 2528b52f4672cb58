//! Lamport logical clock
//!
//! The hub stamps every substantive inbound message with `increment()`.
//! That increment is the single point of serialization across sessions,
//! so it is a lock-free atomic rather than a mutex.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LamportClock {
    time: AtomicU64,
}

impl LamportClock {
    pub fn new() -> Self {
        LamportClock {
            time: AtomicU64::new(0),
        }
    }

    /// Local event or send: advance and return the new value
    #[inline]
    pub fn increment(&self) -> u64 {
        self.time.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Receive: local = max(local, received) + 1
    pub fn update(&self, received: u64) -> u64 {
        let mut current = self.time.load(Ordering::Acquire);
        loop {
            let next = current.max(received) + 1;
            match self.time.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    pub fn time(&self) -> u64 {
        self.time.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_update_takes_max() {
        let clock = LamportClock::new();
        clock.increment();
        assert_eq!(clock.update(10), 11);
        assert_eq!(clock.update(3), 12);
        assert_eq!(clock.time(), 12);
    }

    #[test]
    fn test_concurrent_increments_are_unique() {
        let clock = Arc::new(LamportClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..1000).map(|_| clock.increment()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 8000);
        assert_eq!(clock.time(), 8000);
    }

    proptest! {
        #[test]
        fn prop_stamps_strictly_increase(ops in proptest::collection::vec(proptest::option::of(0u64..1000), 1..200)) {
            let clock = LamportClock::new();
            let mut last = 0u64;
            for op in ops {
                let stamp = match op {
                    Some(received) => clock.update(received),
                    None => clock.increment(),
                };
                prop_assert!(stamp > last);
                last = stamp;
            }
        }
    }
}
