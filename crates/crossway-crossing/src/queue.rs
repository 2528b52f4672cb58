//! Per-direction vehicle queue
//!
//! FIFO with running counters. A single signal cycle consumes it; any number
//! of producers (hub link, inbound listener) feed it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crossway_core::{Vehicle, VehicleType};

/// Counters accumulated over the queue's lifetime
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueStats {
    pub len: usize,
    pub max_len: usize,
    pub enqueued: u64,
    pub dequeued: u64,
    pub sample_sum: u64,
    pub samples: u64,
    /// Enqueued vehicles by `VehicleType::index`
    pub by_type: [u64; 3],
}

impl QueueStats {
    /// Mean sampled size, 0 before the first sample
    pub fn average(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.sample_sum as f64 / self.samples as f64
        }
    }

    pub fn count(&self, vehicle_type: VehicleType) -> u64 {
        self.by_type[vehicle_type.index()]
    }
}

#[derive(Debug, Default)]
struct Inner {
    vehicles: VecDeque<Vehicle>,
    stats: QueueStats,
}

#[derive(Debug, Default)]
pub struct VehicleQueue {
    inner: Mutex<Inner>,
    available: Notify,
    closed: AtomicBool,
}

impl VehicleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, vehicle: Vehicle) {
        {
            let mut inner = self.inner.lock();
            let Inner { vehicles, stats } = &mut *inner;
            stats.by_type[vehicle.vehicle_type.index()] += 1;
            stats.enqueued += 1;
            vehicles.push_back(vehicle);
            stats.max_len = stats.max_len.max(vehicles.len());
        }
        self.available.notify_one();
    }

    /// Take the head without waiting
    pub fn try_poll(&self) -> Option<Vehicle> {
        let mut inner = self.inner.lock();
        let vehicle = inner.vehicles.pop_front()?;
        inner.stats.dequeued += 1;
        Some(vehicle)
    }

    /// Wait until a vehicle is queued, leaving it in place. False once the
    /// queue is closed.
    pub async fn ready(&self) -> bool {
        loop {
            let available = self.available.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            if self.is_closed() {
                return false;
            }
            if !self.is_empty() {
                return true;
            }
            available.await;
        }
    }

    /// Wait for the head. Returns None once the queue is closed.
    pub async fn poll(&self) -> Option<Vehicle> {
        while self.ready().await {
            if let Some(vehicle) = self.try_poll() {
                return Some(vehicle);
            }
        }
        None
    }

    /// Fold the current size into the running average
    pub fn sample(&self) {
        let mut inner = self.inner.lock();
        let len = inner.vehicles.len() as u64;
        inner.stats.sample_sum += len;
        inner.stats.samples += 1;
    }

    pub fn average_size(&self) -> f64 {
        self.inner.lock().stats.average()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            len: inner.vehicles.len(),
            ..inner.stats.clone()
        }
    }

    /// Wake the consumer and make every later `poll` return None
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
