//! Global phase arbiter
//!
//! One slot per intersection. A slot holds the phase group that currently
//! has right-of-way plus the set of directions holding it. Requests for a
//! conflicting group park on the slot's `Notify` and re-check whenever the
//! slot empties.
//!
//! The first release by any holder closes the group: its remaining holders
//! finish, nobody new joins, and the slot drains to none. A group that has
//! just drained does not take the slot straight back while another group is
//! waiting for it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crossway_core::{Direction, NodeId, PhaseGroup};

#[derive(Debug, Default)]
struct Grant {
    group: Option<PhaseGroup>,
    holders: Vec<Direction>,
    /// Set by the first release; cleared when the slot empties
    draining: bool,
    /// Group that held the slot before it last emptied
    last: Option<PhaseGroup>,
    /// Parked requests per group
    waiting: [usize; 3],
}

impl Grant {
    fn admits(&self, requested: PhaseGroup) -> bool {
        if self.draining {
            return false;
        }
        match self.group {
            Some(_) => is_grantable(self.group, requested),
            None => self.last != Some(requested) || !self.others_waiting(requested),
        }
    }

    fn others_waiting(&self, group: PhaseGroup) -> bool {
        self.waiting
            .iter()
            .enumerate()
            .any(|(i, n)| i != group.index() && *n > 0)
    }
}

#[derive(Debug, Default)]
struct Slot {
    grant: Mutex<Grant>,
    released: Notify,
}

/// A parked request, counted in its slot until granted or dropped
struct Parked<'a> {
    slot: &'a Slot,
    group: PhaseGroup,
    counted: bool,
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        if self.counted {
            self.slot.grant.lock().waiting[self.group.index()] -= 1;
            // A group held back for this request may go now
            self.slot.released.notify_waiters();
        }
    }
}

/// Whether `requested` may be granted while `active` holds the slot
pub fn is_grantable(active: Option<PhaseGroup>, requested: PhaseGroup) -> bool {
    match active {
        None => true,
        // Pedestrians need an empty slot, and hold it exclusively
        Some(group) => requested != PhaseGroup::Pedestrian && group == requested,
    }
}

/// Mutual exclusion of conflicting phase groups, per intersection
#[derive(Debug, Default)]
pub struct PhaseArbiter {
    slots: RwLock<HashMap<NodeId, Arc<Slot>>>,
}

impl PhaseArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, crossing: &NodeId) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(crossing) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(crossing.clone()).or_default())
    }

    /// Wait until `direction` holds right-of-way at `crossing`.
    ///
    /// Dropping the future before it resolves leaves the slot untouched.
    pub async fn request_green(&self, crossing: &NodeId, direction: Direction) {
        let slot = self.slot(crossing);
        let requested = direction.group();
        let mut parked = Parked {
            slot: &slot,
            group: requested,
            counted: false,
        };

        loop {
            let released = slot.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            {
                let mut grant = slot.grant.lock();
                let holding = grant.holders.contains(&direction);
                if holding || grant.admits(requested) {
                    if parked.counted {
                        grant.waiting[requested.index()] -= 1;
                        parked.counted = false;
                    }
                    grant.group = Some(requested);
                    if !holding {
                        grant.holders.push(direction);
                    }
                    tracing::debug!(%crossing, %direction, "phase granted");
                    return;
                }
                if !parked.counted {
                    grant.waiting[requested.index()] += 1;
                    parked.counted = true;
                }
            }

            released.await;
        }
    }

    /// Give up right-of-way held by `direction`.
    ///
    /// Closes the group to new joiners. The slot empties once its last
    /// holder releases; every waiter on the crossing is then woken to
    /// re-check. Returns false for a direction that held nothing.
    pub fn release_green(&self, crossing: &NodeId, direction: Direction) -> bool {
        let slot = self.slot(crossing);
        let mut grant = slot.grant.lock();

        let Some(pos) = grant.holders.iter().position(|d| *d == direction) else {
            tracing::debug!(%crossing, %direction, "release without grant ignored");
            return false;
        };
        grant.holders.swap_remove(pos);
        grant.draining = true;

        if grant.holders.is_empty() {
            grant.last = grant.group.take();
            grant.draining = false;
            drop(grant);
            slot.released.notify_waiters();
        }
        tracing::debug!(%crossing, %direction, "phase released");
        true
    }

    /// Group currently holding right-of-way at `crossing`
    pub fn active(&self, crossing: &NodeId) -> Option<PhaseGroup> {
        self.slots
            .read()
            .get(crossing)
            .and_then(|slot| slot.grant.lock().group)
    }
}
