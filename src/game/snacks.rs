//! Consumable snacks scattered over a bounded region

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::store::{SharedStore, SnackEvent};

use super::types::{Coord, SnackId};

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Coord,
    pub max: Coord,
}

impl Bounds {
    /// `None` unless `min <= max` on both axes
    pub fn new(min: Coord, max: Coord) -> Option<Self> {
        (min.x <= max.x && min.y <= max.y).then_some(Self { min, max })
    }

    pub fn contains(&self, cell: Coord) -> bool {
        (self.min.x..=self.max.x).contains(&cell.x) && (self.min.y..=self.max.y).contains(&cell.y)
    }

    /// Number of cells in the region
    pub fn area(&self) -> u64 {
        let w = (self.max.x as i64 - self.min.x as i64 + 1) as u64;
        let h = (self.max.y as i64 - self.min.y as i64 + 1) as u64;
        w * h
    }

    pub fn random_cell(&self, rng: &mut impl Rng) -> Coord {
        Coord::new(
            rng.gen_range(self.min.x..=self.max.x),
            rng.gen_range(self.min.y..=self.max.y),
        )
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Coord::new(-64, -64),
            max: Coord::new(64, 64),
        }
    }
}

/// Local view of the shared snack collection
pub struct SnackField {
    bounds: Bounds,
    snacks: HashMap<SnackId, Coord>,
    events: broadcast::Receiver<SnackEvent>,
    store: SharedStore,
    rng: ChaCha8Rng,
}

impl SnackField {
    pub fn new(store: &SharedStore, bounds: Bounds, rng: ChaCha8Rng) -> Self {
        let sub = store.subscribe_snacks();
        Self {
            bounds,
            snacks: sub.initial.into_iter().collect(),
            events: sub.events,
            store: store.clone(),
            rng,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Change the spawn region. Invalid corners leave it unchanged.
    /// Returns the region in force afterwards.
    pub fn set_bounds(&mut self, min: Coord, max: Coord) -> Bounds {
        if let Some(bounds) = Bounds::new(min, max) {
            self.bounds = bounds;
        }
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.snacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snacks.is_empty()
    }

    /// Snack coordinates in no particular order
    pub fn positions(&self) -> Vec<Coord> {
        self.snacks.values().copied().collect()
    }

    /// Apply pending additions and removals from other participants
    pub fn sync(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(SnackEvent::Added { id, position }) => {
                    self.snacks.insert(id, position);
                }
                Ok(SnackEvent::Removed { id }) => {
                    self.snacks.remove(&id);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Snack feed lagged, reloading");
                    let sub = self.store.subscribe_snacks();
                    self.snacks = sub.initial.into_iter().collect();
                    self.events = sub.events;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Eat the snack at `cell` if there is one, replacing it elsewhere.
    ///
    /// Returns false when nothing is there or another participant removed it
    /// from the store first.
    pub fn consume(&mut self, cell: Coord) -> bool {
        let Some(id) = self
            .snacks
            .iter()
            .find_map(|(id, pos)| (*pos == cell).then_some(*id))
        else {
            return false;
        };

        self.snacks.remove(&id);
        if self.store.remove_snack(id).is_none() {
            debug!(snack_id = %id, %cell, "Snack already taken");
            return false;
        }

        self.spawn();
        true
    }

    /// Add snacks until at least `count` exist or the region is full.
    /// Returns how many were added.
    pub fn populate(&mut self, count: usize) -> usize {
        let mut added = 0;
        while self.snacks.len() < count {
            if self.spawn().is_none() {
                break;
            }
            added += 1;
        }
        added
    }

    fn spawn(&mut self) -> Option<SnackId> {
        loop {
            let Some(position) = self.free_cell() else {
                warn!(bounds = ?self.bounds, "Snack region is full, not spawning");
                return None;
            };
            match self.store.try_add_snack(position) {
                Some(id) => {
                    self.snacks.insert(id, position);
                    debug!(snack_id = %id, %position, "Snack spawned");
                    return Some(id);
                }
                None => {
                    // another participant placed one there since the last sync
                    debug!(%position, "Snack cell taken, resampling");
                    self.sync();
                }
            }
        }
    }

    /// Random in-bounds cell without a snack, resampling on collision
    fn free_cell(&mut self) -> Option<Coord> {
        let taken: HashSet<Coord> = self
            .snacks
            .values()
            .copied()
            .filter(|pos| self.bounds.contains(*pos))
            .collect();
        if taken.len() as u64 >= self.bounds.area() {
            return None;
        }
        loop {
            let candidate = self.bounds.random_cell(&mut self.rng);
            if !taken.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
}
