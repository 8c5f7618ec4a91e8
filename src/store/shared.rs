//! In-process shared store with ordered per-key change notifications
//!
//! Snake paths are keyed by identity and hold the ordered inflection list.
//! Every write is applied and announced while the collection lock is held, so
//! notifications for one key arrive in write order and a subscription's
//! initial value is always consistent with the first event it receives.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::game::types::{Coord, SnackId, SnakeId};

/// Buffered notifications per channel before slow subscribers start lagging
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Change to one snake's inflection list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEvent {
    /// Whole list replaced; `None` means the entry was removed
    Value(Option<Vec<Coord>>),
    PointAdded { index: usize, point: Coord },
    PointRemoved { index: usize },
    PointChanged { index: usize, point: Coord },
}

/// Change to the set of live snake identities
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    Joined(SnakeId),
    Left(SnakeId),
}

/// Change to the snack collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnackEvent {
    Added { id: SnackId, position: Coord },
    Removed { id: SnackId },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no path stored for snake {0}")]
    MissingPath(SnakeId),

    #[error("index {index} out of range for snake {id} with {len} points")]
    IndexOutOfRange { id: SnakeId, index: usize, len: usize },
}

pub struct PathSubscription {
    pub initial: Option<Vec<Coord>>,
    pub events: PathFeed,
}

/// One subscriber's stream of a snake's changes.
///
/// Dropping the last feed of a snake that has left frees its slot.
pub struct PathFeed {
    rx: broadcast::Receiver<PathEvent>,
    store: SharedStore,
    id: SnakeId,
}

impl Deref for PathFeed {
    type Target = broadcast::Receiver<PathEvent>;

    fn deref(&self) -> &Self::Target {
        &self.rx
    }
}

impl DerefMut for PathFeed {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.rx
    }
}

impl Drop for PathFeed {
    fn drop(&mut self) {
        // our receiver is still alive here
        self.store.prune_slot(&self.id, 1);
    }
}

pub struct RosterSubscription {
    pub initial: Vec<SnakeId>,
    pub events: broadcast::Receiver<RosterEvent>,
}

pub struct SnackSubscription {
    pub initial: Vec<(SnackId, Coord)>,
    pub events: broadcast::Receiver<SnackEvent>,
}

/// Counters exposed on the stats endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub snakes: usize,
    pub snacks: usize,
    /// Path slots held, including departed snakes someone still watches
    pub slots: usize,
}

struct PathSlot {
    value: Option<Vec<Coord>>,
    tx: broadcast::Sender<PathEvent>,
}

impl PathSlot {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { value: None, tx }
    }

    fn emit(&self, event: PathEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }
}

struct StoreInner {
    snakes: RwLock<HashMap<SnakeId, PathSlot>>,
    roster_tx: broadcast::Sender<RosterEvent>,
    snacks: RwLock<HashMap<SnackId, Coord>>,
    snack_tx: broadcast::Sender<SnackEvent>,
    capacity: usize,
}

/// Cheaply cloneable handle to the store
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<StoreInner>,
}

impl SharedStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (roster_tx, _) = broadcast::channel(capacity);
        let (snack_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(StoreInner {
                snakes: RwLock::new(HashMap::new()),
                roster_tx,
                snacks: RwLock::new(HashMap::new()),
                snack_tx,
                capacity,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Snake paths
    // ------------------------------------------------------------------

    /// Replace a snake's whole inflection list. An empty list removes the entry.
    pub fn set_path(&self, id: &SnakeId, points: Vec<Coord>) {
        if points.is_empty() {
            self.remove_path(id);
            return;
        }

        let mut snakes = self.inner.snakes.write();
        let slot = snakes
            .entry(id.clone())
            .or_insert_with(|| PathSlot::new(self.inner.capacity));
        let joined = slot.value.is_none();
        slot.value = Some(points.clone());
        slot.emit(PathEvent::Value(Some(points)));

        if joined {
            debug!(snake_id = %id, "Snake entry created");
            let _ = self.inner.roster_tx.send(RosterEvent::Joined(id.clone()));
        }
    }

    /// Write a single point. `index` may equal the point count to append.
    pub fn set_point(&self, id: &SnakeId, index: usize, point: Coord) -> Result<(), StoreError> {
        let mut snakes = self.inner.snakes.write();
        let slot = snakes
            .entry(id.clone())
            .or_insert_with(|| PathSlot::new(self.inner.capacity));

        let joined = slot.value.is_none();
        let points = slot.value.get_or_insert_with(Vec::new);
        let len = points.len();

        if index < len {
            points[index] = point;
            slot.emit(PathEvent::PointChanged { index, point });
        } else if index == len {
            points.push(point);
            slot.emit(PathEvent::PointAdded { index, point });
        } else {
            if joined {
                slot.value = None;
            }
            return Err(StoreError::IndexOutOfRange {
                id: id.clone(),
                index,
                len,
            });
        }

        if joined {
            debug!(snake_id = %id, "Snake entry created by point write");
            let _ = self.inner.roster_tx.send(RosterEvent::Joined(id.clone()));
        }
        Ok(())
    }

    /// Delete a single point. Removing the last point removes the entry.
    pub fn remove_point(&self, id: &SnakeId, index: usize) -> Result<(), StoreError> {
        let mut snakes = self.inner.snakes.write();
        let slot = snakes
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingPath(id.clone()))?;
        let points = slot
            .value
            .as_mut()
            .ok_or_else(|| StoreError::MissingPath(id.clone()))?;

        if index >= points.len() {
            return Err(StoreError::IndexOutOfRange {
                id: id.clone(),
                index,
                len: points.len(),
            });
        }

        points.remove(index);
        let emptied = points.is_empty();
        slot.emit(PathEvent::PointRemoved { index });

        if emptied {
            slot.value = None;
            slot.emit(PathEvent::Value(None));
            debug!(snake_id = %id, "Snake entry emptied");
            let _ = self.inner.roster_tx.send(RosterEvent::Left(id.clone()));
        }
        Ok(())
    }

    /// Remove a snake's entry entirely. Returns false if there was none.
    pub fn remove_path(&self, id: &SnakeId) -> bool {
        let mut snakes = self.inner.snakes.write();
        let Some(slot) = snakes.get_mut(id) else {
            return false;
        };
        if slot.value.take().is_none() {
            return false;
        }

        slot.emit(PathEvent::Value(None));
        // watched slots are freed by their last feed
        if slot.tx.receiver_count() == 0 {
            snakes.remove(id);
        }

        debug!(snake_id = %id, "Snake entry removed");
        let _ = self.inner.roster_tx.send(RosterEvent::Left(id.clone()));
        true
    }

    pub fn path(&self, id: &SnakeId) -> Option<Vec<Coord>> {
        self.inner
            .snakes
            .read()
            .get(id)
            .and_then(|slot| slot.value.clone())
    }

    /// Every live snake and its inflection list
    pub fn paths(&self) -> Vec<(SnakeId, Vec<Coord>)> {
        self.inner
            .snakes
            .read()
            .iter()
            .filter_map(|(id, slot)| slot.value.clone().map(|points| (id.clone(), points)))
            .collect()
    }

    /// Subscribe to one snake's changes, receiving its current value atomically
    pub fn subscribe_path(&self, id: &SnakeId) -> PathSubscription {
        let mut snakes = self.inner.snakes.write();
        let slot = snakes
            .entry(id.clone())
            .or_insert_with(|| PathSlot::new(self.inner.capacity));
        PathSubscription {
            initial: slot.value.clone(),
            events: PathFeed {
                rx: slot.tx.subscribe(),
                store: self.clone(),
                id: id.clone(),
            },
        }
    }

    /// Drop the slot of a removed snake once at most `held` receivers remain
    fn prune_slot(&self, id: &SnakeId, held: usize) {
        let mut snakes = self.inner.snakes.write();
        let vacant = snakes
            .get(id)
            .is_some_and(|slot| slot.value.is_none() && slot.tx.receiver_count() <= held);
        if vacant {
            snakes.remove(id);
            debug!(snake_id = %id, "Released path slot");
        }
    }

    /// Subscribe to identities joining and leaving
    pub fn subscribe_roster(&self) -> RosterSubscription {
        let snakes = self.inner.snakes.read();
        let initial = snakes
            .iter()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        RosterSubscription {
            initial,
            events: self.inner.roster_tx.subscribe(),
        }
    }

    /// Register removal of `id` for when the returned hook is dropped
    pub fn on_disconnect_remove(&self, id: &SnakeId) -> DisconnectHook {
        DisconnectHook {
            store: self.clone(),
            id: id.clone(),
            armed: true,
        }
    }

    // ------------------------------------------------------------------
    // Snacks
    // ------------------------------------------------------------------

    /// Place a snack unless one already sits on `position`
    pub fn try_add_snack(&self, position: Coord) -> Option<SnackId> {
        let mut snacks = self.inner.snacks.write();
        if snacks.values().any(|taken| *taken == position) {
            return None;
        }
        let id = SnackId::generate();
        snacks.insert(id, position);
        let _ = self.inner.snack_tx.send(SnackEvent::Added { id, position });
        Some(id)
    }

    /// Remove a snack, returning its position if it was still present
    pub fn remove_snack(&self, id: SnackId) -> Option<Coord> {
        let mut snacks = self.inner.snacks.write();
        let position = snacks.remove(&id)?;
        let _ = self.inner.snack_tx.send(SnackEvent::Removed { id });
        Some(position)
    }

    pub fn snacks(&self) -> Vec<(SnackId, Coord)> {
        self.inner
            .snacks
            .read()
            .iter()
            .map(|(id, pos)| (*id, *pos))
            .collect()
    }

    pub fn subscribe_snacks(&self) -> SnackSubscription {
        let snacks = self.inner.snacks.read();
        SnackSubscription {
            initial: snacks.iter().map(|(id, pos)| (*id, *pos)).collect(),
            events: self.inner.snack_tx.subscribe(),
        }
    }

    pub fn stats(&self) -> StoreStats {
        let snakes = self.inner.snakes.read();
        StoreStats {
            snakes: snakes.values().filter(|slot| slot.value.is_some()).count(),
            snacks: self.inner.snacks.read().len(),
            slots: snakes.len(),
        }
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Removes a snake's entry when dropped, covering abrupt disconnects
pub struct DisconnectHook {
    store: SharedStore,
    id: SnakeId,
    armed: bool,
}

impl DisconnectHook {
    /// Remove the entry now instead of on drop
    pub fn fire(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        self.store.remove_path(&self.id)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Drop for DisconnectHook {
    fn drop(&mut self) {
        if self.fire() {
            debug!(snake_id = %self.id, "Removed snake entry on disconnect");
        }
    }
}
