//! Read-only reconstruction of another player's snake

use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, warn};

use crate::store::{PathEvent, PathFeed, SharedStore};

use super::path::{InflectionPath, SnakeView};
use super::types::{Coord, SnakeId};

/// Rebuilds a remote snake's path by replaying its change notifications in
/// arrival order. The mirror never writes back to the store.
pub struct RemoteSnakeMirror {
    id: SnakeId,
    path: InflectionPath,
    events: PathFeed,
    store: SharedStore,
}

impl RemoteSnakeMirror {
    /// Start mirroring `id` from its current stored value
    pub fn subscribe(id: SnakeId, store: &SharedStore) -> Self {
        let sub = store.subscribe_path(&id);
        Self {
            path: InflectionPath::from_points(sub.initial.unwrap_or_default()),
            events: sub.events,
            store: store.clone(),
            id,
        }
    }

    pub fn id(&self) -> &SnakeId {
        &self.id
    }

    pub fn points(&self) -> &[Coord] {
        self.path.points()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Apply one notification. Returns false if it referenced an index this
    /// mirror has not seen yet, in which case the caller should resync.
    pub fn apply(&mut self, event: PathEvent) -> bool {
        match event {
            PathEvent::Value(Some(points)) => {
                self.path.replace(points);
                true
            }
            PathEvent::Value(None) => {
                self.path.clear();
                true
            }
            PathEvent::PointAdded { index, point } => self.path.insert_point(index, point),
            PathEvent::PointRemoved { index } => self.path.remove_point(index).is_some(),
            PathEvent::PointChanged { index, point } => {
                if index == self.path.point_count() {
                    self.path.push_point(point);
                    true
                } else {
                    self.path.set_point(index, point)
                }
            }
        }
    }

    /// Drain every pending notification. Returns how many were applied.
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.apply(event) {
                        applied += 1;
                    } else {
                        debug!(snake_id = %self.id, "Mirror saw an unknown index, resyncing");
                        self.resync();
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(snake_id = %self.id, skipped, "Mirror lagged, resyncing");
                    self.resync();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    /// Replace local state with the stored value and a fresh channel
    fn resync(&mut self) {
        let sub = self.store.subscribe_path(&self.id);
        self.path.replace(sub.initial.unwrap_or_default());
        self.events = sub.events;
    }
}

impl SnakeView for RemoteSnakeMirror {
    fn head(&self) -> Option<Coord> {
        self.path.head()
    }

    fn length(&self) -> usize {
        self.path.len()
    }

    fn coords(&self) -> &[Coord] {
        self.path.cells()
    }

    fn occupies(&self, cell: Coord, include_head: bool) -> bool {
        self.path.occupies(cell, include_head)
    }
}
