//! Tracks which snakes exist and keeps one mirror per remote identity

use std::collections::{BTreeMap, HashSet};

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::store::{RosterEvent, SharedStore};

use super::mirror::RemoteSnakeMirror;
use super::path::{PathError, SnakeView};
use super::snake::LocalSnake;
use super::types::{Coord, Direction, SnakeId};

/// The local player's snake plus mirrors of everyone else in the store.
///
/// Showcase identities (recorded runs kept in the store for display) are
/// mirrored separately and never count as opponents.
pub struct SnakeRegistry {
    player: LocalSnake,
    mirrors: BTreeMap<SnakeId, RemoteSnakeMirror>,
    showcase: BTreeMap<SnakeId, RemoteSnakeMirror>,
    showcase_ids: HashSet<SnakeId>,
    roster: broadcast::Receiver<RosterEvent>,
    store: SharedStore,
}

impl SnakeRegistry {
    /// Create the player's snake under `player_id` and mirror every other
    /// identity already in the store.
    pub fn new(
        store: &SharedStore,
        player_id: SnakeId,
        spawn: Vec<Coord>,
        direction: Direction,
        showcase_ids: impl IntoIterator<Item = SnakeId>,
    ) -> Result<Self, PathError> {
        let roster = store.subscribe_roster();
        let player = LocalSnake::new(player_id, spawn, direction, store.clone())?;

        let mut registry = Self {
            player,
            mirrors: BTreeMap::new(),
            showcase: BTreeMap::new(),
            showcase_ids: showcase_ids.into_iter().collect(),
            roster: roster.events,
            store: store.clone(),
        };
        for id in roster.initial {
            registry.on_joined(id);
        }
        Ok(registry)
    }

    pub fn player(&self) -> &LocalSnake {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut LocalSnake {
        &mut self.player
    }

    /// Remote snakes that currently occupy at least one cell
    pub fn opponents(&self) -> impl Iterator<Item = &RemoteSnakeMirror> {
        self.mirrors.values().filter(|m| m.length() > 0)
    }

    pub fn showcase(&self) -> impl Iterator<Item = &RemoteSnakeMirror> {
        self.showcase.values().filter(|m| m.length() > 0)
    }

    pub fn mirror(&self, id: &SnakeId) -> Option<&RemoteSnakeMirror> {
        self.mirrors.get(id).or_else(|| self.showcase.get(id))
    }

    /// Mirrors held, including empty ones
    pub fn tracked(&self) -> usize {
        self.mirrors.len() + self.showcase.len()
    }

    /// Apply pending roster changes, then bring every mirror up to date
    pub fn sync(&mut self) {
        loop {
            match self.roster.try_recv() {
                Ok(RosterEvent::Joined(id)) => self.on_joined(id),
                Ok(RosterEvent::Left(id)) => self.on_left(&id),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Roster lagged, rebuilding from store");
                    self.rebuild();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        for mirror in self.mirrors.values_mut().chain(self.showcase.values_mut()) {
            mirror.sync();
        }
    }

    fn on_joined(&mut self, id: SnakeId) {
        if &id == self.player.id() {
            return;
        }
        let table = if self.showcase_ids.contains(&id) {
            &mut self.showcase
        } else {
            &mut self.mirrors
        };
        if table.contains_key(&id) {
            return;
        }
        debug!(snake_id = %id, "Mirroring remote snake");
        let mirror = RemoteSnakeMirror::subscribe(id.clone(), &self.store);
        table.insert(id, mirror);
    }

    fn on_left(&mut self, id: &SnakeId) {
        if self.mirrors.remove(id).is_some() || self.showcase.remove(id).is_some() {
            debug!(snake_id = %id, "Dropped remote snake mirror");
        }
    }

    fn rebuild(&mut self) {
        let roster = self.store.subscribe_roster();
        self.roster = roster.events;

        let live: HashSet<SnakeId> = roster.initial.iter().cloned().collect();
        self.mirrors.retain(|id, _| live.contains(id));
        self.showcase.retain(|id, _| live.contains(id));
        for id in roster.initial {
            self.on_joined(id);
        }
    }
}
