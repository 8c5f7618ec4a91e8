//! In-process shared store for snake paths and snacks

pub mod shared;

pub use shared::{
    DisconnectHook, PathEvent, PathFeed, RosterEvent, SharedStore, SnackEvent, StoreError,
    StoreStats, DEFAULT_CHANNEL_CAPACITY,
};
