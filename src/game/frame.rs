//! Render frame building

use crate::ws::protocol::ServerMsg;

use super::path::SnakeView;
use super::registry::SnakeRegistry;
use super::snacks::SnackField;

/// Builds the per-frame render payload from a read-only view of the session
pub struct FrameBuilder;

impl FrameBuilder {
    pub fn build(tick: u64, playing: bool, registry: &SnakeRegistry, snacks: &SnackField) -> ServerMsg {
        let player = registry.player();
        let opponents: Vec<_> = registry.opponents().collect();

        ServerMsg::Frame {
            tick,
            player: player.coords().to_vec(),
            opponents: opponents.iter().map(|m| m.coords().to_vec()).collect(),
            showcase: registry.showcase().map(|m| m.coords().to_vec()).collect(),
            snacks: snacks.positions(),
            scores: scores(player, opponents.iter().copied()),
            playing,
        }
    }
}

/// Lengths with the local player first
pub fn scores<'a, V: SnakeView + 'a>(
    player: &impl SnakeView,
    opponents: impl IntoIterator<Item = &'a V>,
) -> Vec<usize> {
    std::iter::once(player.length())
        .chain(opponents.into_iter().map(|o| o.length()))
        .collect()
}

/// Delivery counters for one session, logged when it closes
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    pub sent: u64,
    pub dropped: u64,
}

impl FrameStats {
    pub fn record(&mut self, delivered: bool) {
        if delivered {
            self.sent += 1;
        } else {
            self.dropped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{Coord, Direction, SnakeId};
    use crate::game::snacks::Bounds;
    use crate::store::SharedStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn frame_lists_player_first() {
        let store = SharedStore::default();
        store.set_path(&SnakeId::from("rival"), vec![Coord::new(9, 0), Coord::new(9, 4)]);
        store.try_add_snack(Coord::new(2, 2)).unwrap();

        let registry = SnakeRegistry::new(
            &store,
            SnakeId::from("me"),
            vec![Coord::new(0, 0), Coord::new(0, 1)],
            Direction::North,
            Vec::new(),
        )
        .unwrap();
        let snacks = SnackField::new(&store, Bounds::default(), ChaCha8Rng::seed_from_u64(1));

        match FrameBuilder::build(3, true, &registry, &snacks) {
            ServerMsg::Frame {
                tick,
                player,
                opponents,
                snacks,
                scores,
                ..
            } => {
                assert_eq!(tick, 3);
                assert_eq!(player, vec![Coord::new(0, 0), Coord::new(0, 1)]);
                assert_eq!(opponents.len(), 1);
                assert_eq!(snacks, vec![Coord::new(2, 2)]);
                assert_eq!(scores, vec![2, 5]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn frame_stats_count_drops() {
        let mut stats = FrameStats::default();
        stats.record(true);
        stats.record(false);
        stats.record(true);
        assert_eq!((stats.sent, stats.dropped), (2, 1));
    }
}
