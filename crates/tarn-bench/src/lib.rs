//! Benchmark profiles for the Tarn runtime.
//!
//! Provides deterministic, pre-built worlds for benchmarks and examples:
//!
//! - [`town_profile`]: a ring of rooms joined by exits, each holding items
//!   whose types sit at the bottom of a deep inheritance chain
//! - [`reference_profile`]: 100 rooms, 10 items each, type depth 8
//! - [`stress_profile`]: 1000 rooms, 20 items each, type depth 32
//! - [`engine_config`]: engine settings for throughput runs

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tarn_core::{AtomId, Direction, WorldError};
use tarn_engine::EngineConfig;
use tarn_world::{Realm, RealmConfig};

/// A populated benchmark world.
#[derive(Debug)]
pub struct Town {
    /// The realm holding every atom below.
    pub realm: Realm,
    /// Rooms in ring order; room `i` leads east to room `i + 1`.
    pub rooms: Vec<AtomId>,
    /// Every item, room by room.
    pub items: Vec<AtomId>,
    /// Most-derived item type; inherits the whole chain plus `shiny`.
    pub leaf_type: AtomId,
    /// A mobile standing in the first room.
    pub walker: AtomId,
}

/// Build a ring of `rooms` rooms with `items_per_room` items each.
///
/// Item types form a chain `kind0 <- kind1 <- ... <- kind{type_depth-1}`,
/// and the leaf also inherits a `shiny` mixin. `kind0` defines `weight`
/// and a `look` message, so lookups from an item walk the full chain.
pub fn town_profile(rooms: usize, items_per_room: usize, type_depth: usize) -> Result<Town, WorldError> {
    let mut realm = Realm::new(RealmConfig::default());
    let core = realm.store().core();

    let mut leaf = realm.create(Some("kind0"), &[])?;
    {
        let store = realm.store_mut();
        store.set_field(leaf, "weight", 1.into())?;
        store.set_field(leaf, "look", "You see nothing special.".into())?;
    }
    for depth in 1..type_depth.max(1) {
        leaf = realm.create(Some(&format!("kind{depth}")), &[leaf])?;
    }
    let shiny = realm.create(Some("shiny"), &[])?;
    realm.store_mut().set_field(shiny, "glint", true.into())?;
    realm.store_mut().inherit(leaf, shiny)?;

    let mut room_ids = Vec::with_capacity(rooms);
    for r in 0..rooms {
        let room = realm.create(Some(&format!("room{r}")), &[core.container])?;
        realm.store_mut().set_field(room, "name", format!("Room {r}").into())?;
        room_ids.push(room);
    }
    if rooms > 1 {
        for r in 0..rooms {
            let next = (r + 1) % rooms;
            if rooms == 2 && r == 1 {
                break;
            }
            let east = realm.create(Some(&format!("east{r}")), &[core.thing])?;
            let west = realm.create(Some(&format!("west{next}")), &[core.thing])?;
            realm
                .store_mut()
                .add_exit(room_ids[r], Direction::EAST, east, room_ids[next], Direction::WEST, west)?;
        }
    }

    let mut items = Vec::with_capacity(rooms * items_per_room);
    for (r, &room) in room_ids.iter().enumerate() {
        for k in 0..items_per_room {
            let item = realm.create(Some(&format!("item{r}x{k}")), &[leaf, core.thing])?;
            realm.store_mut().move_to(item, room)?;
            items.push(item);
        }
    }

    let walker = realm.create(Some("walker"), &[core.mobile])?;
    if let Some(&first) = room_ids.first() {
        realm.store_mut().move_to(walker, first)?;
    }

    Ok(Town {
        realm,
        rooms: room_ids,
        items,
        leaf_type: leaf,
        walker,
    })
}

/// 100 rooms, 10 items each, type depth 8.
pub fn reference_profile() -> Result<Town, WorldError> {
    town_profile(100, 10, 8)
}

/// 1000 rooms, 20 items each, type depth 32.
pub fn stress_profile() -> Result<Town, WorldError> {
    town_profile(1000, 20, 32)
}

/// Engine settings for throughput runs: a tight scheduler poll.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        poll_interval_ms: 1,
        ..EngineConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_builds() {
        let town = reference_profile().unwrap();
        assert_eq!(town.rooms.len(), 100);
        assert_eq!(town.items.len(), 1000);
        assert_eq!(town.realm.store().container_of(town.walker), Some(town.rooms[0]));
    }

    #[test]
    fn items_see_the_whole_type_chain() {
        let town = town_profile(3, 2, 5).unwrap();
        let store = town.realm.store();
        let item = town.items[0];
        assert_eq!(store.raw_property(item, "weight"), Some(1.into()));
        assert_eq!(store.raw_property(item, "glint"), Some(true.into()));
        assert_eq!(store.depth(item), store.depth(town.leaf_type) + 1);
    }

    #[test]
    fn rooms_form_a_ring() {
        let town = town_profile(4, 0, 1).unwrap();
        let store = town.realm.store();
        assert!(store.exit(town.rooms[3], Direction::EAST).is_some());
        assert!(store.exit(town.rooms[0], Direction::WEST).is_some());
    }

    #[test]
    fn engine_config_validates() {
        engine_config().validate().unwrap();
    }
}
