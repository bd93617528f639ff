//! Directional exits between containers.
//!
//! Each Container may carry an [`ExitTable`] with one slot per single
//! direction. An exit atom may occupy several slots at once (`north|up`);
//! every slot it occupies remembers the full shared set so the set can be
//! written back out and split cleanly when one direction is removed.

use tarn_core::{AtomId, Direction, WorldError};

use crate::store::Store;
use crate::value::Value;

/// Field on an exit atom naming the container it leads to.
pub const DESTINATION: &str = "destination";
/// Field on an exit atom naming the matching exit on the far side.
pub const OTHER_SIDE: &str = "other_side";

/// One occupied slot of an [`ExitTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitSlot {
    /// The exit atom.
    pub exit: AtomId,
    /// Every direction this exit is registered under in the same table.
    pub shared: Direction,
}

/// Direction → exit atom table of one container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExitTable {
    slots: [Option<ExitSlot>; Direction::COUNT],
}

impl ExitTable {
    /// The exit in a single direction.
    pub fn get(&self, dir: Direction) -> Option<AtomId> {
        self.slot(dir).map(|s| s.exit)
    }

    /// The full slot in a single direction.
    pub fn slot(&self, dir: Direction) -> Option<ExitSlot> {
        self.slots[dir.slot()?]
    }

    /// Register `exit` under every direction in `dirs`, displacing
    /// whatever was there.
    pub fn set(&mut self, dirs: Direction, exit: AtomId) -> Result<(), WorldError> {
        if dirs.is_empty() || Direction::from_bits(dirs.bits()).is_none() {
            return Err(WorldError::InvalidDirection { direction: dirs });
        }
        for d in dirs.iter() {
            self.clear(d);
        }
        for d in dirs.iter() {
            if let Some(s) = d.slot() {
                self.slots[s] = Some(ExitSlot { exit, shared: dirs });
            }
        }
        Ok(())
    }

    /// Clear a single direction. Other directions sharing the slot stay,
    /// with the removed direction dropped from their shared set.
    pub fn remove(&mut self, dir: Direction) -> Option<AtomId> {
        dir.slot()?;
        self.clear(dir).map(|s| s.exit)
    }

    fn clear(&mut self, dir: Direction) -> Option<ExitSlot> {
        let old = self.slots[dir.slot()?].take()?;
        let rest = old.shared.without(dir);
        for d in rest.iter() {
            if let Some(Some(slot)) = d.slot().map(|s| &mut self.slots[s]) {
                if slot.exit == old.exit {
                    slot.shared = rest;
                }
            }
        }
        Some(old)
    }

    /// Remove `exit` from every slot, returning the directions it held.
    pub fn remove_exit(&mut self, exit: AtomId) -> Direction {
        let mut removed = Direction::NONE;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some_and(|s| s.exit == exit) {
                *slot = None;
                if let Some(d) = Direction::from_slot(i) {
                    removed = removed.union(d);
                }
            }
        }
        removed
    }

    /// Distinct entries: each shared set once, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = ExitSlot> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let s = (*slot)?;
            let first = s.shared.iter().next().and_then(Direction::slot);
            (first == Some(i)).then_some(s)
        })
    }

    /// Every direction with an exit.
    pub fn directions(&self) -> Direction {
        self.entries()
            .fold(Direction::NONE, |acc, s| acc.union(s.shared))
    }

    /// Whether no direction has an exit.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl Store {
    /// The live exit leading out of `room` in a single direction.
    pub fn exit(&self, room: AtomId, dir: Direction) -> Option<AtomId> {
        self.atom(room)
            .ok()?
            .exits()?
            .get(dir)
            .filter(|e| self.is_live(*e))
    }

    /// `room`'s exit table, if it ever had an exit.
    pub fn exits_of(&self, room: AtomId) -> Option<&ExitTable> {
        self.atom(room).ok()?.exits()
    }

    /// Register `exit` under `dirs` in `room`'s table.
    pub fn set_exit(&mut self, room: AtomId, dirs: Direction, exit: AtomId) -> Result<(), WorldError> {
        self.atom(exit)?;
        let r = self.atom(room)?;
        if !r.kind().holds_contents() {
            return Err(WorldError::NotAContainer {
                id: r.id().to_string(),
            });
        }
        let mut table = r.exits().cloned().unwrap_or_default();
        table.set(dirs, exit)?;
        if let Some(hold) = self.atom_mut(room)?.hold.as_mut() {
            hold.exits = Some(table);
        }
        Ok(())
    }

    fn check_exit_side(&self, room: AtomId, dirs: Direction, exit: AtomId) -> Result<(), WorldError> {
        self.atom(exit)?;
        let r = self.atom(room)?;
        if !r.kind().holds_contents() {
            return Err(WorldError::NotAContainer {
                id: r.id().to_string(),
            });
        }
        if dirs.is_empty() {
            return Err(WorldError::InvalidDirection { direction: dirs });
        }
        Ok(())
    }

    /// Link two rooms both ways: `exit` leads from `room` (under `dirs`)
    /// to `dest`, and `back` leads from `dest` (under `back_dirs`) to
    /// `room`. Each exit's `other_side` names the other.
    pub fn add_exit(
        &mut self,
        room: AtomId,
        dirs: Direction,
        exit: AtomId,
        dest: AtomId,
        back_dirs: Direction,
        back: AtomId,
    ) -> Result<(), WorldError> {
        self.check_exit_side(room, dirs, exit)?;
        self.check_exit_side(dest, back_dirs, back)?;
        if exit == back {
            return Err(WorldError::DuplicateId {
                id: self.describe(exit),
            });
        }
        self.set_field(exit, DESTINATION, Value::Atom(dest))?;
        self.set_field(exit, OTHER_SIDE, Value::Atom(back))?;
        self.set_field(back, DESTINATION, Value::Atom(room))?;
        self.set_field(back, OTHER_SIDE, Value::Atom(exit))?;
        self.set_exit(room, dirs, exit)?;
        self.set_exit(dest, back_dirs, back)
    }

    /// Link `room` to `dest` one way.
    pub fn add_one_way_exit(
        &mut self,
        room: AtomId,
        dirs: Direction,
        exit: AtomId,
        dest: AtomId,
    ) -> Result<(), WorldError> {
        self.check_exit_side(room, dirs, exit)?;
        self.atom(dest)?;
        self.set_field(exit, DESTINATION, Value::Atom(dest))?;
        self.remove_field(exit, OTHER_SIDE)?;
        self.set_exit(room, dirs, exit)
    }

    /// Unregister the exit in direction `dir` of `room` and its far side,
    /// returning both exit atoms. The atoms themselves are left alone;
    /// [`Realm::remove_exit`](crate::Realm::remove_exit) deletes them.
    pub(crate) fn unlink_exit(
        &mut self,
        room: AtomId,
        dir: Direction,
    ) -> Result<(AtomId, Option<AtomId>), WorldError> {
        let exit = self.exit(room, dir).ok_or_else(|| WorldError::NoExit {
            id: self.describe(room),
            direction: dir,
        })?;
        let other = self
            .raw_property(exit, OTHER_SIDE)
            .and_then(|v| v.as_atom())
            .filter(|o| self.is_live(*o));
        let far_room = self
            .raw_property(exit, DESTINATION)
            .and_then(|v| v.as_atom())
            .filter(|d| self.is_live(*d));

        if let Some(hold) = self.atom_mut(room)?.hold.as_mut() {
            if let Some(table) = hold.exits.as_mut() {
                table.remove_exit(exit);
            }
        }
        if let (Some(other), Some(far_room)) = (other, far_room) {
            if let Some(hold) = self.atom_mut(far_room)?.hold.as_mut() {
                if let Some(table) = hold.exits.as_mut() {
                    table.remove_exit(other);
                }
            }
        }
        Ok((exit, other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_slots_split_on_removal() {
        let mut table = ExitTable::default();
        let both = Direction::NORTH.union(Direction::UP);
        table.set(both, AtomId(9)).unwrap();
        assert_eq!(table.get(Direction::UP), Some(AtomId(9)));
        assert_eq!(table.entries().count(), 1);

        assert_eq!(table.remove(Direction::NORTH), Some(AtomId(9)));
        assert_eq!(
            table.slot(Direction::UP),
            Some(ExitSlot {
                exit: AtomId(9),
                shared: Direction::UP
            })
        );
        assert_eq!(table.directions(), Direction::UP);
    }

    #[test]
    fn overwriting_a_direction_shrinks_the_old_share() {
        let mut table = ExitTable::default();
        table.set(Direction::EAST.union(Direction::IN), AtomId(1)).unwrap();
        table.set(Direction::IN, AtomId(2)).unwrap();
        let entries: Vec<_> = table.entries().collect();
        assert_eq!(
            entries,
            [
                ExitSlot {
                    exit: AtomId(1),
                    shared: Direction::EAST
                },
                ExitSlot {
                    exit: AtomId(2),
                    shared: Direction::IN
                },
            ]
        );
    }

    #[test]
    fn empty_or_unknown_directions_are_rejected() {
        let mut table = ExitTable::default();
        assert!(table.set(Direction::NONE, AtomId(1)).is_err());
        assert!(table.is_empty());
        assert_eq!(table.remove(Direction::ALL), None);
    }

    #[test]
    fn two_way_exits_point_at_each_other() {
        let mut store = Store::new();
        let core = store.core();
        let hall = store.create(Some("hall"), &[core.container]).unwrap();
        let yard = store.create(Some("yard"), &[core.container]).unwrap();
        let door = store.create(Some("door"), &[core.thing]).unwrap();
        let gate = store.create(Some("gate"), &[core.thing]).unwrap();
        store
            .add_exit(hall, Direction::NORTH, door, yard, Direction::SOUTH, gate)
            .unwrap();

        assert_eq!(store.exit(hall, Direction::NORTH), Some(door));
        assert_eq!(store.exit(yard, Direction::SOUTH), Some(gate));
        assert_eq!(store.field(door, DESTINATION), Some(yard.into()));
        assert_eq!(store.field(gate, OTHER_SIDE), Some(door.into()));

        assert_eq!(store.unlink_exit(hall, Direction::NORTH), Ok((door, Some(gate))));
        assert_eq!(store.exit(hall, Direction::NORTH), None);
        assert_eq!(store.exit(yard, Direction::SOUTH), None);
        assert!(matches!(
            store.unlink_exit(hall, Direction::NORTH),
            Err(WorldError::NoExit { .. })
        ));
    }

    #[test]
    fn one_way_exit_has_no_other_side() {
        let mut store = Store::new();
        let core = store.core();
        let pit = store.create(Some("pit"), &[core.container]).unwrap();
        let cave = store.create(Some("cave"), &[core.container]).unwrap();
        let chute = store.create(Some("chute"), &[core.thing]).unwrap();
        store
            .add_one_way_exit(pit, Direction::DOWN, chute, cave)
            .unwrap();
        assert_eq!(store.exit(pit, Direction::DOWN), Some(chute));
        assert_eq!(store.exits_of(cave), None);
        assert_eq!(store.unlink_exit(pit, Direction::DOWN), Ok((chute, None)));
    }
}
