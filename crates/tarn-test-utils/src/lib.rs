//! Test utilities and fixtures for Tarn development.
//!
//! Provides a recording output sink ([`RecordingWatcher`]) and a
//! [`SampleWorld`] builder with a small, fixed room layout. Canned
//! handlers live in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex, PoisonError};

use tarn_core::{AtomId, Direction, WorldError};
use tarn_world::{Event, Realm, RealmConfig, Watcher};

/// One message captured by a [`RecordingWatcher`].
#[derive(Clone, Debug, PartialEq)]
pub struct Heard {
    pub message: String,
    /// Id of the triggering event, if there was one.
    pub event: Option<String>,
}

/// Output sink that records every message it receives.
///
/// Cloning shares the underlying log, so a test can keep one clone and
/// hand the other to the store.
#[derive(Clone, Debug, Default)]
pub struct RecordingWatcher {
    log: Arc<Mutex<Vec<Heard>>>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed clone ready for `Store::watch`.
    pub fn sink(&self) -> Box<dyn Watcher> {
        Box::new(self.clone())
    }

    /// Everything heard so far.
    pub fn heard(&self) -> Vec<Heard> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Just the message texts.
    pub fn messages(&self) -> Vec<String> {
        self.heard().into_iter().map(|h| h.message).collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Watcher for RecordingWatcher {
    fn notify(&mut self, message: &str, event: Option<&Event>) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Heard {
                message: message.to_string(),
                event: event.map(|e| e.id.clone()),
            });
    }
}

/// Handles of the atoms in a [`SampleWorld`].
#[derive(Clone, Copy, Debug)]
pub struct SampleAtoms {
    /// Plain type atom; `weapon` inherits from it.
    pub item: AtomId,
    /// Plain type atom inheriting from `item`.
    pub weapon: AtomId,
    pub hall: AtomId,
    pub garden: AtomId,
    /// Mobile standing in the hall.
    pub alice: AtomId,
    /// Container in the hall.
    pub chest: AtomId,
    /// Thing inside the chest.
    pub sword: AtomId,
    /// Exit from hall (north) to garden.
    pub door: AtomId,
    /// Exit from garden (south) to hall.
    pub gate: AtomId,
}

/// Builder for a small populated realm.
///
/// ```text
/// hall ── north/south ── garden
///  ├─ alice (mobile)
///  └─ chest
///      └─ sword (item > weapon)
/// ```
pub struct SampleWorld {
    config: RealmConfig,
    freeze_types: bool,
}

impl SampleWorld {
    pub fn new() -> Self {
        Self {
            config: RealmConfig::default(),
            freeze_types: false,
        }
    }

    pub fn config(mut self, config: RealmConfig) -> Self {
        self.config = config;
        self
    }

    /// Freeze `item` and `weapon` so they count as core atoms.
    pub fn frozen_types(mut self) -> Self {
        self.freeze_types = true;
        self
    }

    /// Build into a fresh realm.
    pub fn build(self) -> Result<(Realm, SampleAtoms), WorldError> {
        let mut realm = Realm::new(self.config.clone());
        let atoms = self.populate(&mut realm)?;
        Ok((realm, atoms))
    }

    /// Populate an existing realm. Fails if any identifier is taken.
    pub fn populate(&self, realm: &mut Realm) -> Result<SampleAtoms, WorldError> {
        let core = realm.store().core();
        let item = realm.create(Some("item"), &[])?;
        let weapon = realm.create(Some("weapon"), &[item])?;
        if self.freeze_types {
            realm.store_mut().freeze(item)?;
            realm.store_mut().freeze(weapon)?;
        }
        let hall = realm.create(Some("hall"), &[core.container])?;
        let garden = realm.create(Some("garden"), &[core.container])?;
        let alice = realm.create(Some("alice"), &[core.mobile])?;
        let chest = realm.create(Some("chest"), &[core.container])?;
        let sword = realm.create(Some("sword"), &[weapon, core.thing])?;
        let door = realm.create(Some("door"), &[core.thing])?;
        let gate = realm.create(Some("gate"), &[core.thing])?;

        let store = realm.store_mut();
        store.set_field(alice, "name", "Alice".into())?;
        store.set_field(chest, "name", "a chest".into())?;
        store.set_field(sword, "name", "a sword".into())?;
        store.set_field(weapon, "damage", 5.into())?;
        store.move_to(alice, hall)?;
        store.move_to(chest, hall)?;
        store.move_to(sword, chest)?;
        store.add_exit(hall, Direction::NORTH, door, garden, Direction::SOUTH, gate)?;

        Ok(SampleAtoms {
            item,
            weapon,
            hall,
            garden,
            alice,
            chest,
            sword,
            door,
            gate,
        })
    }
}

impl Default for SampleWorld {
    fn default() -> Self {
        Self::new()
    }
}
