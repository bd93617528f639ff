use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tarn_core::{AtomId, Direction, StartupError};
use tarn_world::{read_section, Ctx, Realm, RealmConfig, Value, START_EVENT};

/// Realm with the application's fixed core: a frozen `weapon` type and a
/// counting `start` handler on the thing marker.
fn boot(starts: &Arc<AtomicUsize>) -> Realm {
    let mut realm = Realm::new(RealmConfig::default());
    let counter = Arc::clone(starts);
    let start = realm.register("count_start", move |_ctx: &mut Ctx<'_>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Bool(true))
    }).unwrap();
    let thing = realm.store().core().thing;
    realm.store_mut().set_field(thing, START_EVENT, start.into()).unwrap();
    let weapon = realm.create(Some("weapon"), &[]).unwrap();
    realm.store_mut().freeze(weapon).unwrap();
    realm
}

fn populate(realm: &mut Realm) {
    let core = realm.store().core();
    let weapon = realm.store().find("weapon").unwrap();
    let blade = realm.create(Some("blade"), &[weapon]).unwrap();
    let keep = realm.create(Some("keep"), &[core.container]).unwrap();
    let moat = realm.create(Some("moat"), &[core.container]).unwrap();
    let sword = realm.create(Some("sword"), &[blade, core.thing]).unwrap();
    let bridge = realm.create(Some("bridge"), &[core.thing]).unwrap();
    let ramp = realm.create(Some("ramp"), &[core.thing]).unwrap();
    let store = realm.store_mut();
    store.set_field(blade, "edge", 3.into()).unwrap();
    store
        .set_field(sword, "tags", Value::List(vec!["sharp".into(), "true".into(), keep.into()]))
        .unwrap();
    store.move_to(sword, keep).unwrap();
    store
        .add_exit(keep, Direction::OUT, bridge, moat, Direction::IN, ramp)
        .unwrap();
}

fn export(realm: &Realm) -> String {
    let mut out = String::new();
    realm.export_atoms(&mut out);
    out
}

fn import(realm: &mut Realm, text: &str) -> Result<Vec<AtomId>, StartupError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
    let section = read_section(&mut lines)?;
    realm.import_atoms(&section)
}

#[test]
fn round_trip_preserves_ids_parents_fields_and_placement() {
    let starts = Arc::new(AtomicUsize::new(0));
    let mut original = boot(&starts);
    populate(&mut original);
    let text = export(&original);
    assert!(!text.contains("@@weapon@@"), "frozen atoms stay out of state");

    let loaded_starts = Arc::new(AtomicUsize::new(0));
    let mut copy = boot(&loaded_starts);
    let created = import(&mut copy, &text).unwrap();
    assert_eq!(created.len(), 6);
    // sword, bridge, ramp, keep, moat
    assert_eq!(loaded_starts.load(Ordering::SeqCst), 5);

    let store = copy.store();
    let sword = store.find("sword").unwrap();
    let keep = store.find("keep").unwrap();
    assert_eq!(store.container_of(sword), Some(keep));
    assert_eq!(
        store.field(sword, "tags"),
        Some(Value::List(vec!["sharp".into(), "true".into(), keep.into()]))
    );
    assert_eq!(store.raw_property(sword, "edge"), Some(Value::Int(3)));
    assert_eq!(
        store.exit(keep, Direction::OUT).and_then(|e| store.name_of(e)),
        Some("bridge")
    );
    assert_eq!(export(&copy), text);
}

#[test]
fn missing_core_atoms_are_named() {
    let starts = Arc::new(AtomicUsize::new(0));
    let mut original = boot(&starts);
    populate(&mut original);
    let text = export(&original);

    let mut bare = Realm::new(RealmConfig::default());
    let before = bare.store().len();
    assert_eq!(
        import(&mut bare, &text),
        Err(StartupError::MissingBootstrap {
            id: "weapon".into()
        })
    );
    assert_eq!(bare.store().len(), before);
}

#[test]
fn loading_twice_is_a_duplicate() {
    let starts = Arc::new(AtomicUsize::new(0));
    let mut realm = boot(&starts);
    populate(&mut realm);
    let text = export(&realm);
    assert!(matches!(
        import(&mut realm, &text),
        Err(StartupError::World(tarn_core::WorldError::DuplicateId { .. }))
    ));
}

#[test]
fn containers_keep_their_contents_order() {
    let starts = Arc::new(AtomicUsize::new(0));
    let mut original = boot(&starts);
    let core = original.store().core();
    let bread = original.create(Some("bread"), &[core.thing]).unwrap();
    let pantry = original.create(Some("pantry"), &[core.container]).unwrap();
    let apple = original.create(Some("apple"), &[core.thing]).unwrap();
    let jar = original.create(Some("jar"), &[core.container]).unwrap();
    let store = original.store_mut();
    // Placement order differs from creation order.
    store.move_to(jar, pantry).unwrap();
    store.move_to(apple, pantry).unwrap();
    store.move_to(bread, pantry).unwrap();
    store.move_to(apple, jar).unwrap();
    store.move_to(apple, pantry).unwrap();
    let names = |realm: &Realm, room: &str| -> Vec<String> {
        let store = realm.store();
        let id = store.find(room).unwrap();
        store.contents(id).iter().map(|&c| store.atom(c).unwrap().id().to_string()).collect()
    };
    assert_eq!(names(&original, "pantry"), ["jar", "bread", "apple"]);
    let text = export(&original);

    let mut copy = boot(&starts);
    import(&mut copy, &text).unwrap();
    assert_eq!(names(&copy, "pantry"), ["jar", "bread", "apple"]);
    assert_eq!(export(&copy), text);
}
