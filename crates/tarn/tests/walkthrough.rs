//! A player walks between rooms through the facade, with every step
//! dispatched on the consumer thread.

use tarn::prelude::*;
use tarn::world::DESTINATION;
use tarn_test_utils::{RecordingWatcher, SampleWorld};

fn go(ctx: &mut Ctx<'_>) -> Result<Value, HandlerError> {
    let (Some(me), Some(dir)) = (ctx.actor(), ctx.arg(0).and_then(Value::as_str).and_then(Direction::parse))
    else {
        return Ok(Value::Bool(false));
    };
    let Some(here) = ctx.store().container_of(me) else {
        return Ok(Value::Bool(false));
    };
    let Some(exit) = ctx.store().exit(here, dir) else {
        ctx.tell_actor("You can't go that way.")?;
        return Ok(Value::Bool(true));
    };
    let Some(dest) = ctx.property(exit, DESTINATION)?.and_then(|v| v.as_atom()) else {
        return Ok(Value::Bool(false));
    };
    ctx.realm().store_mut().move_to(me, dest)?;
    let name = ctx.property(dest, "name")?;
    let name = name.as_ref().and_then(Value::as_str).unwrap_or("somewhere");
    ctx.tell_actor(&format!("You arrive in {name}."))?;
    Ok(Value::Bool(true))
}

#[test]
fn walking_through_exits_moves_the_player_and_reports() {
    let (mut realm, atoms) = SampleWorld::new().build().unwrap();
    let walk = realm.register("go", go).unwrap();
    let mobile = realm.store().core().mobile;
    realm.store_mut().set_field(mobile, "go", walk.into()).unwrap();
    realm.store_mut().set_field(atoms.garden, "name", "the garden".into()).unwrap();
    realm.store_mut().set_field(atoms.hall, "name", "the hall".into()).unwrap();

    let mut world = World::from_realm(EngineConfig::default(), realm).unwrap();
    let heard = RecordingWatcher::new();
    world.watch(atoms.alice, heard.sink(), true).unwrap();
    world.start().unwrap();

    for dir in ["north", "north", "south"] {
        let step = Event::new("go").by(atoms.alice).on(atoms.alice).with_arg(dir);
        assert!(world.send_now(step).unwrap());
    }
    world.stop().unwrap();

    assert_eq!(
        heard.messages(),
        ["You arrive in the garden.", "You can't go that way.", "You arrive in the hall."]
    );
    let home = world
        .with_realm(move |realm| realm.store().container_of(atoms.alice))
        .unwrap();
    assert_eq!(home, Some(atoms.hall));
    assert_eq!(world.stats().faults, 0);
}
