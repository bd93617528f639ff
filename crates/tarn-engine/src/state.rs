//! Dynamic-state text: a versioned header, the atom section, and the
//! pending-timer section.
//!
//! ```text
//! #tarn-state@@1@@<worldTimeSeconds>
//! Class@@id@@[ parent ... ]@@[ key=value ... ]@@container[@@[ bits=$exit ... ]]
//! @@
//! eventID@@actorID@@currentID@@[ arg ... ]@@fireTimeSeconds[@@[ target=$id bound=false expand=true ]]
//! @@
//! ```
//!
//! The optional last timer column carries routing state that differs from
//! a fresh `Event::new(id).on(current)`: a retargeted lookup root, an
//! unbound event, or message expansion. It is omitted when all three are
//! at their defaults.
//!
//! Loading validates the header and every timer reference before any atom
//! is created, so a rejected state leaves the realm untouched.

use std::collections::HashSet;

use tracing::{info, warn};

use tarn_core::{AtomId, StartupError, WorldTime};
use tarn_world::codec::{self, RawValue, SEPARATOR};
use tarn_world::{read_section, Event, Realm, Table, Value};

use crate::timer::Schedule;

/// First column of the header line.
pub const STATE_MAGIC: &str = "#tarn-state";
/// Format version written by this build.
pub const STATE_VERSION: u32 = 1;

/// What a successful load produced.
#[derive(Debug)]
pub struct LoadedState {
    /// Atoms created, in record order.
    pub atoms: Vec<AtomId>,
    /// Pending timers, with `fire_at` set.
    pub timers: Vec<Event>,
    /// World time recorded in the header.
    pub saved_at: WorldTime,
}

fn write_secs(out: &mut String, t: WorldTime) {
    out.push_str(&format!("{}.{:03}", t.as_millis() / 1000, t.as_millis() % 1000));
}

fn write_atom_column(out: &mut String, realm: &Realm, atom: Option<AtomId>) {
    let store = realm.store();
    if let Some(name) = atom.filter(|a| store.is_live(*a)).and_then(|a| store.name_of(a)) {
        out.push_str(name);
    }
}

/// Routing fields of `event` that a reload would not reproduce on its own.
fn routing_of(event: &Event, realm: &Realm) -> Table {
    let mut routing = Table::new();
    if event.target != event.current {
        let target = event
            .target
            .filter(|t| realm.store().is_live(*t))
            .map_or(Value::Null, Value::Atom);
        routing.insert("target".into(), target);
    }
    if !event.bound {
        routing.insert("bound".into(), Value::Bool(false));
    }
    if event.expand {
        routing.insert("expand".into(), Value::Bool(true));
    }
    routing
}

/// Render the full dynamic state of `realm` and `schedule` at `now`.
pub fn export_state(realm: &Realm, schedule: &Schedule, now: WorldTime) -> String {
    let mut out = String::new();
    out.push_str(STATE_MAGIC);
    out.push_str(SEPARATOR);
    out.push_str(&STATE_VERSION.to_string());
    out.push_str(SEPARATOR);
    write_secs(&mut out, now);
    out.push('\n');

    let atoms = realm.export_atoms(&mut out);

    let mut timers = 0;
    for event in schedule.pending() {
        if event.id.contains(SEPARATOR) || event.id.contains('\n') || event.id.is_empty() {
            warn!(event = %event.id, "timer with unwritable id skipped");
            continue;
        }
        out.push_str(&event.id);
        out.push_str(SEPARATOR);
        write_atom_column(&mut out, realm, event.actor);
        out.push_str(SEPARATOR);
        write_atom_column(&mut out, realm, event.current);
        out.push_str(SEPARATOR);
        codec::write_value(&mut out, &Value::List(event.args.clone()), realm.store());
        out.push_str(SEPARATOR);
        write_secs(&mut out, event.fire_at);
        let routing = routing_of(event, realm);
        if !routing.is_empty() {
            out.push_str(SEPARATOR);
            codec::write_value(&mut out, &Value::Table(routing), realm.store());
        }
        out.push('\n');
        timers += 1;
    }
    out.push_str(SEPARATOR);
    out.push('\n');
    info!(atoms, timers, now = %now, "state exported");
    out
}

fn parse_header(line: usize, text: &str) -> Result<WorldTime, StartupError> {
    let cols = codec::split_columns(text.trim_end_matches('\r'));
    if cols.len() != 3 || cols[0] != STATE_MAGIC {
        return Err(StartupError::malformed(line, "missing state header"));
    }
    let found: u32 = cols[1]
        .trim()
        .parse()
        .map_err(|_| StartupError::malformed(line, "bad format version"))?;
    if found != STATE_VERSION {
        return Err(StartupError::UnsupportedVersion { found });
    }
    parse_secs(line, cols[2])
}

fn parse_secs(line: usize, text: &str) -> Result<WorldTime, StartupError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(WorldTime::from_secs_f64)
        .ok_or_else(|| StartupError::malformed(line, format!("bad time '{}'", text.trim())))
}

struct TimerRecord {
    id: String,
    actor: Option<String>,
    current: Option<String>,
    args: Vec<RawValue>,
    fire_at: WorldTime,
    /// `Some` when the target was moved off `current`; `Some(None)` when
    /// it was cleared.
    target: Option<Option<String>>,
    bound: bool,
    expand: bool,
}

fn optional(col: &str) -> Option<String> {
    match col.trim() {
        "" => None,
        s => Some(s.to_string()),
    }
}

fn parse_timer(line: usize, text: &str) -> Result<TimerRecord, StartupError> {
    let cols = codec::split_columns(text);
    if !(5..=6).contains(&cols.len()) {
        return Err(StartupError::malformed(
            line,
            format!("expected 5 or 6 timer columns, found {}", cols.len()),
        ));
    }
    let id = cols[0].trim();
    if id.is_empty() {
        return Err(StartupError::malformed(line, "timer without an event id"));
    }
    let args = match codec::parse_value(cols[3]).map_err(|e| StartupError::malformed(line, e))? {
        RawValue::List(items) => items,
        RawValue::Table(entries) if entries.is_empty() => Vec::new(),
        _ => return Err(StartupError::malformed(line, "timer arguments must be a list")),
    };
    let mut record = TimerRecord {
        id: id.to_string(),
        actor: optional(cols[1]),
        current: optional(cols[2]),
        args,
        fire_at: parse_secs(line, cols[4])?,
        target: None,
        bound: true,
        expand: false,
    };
    if let Some(col) = cols.get(5) {
        let entries = match codec::parse_value(col).map_err(|e| StartupError::malformed(line, e))? {
            RawValue::Table(entries) => entries,
            RawValue::List(items) if items.is_empty() => Vec::new(),
            _ => return Err(StartupError::malformed(line, "timer routing must be a table")),
        };
        for (key, value) in entries {
            match (key.as_str(), value) {
                ("target", RawValue::Atom(id)) => record.target = Some(Some(id)),
                ("target", RawValue::Null) => record.target = Some(None),
                ("bound", RawValue::Bool(b)) => record.bound = b,
                ("expand", RawValue::Bool(b)) => record.expand = b,
                (key, _) => {
                    let reason = format!("bad timer routing entry '{key}'");
                    return Err(StartupError::malformed(line, reason));
                }
            }
        }
    }
    Ok(record)
}

/// Load state text into `realm`. Timers are returned, not scheduled; the
/// caller owns the schedule and the clock.
pub fn import_state(realm: &mut Realm, text: &str) -> Result<LoadedState, StartupError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
    let (n, header) = lines
        .by_ref()
        .find(|(_, l)| !l.trim().is_empty())
        .ok_or_else(|| StartupError::malformed(1, "empty state"))?;
    let saved_at = parse_header(n, header)?;
    let atom_lines = read_section(&mut lines)?;
    let timer_lines = read_section(&mut lines)?;
    if let Some((n, _)) = lines.find(|(_, l)| !l.trim().is_empty()) {
        return Err(StartupError::malformed(n, "trailing data after timer section"));
    }

    let records = timer_lines
        .iter()
        .map(|&(n, l)| parse_timer(n, l))
        .collect::<Result<Vec<_>, _>>()?;

    // Timer references may point at atoms the batch is about to create.
    let batch: HashSet<String> = atom_lines
        .iter()
        .filter_map(|(_, l)| codec::split_columns(l).get(1).map(|id| id.trim().to_ascii_lowercase()))
        .collect();
    for rec in &records {
        let mut refs: Vec<&str> = rec
            .actor
            .iter()
            .chain(&rec.current)
            .chain(rec.target.iter().flatten())
            .map(String::as_str)
            .collect();
        let mut handlers = Vec::new();
        for arg in &rec.args {
            arg.atom_refs(&mut refs);
            arg.handler_refs(&mut handlers);
        }
        for id in refs {
            if !batch.contains(&id.to_ascii_lowercase()) && realm.store().lookup(id).is_none() {
                return Err(StartupError::MissingBootstrap { id: id.to_string() });
            }
        }
        for name in handlers {
            realm.handlers().value(name)?;
        }
    }

    let atoms = realm.import_atoms(&atom_lines)?;

    let mut timers = Vec::with_capacity(records.len());
    for rec in records {
        let mut event = Event::new(rec.id);
        if let Some(actor) = &rec.actor {
            event = event.by(realm.store().find(actor)?);
        }
        if let Some(current) = &rec.current {
            event = event.on(realm.store().find(current)?);
        }
        match &rec.target {
            Some(Some(target)) => event = event.targeting(realm.store().find(target)?),
            Some(None) => event.target = None,
            None => {}
        }
        event.bound = rec.bound;
        event.expand = rec.expand;
        let args = rec
            .args
            .iter()
            .map(|a| realm.resolve_raw(a))
            .collect::<Result<Vec<_>, _>>()?;
        timers.push(event.with_args(args).at(rec.fire_at));
    }
    info!(atoms = atoms.len(), timers = timers.len(), saved_at = %saved_at, "state loaded");
    Ok(LoadedState {
        atoms,
        timers,
        saved_at,
    })
}

#[cfg(test)]
mod tests {
    use tarn_world::RealmConfig;

    use super::*;

    fn world() -> (Realm, AtomId) {
        let mut realm = Realm::new(RealmConfig::default());
        let core = realm.store().core();
        let bell = realm.create(Some("bell"), &[core.thing]).unwrap();
        (realm, bell)
    }

    #[test]
    fn header_and_sections_frame_the_state() {
        let (realm, bell) = world();
        let mut schedule = Schedule::new();
        schedule.push(Event::new("ring").by(bell).on(bell).with_arg(3), WorldTime::from_millis(4_250));
        let text = export_state(&realm, &schedule, WorldTime::from_millis(1_500));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#tarn-state@@1@@1.500");
        assert_eq!(lines[1], "Thing@@bell@@[ thing ]@@[=]@@limbo");
        assert_eq!(lines[2], "@@");
        assert_eq!(lines[3], "ring@@bell@@bell@@[ 3 ]@@4.250");
        assert_eq!(lines[4], "@@");
    }

    #[test]
    fn timers_come_back_with_their_fire_time() {
        let (realm, bell) = world();
        let mut schedule = Schedule::new();
        schedule.push(Event::new("ring").by(bell).on(bell).with_arg(bell), WorldTime::from_millis(9_000));
        schedule.push(Event::new("tick"), WorldTime::from_millis(2_000));
        let text = export_state(&realm, &schedule, WorldTime::from_millis(1_000));

        let mut fresh = Realm::new(RealmConfig::default());
        let loaded = import_state(&mut fresh, &text).unwrap();
        assert_eq!(loaded.saved_at, WorldTime::from_millis(1_000));
        assert_eq!(loaded.atoms.len(), 1);
        let bell = fresh.store().find("bell").unwrap();
        let ids: Vec<_> = loaded.timers.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["tick", "ring"]);
        let ring = &loaded.timers[1];
        assert_eq!(ring.actor, Some(bell));
        assert_eq!(ring.target, Some(bell));
        assert_eq!(ring.args, [Value::Atom(bell)]);
        assert_eq!(ring.fire_at, WorldTime::from_millis(9_000));
        assert_eq!(loaded.timers[0].actor, None);
    }

    #[test]
    fn timers_keep_their_routing() {
        let (mut realm, bell) = world();
        let core = realm.store().core();
        let tower = realm.create(Some("tower"), &[core.container]).unwrap();
        let mut schedule = Schedule::new();
        let retargeted = Event::new("ring").by(bell).on(bell).targeting(tower).unbound().expanding();
        schedule.push(retargeted, WorldTime::from_millis(3_000));
        schedule.push(Event::new("tick").on(bell), WorldTime::from_millis(4_000));
        let text = export_state(&realm, &schedule, WorldTime::ZERO);
        let lines: Vec<&str> = text.lines().collect();
        let timers = &lines[lines.len() - 3..lines.len() - 1];
        assert_eq!(timers[0], "ring@@bell@@bell@@[ ]@@3.000@@[ target=$tower bound=false expand=true ]");
        assert_eq!(timers[1], "tick@@@@bell@@[ ]@@4.000");

        let mut fresh = Realm::new(RealmConfig::default());
        let loaded = import_state(&mut fresh, &text).unwrap();
        let (bell, tower) = (fresh.store().find("bell").unwrap(), fresh.store().find("tower").unwrap());
        let ring = &loaded.timers[0];
        assert_eq!((ring.current, ring.target), (Some(bell), Some(tower)));
        assert!(!ring.bound);
        assert!(ring.expand);
        let tick = &loaded.timers[1];
        assert_eq!(tick.target, Some(bell));
        assert!(tick.bound && !tick.expand);
    }

    #[test]
    fn bad_timer_routing_is_rejected() {
        let mut realm = Realm::new(RealmConfig::default());
        let text = "#tarn-state@@1@@0.000\n@@\nring@@@@@@[ ]@@1.000@@[ loud=true ]\n@@\n";
        assert!(matches!(
            import_state(&mut realm, text),
            Err(StartupError::Malformed { line: 3, .. })
        ));
    }

    #[test]
    fn unknown_versions_are_refused() {
        let mut realm = Realm::new(RealmConfig::default());
        assert_eq!(
            import_state(&mut realm, "#tarn-state@@7@@0.000\n@@\n@@\n").unwrap_err(),
            StartupError::UnsupportedVersion { found: 7 }
        );
        assert!(matches!(
            import_state(&mut realm, "tarn@@1@@0\n@@\n@@\n"),
            Err(StartupError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn timer_references_are_checked_before_atoms_load() {
        let mut realm = Realm::new(RealmConfig::default());
        let before = realm.store().len();
        let text = "#tarn-state@@1@@0.000\n\
                    Thing@@bell@@[ thing ]@@[=]@@limbo\n\
                    @@\n\
                    ring@@ghost@@bell@@[ ]@@1.000\n\
                    @@\n";
        assert_eq!(
            import_state(&mut realm, text).unwrap_err(),
            StartupError::MissingBootstrap { id: "ghost".into() }
        );
        assert_eq!(realm.store().len(), before);
    }
}
