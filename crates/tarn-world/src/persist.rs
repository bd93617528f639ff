//! Atom records of persisted state.
//!
//! One line per non-frozen atom:
//!
//! ```text
//! Class@@id@@[ parent ... ]@@[ key=value ... ]@@container[@@[ bits=$exit ... ]]
//! ```
//!
//! Frozen atoms are part of the application's fixed core and are expected
//! to exist already when state is loaded. Loading validates every record
//! and reference before creating anything, then builds the atoms in two
//! passes: bare nodes first, then edges, fields, placement and exits. A
//! failure in the second pass removes everything the load created.

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::info;

use tarn_core::{AtomId, Direction, StartupError, WorldError};

use crate::atom::AtomKind;
use crate::codec::{self, RawValue, SEPARATOR};
use crate::property::is_system_field;
use crate::realm::{Realm, START_EVENT};
use crate::store::{validate_id, Store};
use crate::value::{Table, Value};

/// Collect the lines of one section, up to and excluding its `@@`
/// terminator. Blank lines are skipped.
pub fn read_section<'a, I>(lines: &mut I) -> Result<Vec<(usize, &'a str)>, StartupError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut out = Vec::new();
    let mut last = 0;
    for (n, line) in lines.by_ref() {
        last = n;
        let line = line.trim_end_matches('\r');
        if line == SEPARATOR {
            return Ok(out);
        }
        if !line.trim().is_empty() {
            out.push((n, line));
        }
    }
    Err(StartupError::malformed(
        last + 1,
        "section not terminated by '@@'",
    ))
}

/// A decoded atom record.
#[derive(Clone, Debug, PartialEq)]
struct AtomRecord {
    line: usize,
    kind: AtomKind,
    id: String,
    parents: Vec<String>,
    fields: Vec<(String, RawValue)>,
    container: Option<String>,
    exits: Vec<(Direction, String)>,
}

fn parse_id_list(line: usize, text: &str) -> Result<Vec<String>, StartupError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| StartupError::malformed(line, "parent list must be bracketed"))?;
    Ok(inner.split_whitespace().map(str::to_string).collect())
}

fn parse_record(line: usize, text: &str) -> Result<AtomRecord, StartupError> {
    let cols = codec::split_columns(text);
    if !(5..=6).contains(&cols.len()) {
        return Err(StartupError::malformed(
            line,
            format!("expected 5 or 6 columns, found {}", cols.len()),
        ));
    }
    let kind = AtomKind::from_class_name(cols[0].trim())
        .ok_or_else(|| StartupError::malformed(line, format!("unknown class '{}'", cols[0])))?;
    let id = cols[1].trim().to_string();
    let parents = parse_id_list(line, cols[2])?;
    let fields = match codec::parse_value(cols[3]).map_err(|e| StartupError::malformed(line, e))? {
        RawValue::Table(entries) => entries,
        RawValue::List(items) if items.is_empty() => Vec::new(),
        _ => return Err(StartupError::malformed(line, "fields column must be a table")),
    };
    let container = match cols[4].trim() {
        "" => None,
        c => Some(c.to_string()),
    };
    let mut exits = Vec::new();
    if let Some(col) = cols.get(5) {
        let entries = match codec::parse_value(col).map_err(|e| StartupError::malformed(line, e))? {
            RawValue::Table(entries) => entries,
            RawValue::List(items) if items.is_empty() => Vec::new(),
            _ => return Err(StartupError::malformed(line, "exits column must be a table")),
        };
        for (bits, exit) in entries {
            let dirs = bits
                .parse::<u16>()
                .ok()
                .and_then(Direction::from_bits)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| StartupError::malformed(line, format!("bad direction set '{bits}'")))?;
            let RawValue::Atom(exit) = exit else {
                return Err(StartupError::malformed(line, "exit must be an atom reference"));
            };
            exits.push((dirs, exit));
        }
    }
    if !kind.is_spatial() && container.is_some() {
        return Err(StartupError::malformed(line, "plain atom with a container"));
    }
    if !kind.holds_contents() && !exits.is_empty() {
        return Err(StartupError::malformed(line, "exits on a non-container"));
    }
    Ok(AtomRecord {
        line,
        kind,
        id,
        parents,
        fields,
        container,
        exits,
    })
}

impl Store {
    /// Atoms that persisted state holds: non-frozen descendants of the
    /// root. Plain atoms come first, breadth-first; spatial atoms follow
    /// in a depth-first walk of the containment tree from Limbo, so
    /// loading them in order rebuilds every container's contents in the
    /// same sequence.
    pub fn export_order(&self) -> Vec<AtomId> {
        let (mut order, spatial): (Vec<_>, Vec<_>) = self
            .descendants(self.root())
            .into_iter()
            .filter(|id| self.atom(*id).is_ok_and(|a| !a.is_frozen()))
            .partition(|id| self.atom(*id).is_ok_and(|a| !a.kind().is_spatial()));

        let mut pending: HashSet<AtomId> = spatial.iter().copied().collect();
        let limbo = self.limbo();
        let mut stack = vec![self.contents(limbo).iter()];
        while let Some(level) = stack.last_mut() {
            let Some(&id) = level.next() else {
                stack.pop();
                continue;
            };
            if id == limbo {
                continue;
            }
            if pending.remove(&id) {
                order.push(id);
            }
            stack.push(self.contents(id).iter());
        }
        // Anything not reachable from Limbo keeps its inheritance order.
        order.extend(spatial.into_iter().filter(|id| pending.contains(id)));
        order
    }

    /// Append one record per exported atom, returning how many were
    /// written.
    pub fn write_atoms(&self, out: &mut String) -> usize {
        let order = self.export_order();
        for &id in &order {
            self.write_record(out, id);
        }
        order.len()
    }

    fn write_record(&self, out: &mut String, id: AtomId) {
        let Ok(atom) = self.atom(id) else { return };
        out.push_str(atom.kind().class_name());
        out.push_str(SEPARATOR);
        out.push_str(atom.id());
        out.push_str(SEPARATOR);
        out.push('[');
        for &p in atom.parents() {
            out.push(' ');
            out.push_str(&self.describe(p));
        }
        out.push_str(" ]");
        out.push_str(SEPARATOR);
        let fields: Table = atom
            .fields()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        codec::write_value(out, &Value::Table(fields), self);
        out.push_str(SEPARATOR);
        if let Some(c) = atom.container() {
            out.push_str(&self.describe(c));
        }
        if let Some(exits) = atom.exits().filter(|t| !t.is_empty()) {
            out.push_str(SEPARATOR);
            out.push('[');
            for slot in exits.entries() {
                if let Ok(exit) = self.atom(slot.exit) {
                    let _ = write!(out, " {}=${}", slot.shared.bits(), exit.id());
                }
            }
            out.push_str(" ]");
        }
        out.push('\n');
    }
}

impl Realm {
    /// Turn a decoded value into a live one, resolving atom and handler
    /// names.
    pub fn resolve_raw(&self, raw: &RawValue) -> Result<Value, StartupError> {
        Ok(match raw {
            RawValue::Null => Value::Null,
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Int(n) => Value::Int(*n),
            RawValue::Str(s) => Value::Str(s.clone()),
            RawValue::Atom(id) => Value::Atom(
                self.store()
                    .lookup(id)
                    .ok_or_else(|| StartupError::MissingBootstrap { id: id.clone() })?,
            ),
            RawValue::Handler(name) => self.handlers().value(name)?,
            RawValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_raw(v))
                    .collect::<Result<_, _>>()?,
            ),
            RawValue::Table(entries) => Value::Table(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_raw(v)?)))
                    .collect::<Result<_, StartupError>>()?,
            ),
        })
    }

    /// Append the atom section (records and terminator) to `out`.
    pub fn export_atoms(&self, out: &mut String) -> usize {
        let n = self.store().write_atoms(out);
        out.push_str(SEPARATOR);
        out.push('\n');
        n
    }

    /// Load atom records (without the section terminator).
    ///
    /// Returns the atoms created, in record order. Loaded Things receive
    /// a `start` notification once everything is in place.
    pub fn import_atoms(&mut self, lines: &[(usize, &str)]) -> Result<Vec<AtomId>, StartupError> {
        let records = lines
            .iter()
            .map(|&(n, text)| parse_record(n, text))
            .collect::<Result<Vec<_>, _>>()?;
        self.validate_records(&records)?;

        let mut created = Vec::with_capacity(records.len());
        for rec in &records {
            match self.store_mut().insert_bare(&rec.id, rec.kind) {
                Ok(id) => created.push(id),
                Err(e) => {
                    self.rollback(&created);
                    return Err(e.into());
                }
            }
        }
        if let Err(e) = self.wire_records(&records, &created) {
            self.rollback(&created);
            return Err(e);
        }

        for (&id, rec) in created.iter().zip(&records) {
            if rec.kind.is_spatial() && self.store().is_live(id) {
                self.notify(id, START_EVENT);
            }
        }
        info!(atoms = created.len(), "atoms loaded");
        Ok(created)
    }

    fn validate_records(&self, records: &[AtomRecord]) -> Result<(), StartupError> {
        let store = self.store();
        let mut batch = HashSet::new();
        for rec in records {
            validate_id(&rec.id)?;
            let key = rec.id.to_ascii_lowercase();
            if store.lookup(&rec.id).is_some() || !batch.insert(key) {
                return Err(WorldError::DuplicateId { id: rec.id.clone() }.into());
            }
        }
        let known = |id: &str| batch.contains(&id.to_ascii_lowercase()) || store.lookup(id).is_some();

        for rec in records {
            let mut refs: Vec<&str> = rec.parents.iter().map(String::as_str).collect();
            refs.extend(rec.container.as_deref());
            refs.extend(rec.exits.iter().map(|(_, e)| e.as_str()));
            let mut handlers = Vec::new();
            for (name, value) in &rec.fields {
                if is_system_field(name) {
                    return Err(WorldError::SystemField { name: name.clone() }.into());
                }
                value.atom_refs(&mut refs);
                value.handler_refs(&mut handlers);
            }
            if let Some(missing) = refs.into_iter().find(|id| !known(id)) {
                return Err(StartupError::MissingBootstrap {
                    id: missing.to_string(),
                });
            }
            if let Some(name) = handlers.into_iter().find(|h| self.handlers().get(h).is_none()) {
                return Err(WorldError::UnknownHandler {
                    name: name.to_string(),
                }
                .into());
            }
            if rec.parents.is_empty() {
                return Err(StartupError::malformed(rec.line, "atom without parents"));
            }
        }
        Ok(())
    }

    fn wire_records(&mut self, records: &[AtomRecord], created: &[AtomId]) -> Result<(), StartupError> {
        for (&id, rec) in created.iter().zip(records) {
            let parents = rec
                .parents
                .iter()
                .map(|p| self.store().find(p))
                .collect::<Result<Vec<_>, _>>()?;
            self.store_mut().attach_parents(id, &parents)?;
        }
        for (&id, rec) in created.iter().zip(records) {
            for (name, raw) in &rec.fields {
                let value = self.resolve_raw(raw)?;
                self.store_mut().set_field(id, name, value)?;
            }
        }
        let limbo = self.store().limbo();
        for (&id, rec) in created.iter().zip(records) {
            if !rec.kind.is_spatial() {
                continue;
            }
            let container = match &rec.container {
                Some(c) => self.store().find(c)?,
                None => limbo,
            };
            self.store_mut().move_to(id, container)?;
        }
        for (&id, rec) in created.iter().zip(records) {
            for (dirs, exit) in &rec.exits {
                let exit = self.store().find(exit)?;
                self.store_mut().set_exit(id, *dirs, exit)?;
            }
        }
        Ok(())
    }

    fn rollback(&mut self, created: &[AtomId]) {
        for &id in created.iter().rev() {
            self.store_mut().purge(id);
        }
    }
}
