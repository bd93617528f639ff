//! Text encoding of field values for persisted state.
//!
//! ```text
//! 42  -7  true  false  null       literals
//! north.gate  ~42  ~true          bare strings (~ forces a string)
//! "two words\n"                   quoted strings
//! $sword  !greet                  atom and handler references
//! [ 1 two $three ]                lists
//! [ hp=10 name="Old Tom" ]  [=]   tables, and the empty table
//! ```
//!
//! Quoted strings escape `\`, `"`, newlines, tabs and `@`, so the column
//! separator `@@` never appears inside an encoded value.

use std::fmt::Write as _;

use crate::store::Store;
use crate::value::Value;

/// Column separator of persisted records.
pub const SEPARATOR: &str = "@@";

/// A decoded value whose references are still names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    /// `null`.
    Null,
    /// `true` / `false`.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Str(String),
    /// `$id`.
    Atom(String),
    /// `!name`.
    Handler(String),
    /// `[ ... ]`.
    List(Vec<RawValue>),
    /// `[ k=v ... ]` or `[=]`.
    Table(Vec<(String, RawValue)>),
}

impl RawValue {
    /// Visit every atom name referenced at any depth.
    pub fn atom_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Atom(id) => out.push(id),
            Self::List(items) => items.iter().for_each(|v| v.atom_refs(out)),
            Self::Table(entries) => entries.iter().for_each(|(_, v)| v.atom_refs(out)),
            _ => {}
        }
    }

    /// Visit every handler name referenced at any depth.
    pub fn handler_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Handler(name) => out.push(name),
            Self::List(items) => items.iter().for_each(|v| v.handler_refs(out)),
            Self::Table(entries) => entries.iter().for_each(|(_, v)| v.handler_refs(out)),
            _ => {}
        }
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '/' | '-')
}

fn reads_as_literal(s: &str) -> bool {
    matches!(s, "true" | "false" | "null") || s.parse::<i64>().is_ok()
}

/// Append the encoding of a string.
pub fn write_str(out: &mut String, s: &str) {
    if !s.is_empty() && s.chars().all(is_bare_char) {
        if reads_as_literal(s) {
            out.push('~');
        }
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '@' => out.push_str("\\@"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Append the encoding of a value. Atom references are written by
/// identifier; references to deleted atoms are written as `null`.
pub fn write_value(out: &mut String, value: &Value, store: &Store) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Str(s) => write_str(out, s),
        Value::Atom(id) => match store.atom(*id) {
            Ok(atom) => {
                out.push('$');
                out.push_str(atom.id());
            }
            Err(_) => out.push_str("null"),
        },
        Value::Handler(h) => {
            out.push('!');
            out.push_str(h.name());
        }
        Value::List(items) => {
            out.push('[');
            for item in items {
                out.push(' ');
                write_value(out, item, store);
            }
            out.push_str(" ]");
        }
        Value::Table(table) if table.is_empty() => out.push_str("[=]"),
        Value::Table(table) => {
            out.push('[');
            for (k, v) in table {
                out.push(' ');
                write_str(out, k);
                out.push('=');
                write_value(out, v, store);
            }
            out.push_str(" ]");
        }
    }
}

/// Cursor over one encoded column.
pub struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Start at the beginning of `src`.
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn bare(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c| !is_bare_char(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn quoted(&mut self) -> Result<String, String> {
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, e @ ('\\' | '"' | '@'))) => out.push(e),
                    Some((_, e)) => return Err(format!("unknown escape '\\{e}'")),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err("unterminated string".into())
    }

    /// Parse a string in key position (bare or quoted). Only the quoted
    /// form can spell the empty key.
    fn key(&mut self) -> Result<Option<String>, String> {
        let save = self.pos;
        let quoted = self.eat('"');
        let key = if quoted {
            self.quoted()?
        } else {
            self.eat('~');
            self.bare().to_string()
        };
        if (quoted || !key.is_empty()) && self.eat('=') {
            Ok(Some(key))
        } else {
            self.pos = save;
            Ok(None)
        }
    }

    fn bracketed(&mut self) -> Result<RawValue, String> {
        self.skip_ws();
        if self.eat('=') {
            self.skip_ws();
            return if self.eat(']') {
                Ok(RawValue::Table(Vec::new()))
            } else {
                Err("expected ']' after '[='".into())
            };
        }
        let mut items = Vec::new();
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(']') {
                break;
            }
            if self.peek().is_none() {
                return Err("unterminated '['".into());
            }
            match self.key()? {
                Some(k) => entries.push((k, self.value()?)),
                None => items.push(self.value()?),
            }
            if !items.is_empty() && !entries.is_empty() {
                return Err("list and table entries mixed".into());
            }
        }
        if entries.is_empty() {
            Ok(RawValue::List(items))
        } else {
            Ok(RawValue::Table(entries))
        }
    }

    /// Parse one value at the cursor.
    pub fn value(&mut self) -> Result<RawValue, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("expected a value".into()),
            Some('[') => {
                self.pos += 1;
                self.bracketed()
            }
            Some('"') => {
                self.pos += 1;
                self.quoted().map(RawValue::Str)
            }
            Some('~') => {
                self.pos += 1;
                Ok(RawValue::Str(self.bare().to_string()))
            }
            Some('$') => {
                self.pos += 1;
                match self.bare() {
                    "" => Err("empty atom reference".into()),
                    id => Ok(RawValue::Atom(id.to_string())),
                }
            }
            Some('!') => {
                self.pos += 1;
                match self.bare() {
                    "" => Err("empty handler reference".into()),
                    name => Ok(RawValue::Handler(name.to_string())),
                }
            }
            Some(c) if is_bare_char(c) => {
                let word = self.bare();
                Ok(match word {
                    "true" => RawValue::Bool(true),
                    "false" => RawValue::Bool(false),
                    "null" => RawValue::Null,
                    _ => match word.parse::<i64>() {
                        Ok(n) => RawValue::Int(n),
                        Err(_) => RawValue::Str(word.to_string()),
                    },
                })
            }
            Some(c) => Err(format!("unexpected character '{c}'")),
        }
    }

    /// Require that only whitespace remains.
    pub fn finish(&mut self) -> Result<(), String> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(format!("trailing input at '{c}'")),
        }
    }
}

/// Parse a column holding exactly one value.
pub fn parse_value(text: &str) -> Result<RawValue, String> {
    let mut p = Parser::new(text);
    let v = p.value()?;
    p.finish()?;
    Ok(v)
}

/// Split a record into its columns.
pub fn split_columns(line: &str) -> Vec<&str> {
    line.split(SEPARATOR).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::value::Table;

    fn encode(v: &Value) -> String {
        let store = Store::new();
        let mut out = String::new();
        write_value(&mut out, v, &store);
        out
    }

    #[test]
    fn literal_looking_strings_are_marked() {
        assert_eq!(encode(&"42".into()), "~42");
        assert_eq!(encode(&"true".into()), "~true");
        assert_eq!(encode(&"north.gate".into()), "north.gate");
        assert_eq!(parse_value("~42"), Ok(RawValue::Str("42".into())));
        assert_eq!(parse_value("42"), Ok(RawValue::Int(42)));
    }

    #[test]
    fn separators_never_leak_into_values() {
        let s = encode(&"mail me @@ home".into());
        assert!(!s.contains("@@"));
        assert_eq!(parse_value(&s), Ok(RawValue::Str("mail me @@ home".into())));
    }

    #[test]
    fn nested_containers_parse() {
        let v = parse_value(r#"[ hp=10 tags=[ a "b c" ] owner=$bob on=!greet ]"#).unwrap();
        assert_eq!(
            v,
            RawValue::Table(vec![
                ("hp".into(), RawValue::Int(10)),
                (
                    "tags".into(),
                    RawValue::List(vec![RawValue::Str("a".into()), RawValue::Str("b c".into())])
                ),
                ("owner".into(), RawValue::Atom("bob".into())),
                ("on".into(), RawValue::Handler("greet".into())),
            ])
        );
        let mut refs = Vec::new();
        v.atom_refs(&mut refs);
        assert_eq!(refs, ["bob"]);
    }

    #[test]
    fn empty_collections_are_distinct() {
        assert_eq!(encode(&Value::Table(Table::new())), "[=]");
        assert_eq!(encode(&Value::List(vec![])), "[ ]");
        assert_eq!(parse_value("[=]"), Ok(RawValue::Table(vec![])));
        assert_eq!(parse_value("[ ]"), Ok(RawValue::List(vec![])));
    }

    #[test]
    fn empty_keys_are_quoted() {
        let table: Table = [(String::new(), Value::Int(1))].into_iter().collect();
        assert_eq!(encode(&Value::Table(table)), r#"[ ""=1 ]"#);
        assert_eq!(
            parse_value(r#"[ ""=1 "x"=[ ""="" ] ]"#),
            Ok(RawValue::Table(vec![
                (String::new(), RawValue::Int(1)),
                ("x".into(), RawValue::Table(vec![(String::new(), RawValue::Str(String::new()))])),
            ]))
        );
        assert_eq!(parse_value(r#"[ "" ]"#), Ok(RawValue::List(vec![RawValue::Str(String::new())])));
        assert!(parse_value("[ a=1 =2 ]").is_err());
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse_value("\"open").is_err());
        assert!(parse_value("[ 1 2").is_err());
        assert!(parse_value("[ a=1 2 ]").is_err());
        assert!(parse_value("1 2").is_err());
        assert!(parse_value("$").is_err());
        assert!(parse_value("\"bad \\q\"").is_err());
    }

    fn table_key() -> impl Strategy<Value = String> {
        prop_oneof!["[a-z_]{1,6}", Just(String::new()), ".{0,6}"]
    }

    fn plain_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            ".{0,12}".prop_map(Value::Str),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::vec((table_key(), inner), 0..4).prop_map(|entries| {
                    Value::Table(entries.into_iter().collect())
                }),
            ]
        })
    }

    fn to_raw(v: &Value) -> RawValue {
        match v {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Int(n) => RawValue::Int(*n),
            Value::Str(s) => RawValue::Str(s.clone()),
            Value::List(items) => RawValue::List(items.iter().map(to_raw).collect()),
            Value::Table(t) => RawValue::Table(t.iter().map(|(k, v)| (k.clone(), to_raw(v))).collect()),
            Value::Atom(_) | Value::Handler(_) => unreachable!("not generated"),
        }
    }

    proptest! {
        #[test]
        fn encoded_values_decode_to_themselves(v in plain_value()) {
            let text = encode(&v);
            prop_assert!(!text.contains("@@"));
            prop_assert!(!text.contains('\n'));
            prop_assert_eq!(parse_value(&text), Ok(to_raw(&v)));
        }
    }
}
