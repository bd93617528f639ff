//! The closed set of types storable in an atom field.

use indexmap::IndexMap;

use tarn_core::AtomId;

use crate::handler::HandlerRef;

/// An ordered string-keyed table of values.
pub type Table = IndexMap<String, Value>;

/// A field value.
///
/// `Null` is the reserved null sentinel: a field holding it is *defined*
/// (it shadows inherited definitions) but cooks to "absent".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Defined-but-null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A string.
    Str(String),
    /// A reference to another atom. May go stale if the atom is deleted.
    Atom(AtomId),
    /// An ordered list.
    List(Vec<Value>),
    /// A string-keyed table.
    Table(Table),
    /// An executable handler.
    Handler(HandlerRef),
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Atom(_) => "atom",
            Self::List(_) => "list",
            Self::Table(_) => "table",
            Self::Handler(_) => "handler",
        }
    }

    /// Whether this value counts as "handled" when returned from a handler.
    ///
    /// `Null`, `false` and `0` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            _ => true,
        }
    }

    /// The referenced atom, if this is an atom reference.
    pub fn as_atom(&self) -> Option<AtomId> {
        match self {
            Self::Atom(id) => Some(*id),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The table, if this is a table.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// The handler, if this is an executable handler.
    pub fn as_handler(&self) -> Option<&HandlerRef> {
        match self {
            Self::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Whether this is the null sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<AtomId> for Value {
    fn from(v: AtomId) -> Self {
        Self::Atom(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Self::Table(v)
    }
}

impl From<HandlerRef> for Value {
    fn from(v: HandlerRef) -> Self {
        Self::Handler(v)
    }
}
