//! Exit directions as a 16-bit flag word.
//!
//! The twelve meaningful directions occupy bits 0-5 of the low byte and
//! bits 8-13 of the high byte, laid out so that every direction's opposite
//! sits at the same position in the other byte. Reversing a set of
//! directions is therefore a byte swap.

use std::fmt;

/// A set of exit directions.
///
/// A single direction is a set with exactly one bit. Sets with several
/// bits describe an exit slot shared by more than one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Direction(u16);

impl Direction {
    /// The empty set.
    pub const NONE: Direction = Direction(0);
    /// North.
    pub const NORTH: Direction = Direction(1 << 0);
    /// Northeast.
    pub const NORTHEAST: Direction = Direction(1 << 1);
    /// East.
    pub const EAST: Direction = Direction(1 << 2);
    /// Southeast.
    pub const SOUTHEAST: Direction = Direction(1 << 3);
    /// Up.
    pub const UP: Direction = Direction(1 << 4);
    /// In.
    pub const IN: Direction = Direction(1 << 5);
    /// South.
    pub const SOUTH: Direction = Direction(1 << 8);
    /// Southwest.
    pub const SOUTHWEST: Direction = Direction(1 << 9);
    /// West.
    pub const WEST: Direction = Direction(1 << 10);
    /// Northwest.
    pub const NORTHWEST: Direction = Direction(1 << 11);
    /// Down.
    pub const DOWN: Direction = Direction(1 << 12);
    /// Out.
    pub const OUT: Direction = Direction(1 << 13);
    /// Every meaningful direction.
    pub const ALL: Direction = Direction(0x3F3F);

    /// Number of distinct single directions (and exit table slots).
    pub const COUNT: usize = 12;

    const NAMES: [(Direction, &'static str); Self::COUNT] = [
        (Self::NORTH, "north"),
        (Self::NORTHEAST, "northeast"),
        (Self::EAST, "east"),
        (Self::SOUTHEAST, "southeast"),
        (Self::UP, "up"),
        (Self::IN, "in"),
        (Self::SOUTH, "south"),
        (Self::SOUTHWEST, "southwest"),
        (Self::WEST, "west"),
        (Self::NORTHWEST, "northwest"),
        (Self::DOWN, "down"),
        (Self::OUT, "out"),
    ];

    /// Build a set from raw bits, rejecting bits outside [`Direction::ALL`].
    pub fn from_bits(bits: u16) -> Option<Self> {
        if bits & !Self::ALL.0 != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    /// The raw flag word.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// The opposite direction(s): the high and low bytes swapped.
    pub fn opposite(self) -> Self {
        Self(self.0.swap_bytes())
    }

    /// Whether no direction is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether exactly one direction is set.
    pub fn is_single(self) -> bool {
        self.0.count_ones() == 1
    }

    /// Whether every direction in `other` is also in `self`.
    pub fn contains(self, other: Direction) -> bool {
        !other.is_empty() && self.0 & other.0 == other.0
    }

    /// Set union.
    pub fn union(self, other: Direction) -> Self {
        Self(self.0 | other.0)
    }

    /// Set difference (`self` without `other`).
    pub fn without(self, other: Direction) -> Self {
        Self(self.0 & !other.0)
    }

    /// Slot ordinal in `0..COUNT` for a single direction.
    ///
    /// Low-byte directions map to `0..6`, high-byte ones to `6..12`.
    pub fn slot(self) -> Option<usize> {
        if !self.is_single() {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        if bit < 8 {
            Some(bit)
        } else {
            Some(bit - 8 + 6)
        }
    }

    /// The single direction stored in slot `slot`.
    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::NAMES.get(slot).map(|(d, _)| *d)
    }

    /// Iterate over the single directions in this set, in slot order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Self::NAMES
            .iter()
            .map(|(d, _)| *d)
            .filter(move |d| self.0 & d.0 != 0)
    }

    /// Lower-case name of a single direction.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES.iter().find(|(d, _)| *d == self).map(|(_, n)| *n)
    }

    /// Parse a direction name or common abbreviation (`n`, `sw`, `u`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let full = match lower.as_str() {
            "n" => "north",
            "ne" => "northeast",
            "e" => "east",
            "se" => "southeast",
            "u" => "up",
            "s" => "south",
            "sw" => "southwest",
            "w" => "west",
            "nw" => "northwest",
            "d" => "down",
            other => other,
        };
        Self::NAMES.iter().find(|(_, n)| *n == full).map(|(d, _)| *d)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for d in self.iter() {
            if !first {
                write!(f, "|")?;
            }
            first = false;
            write!(f, "{}", d.name().unwrap_or("?"))?;
        }
        Ok(())
    }
}
