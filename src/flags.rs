// Message flag model: severity bits, attribute bits, shadow masks
//
// Bit layout of a message flag word:
//
//     xxxx xxxx xxxx xxxx
//     -+-- --+- ----+----
//      |     |      |
//  custom    |  default severity flags
//  flags  default attributes
//
// Custom flag bits: low pair carries severities, high pair attributes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Bit-flag set carried by every log message: severities, attributes and
/// user-defined custom bits packed into 16 bits.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MsgFlags(u16);

impl MsgFlags {
    // === Severity flags (log level) ===
    pub const EMERG: Self = Self(0x0001);
    pub const ALERT: Self = Self(0x0002);
    pub const CRITICAL: Self = Self(0x0004);
    pub const ERROR: Self = Self(0x0008);
    pub const WARNING: Self = Self(0x0010);
    pub const NOTICE: Self = Self(0x0020);
    pub const INFO: Self = Self(0x0040);
    pub const DEBUG: Self = Self(0x0080);

    /// User-defined severity bits.
    pub const CUSTOM_B1: Self = Self(0x1000);
    pub const CUSTOM_B2: Self = Self(0x2000);

    // === Attribute flags ===
    /// Append the full stack trace to the message content.
    pub const STACK_TRACE: Self = Self(0x0100);
    /// Append a compacted stack trace to the message content.
    pub const STACK_TRACE_SHORT: Self = Self(0x0800);

    /// User-defined attribute bits.
    pub const CUSTOM_B3: Self = Self(0x4000);
    pub const CUSTOM_B4: Self = Self(0x8000);

    /// Bit-reset (reversed) mask for severity flags.
    pub const SEVERITY_SHADOW_MASK: Self = Self(0xCF00);
    /// Bit-reset (reversed) mask for attribute flags.
    pub const ATTRIBUTE_SHADOW_MASK: Self = Self(0x30FF);

    // === Predefined severity sets ===
    /// Default | Custom
    pub const SEVERITY_ALL: Self = Self(0x30FF);
    /// Emerg | Alert | Critical | Error | Warning
    pub const SEVERITY_MAJOR: Self = Self(0x001F);
    /// Notice | Info | Debug
    pub const SEVERITY_MINOR: Self = Self(0x00E0);
    /// Major | Minor
    pub const SEVERITY_DEFAULT: Self = Self(0x00FF);
    /// CustomB1 | CustomB2
    pub const SEVERITY_CUSTOM: Self = Self(0x3000);

    /// Empty flag set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit value.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Build from a raw bit value.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Severity portion of the flags (attributes reset).
    #[inline]
    pub const fn severity(self) -> Self {
        Self(self.0 & !Self::SEVERITY_SHADOW_MASK.0)
    }

    /// Attribute portion of the flags (severities reset).
    #[inline]
    pub const fn attributes(self) -> Self {
        Self(self.0 & !Self::ATTRIBUTE_SHADOW_MASK.0)
    }

    /// True if all bits of `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if `self` is exactly one recognized severity flag.
    pub fn is_single_severity(self) -> bool {
        DEFAULT_SEVERITY_ORDER.contains(&self)
    }

    /// Severity name for exactly-one-bit severity values.
    pub const fn severity_name(self) -> Option<&'static str> {
        match self {
            Self::EMERG => Some("EMERG"),
            Self::ALERT => Some("ALERT"),
            Self::CRITICAL => Some("CRIT"),
            Self::ERROR => Some("ERROR"),
            Self::WARNING => Some("WARNING"),
            Self::NOTICE => Some("NOTICE"),
            Self::INFO => Some("INFO"),
            Self::DEBUG => Some("DEBUG"),
            _ => None,
        }
    }
}

/// Severity used when a message carries none.
pub const DEFAULT_SEVERITY: MsgFlags = MsgFlags::INFO;

/// Natural severity precedence, most severe first, custom bits last.
/// Each recorder starts with a copy of this order.
pub const DEFAULT_SEVERITY_ORDER: [MsgFlags; 10] = [
    MsgFlags::EMERG,
    MsgFlags::ALERT,
    MsgFlags::CRITICAL,
    MsgFlags::ERROR,
    MsgFlags::WARNING,
    MsgFlags::NOTICE,
    MsgFlags::INFO,
    MsgFlags::DEBUG,
    MsgFlags::CUSTOM_B1,
    MsgFlags::CUSTOM_B2,
];

/// Fresh per-recorder severity order list.
pub fn default_severity_order() -> Vec<MsgFlags> {
    DEFAULT_SEVERITY_ORDER.to_vec()
}

/// Placement of a severity flag relative to another in an order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Before,
    After,
}

impl fmt::Display for MsgFlags {
    /// Renders the severity name for recognized single-severity values,
    /// hexadecimal otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:x}", self.0),
        }
    }
}

impl BitOr for MsgFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MsgFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MsgFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for MsgFlags {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for MsgFlags {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}
