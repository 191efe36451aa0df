//! EDM primitive kinds and the implicit promotion lattice.

use serde::{Deserialize, Serialize};

/// Supported EDM primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Binary,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    Date,
    /// Legacy date-time without offset; only produced by V3 literals.
    DateTime,
    DateTimeOffset,
    TimeOfDay,
    Duration,
    Stream,
}

impl PrimitiveKind {
    /// All kinds, in declaration order.
    pub const ALL: [PrimitiveKind; 18] = [
        PrimitiveKind::Binary,
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::SByte,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Single,
        PrimitiveKind::Double,
        PrimitiveKind::Decimal,
        PrimitiveKind::String,
        PrimitiveKind::Guid,
        PrimitiveKind::Date,
        PrimitiveKind::DateTime,
        PrimitiveKind::DateTimeOffset,
        PrimitiveKind::TimeOfDay,
        PrimitiveKind::Duration,
        PrimitiveKind::Stream,
    ];

    /// Returns the qualified EDM name, e.g. `Edm.Int32`.
    #[must_use]
    pub fn edm_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Binary => "Edm.Binary",
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::Byte => "Edm.Byte",
            PrimitiveKind::SByte => "Edm.SByte",
            PrimitiveKind::Int16 => "Edm.Int16",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Int64 => "Edm.Int64",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Decimal => "Edm.Decimal",
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::Guid => "Edm.Guid",
            PrimitiveKind::Date => "Edm.Date",
            PrimitiveKind::DateTime => "Edm.DateTime",
            PrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveKind::TimeOfDay => "Edm.TimeOfDay",
            PrimitiveKind::Duration => "Edm.Duration",
            PrimitiveKind::Stream => "Edm.Stream",
        }
    }

    /// Parses a qualified EDM name such as `Edm.String`.
    #[must_use]
    pub fn from_edm_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.edm_name() == name)
    }

    /// Returns whether this type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
                | PrimitiveKind::Single
                | PrimitiveKind::Double
                | PrimitiveKind::Decimal
        )
    }

    /// Returns whether this type is an integral numeric type.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
        )
    }

    /// Returns whether values of this type can be ordered with `lt`/`gt`.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        !matches!(self, PrimitiveKind::Stream)
    }

    /// Returns whether this type takes part in date/time arithmetic.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Date
                | PrimitiveKind::DateTime
                | PrimitiveKind::DateTimeOffset
                | PrimitiveKind::TimeOfDay
                | PrimitiveKind::Duration
        )
    }

    /// Returns whether a value of `self` implicitly widens to `target`.
    ///
    /// The lattice is reflexive. Numeric types widen towards `Double` and
    /// `Decimal`; `Decimal` widens to nothing, and `Single` only to `Double`.
    #[must_use]
    pub fn can_promote_to(self, target: PrimitiveKind) -> bool {
        use PrimitiveKind as P;
        if self == target {
            return true;
        }
        match self {
            P::Byte | P::SByte => matches!(
                target,
                P::Int16 | P::Int32 | P::Int64 | P::Single | P::Double | P::Decimal
            ),
            P::Int16 => matches!(target, P::Int32 | P::Int64 | P::Single | P::Double | P::Decimal),
            P::Int32 => matches!(target, P::Int64 | P::Single | P::Double | P::Decimal),
            P::Int64 => matches!(target, P::Single | P::Double | P::Decimal),
            P::Single => target == P::Double,
            _ => false,
        }
    }

    /// Returns the narrowest type both operands widen to, if any.
    #[must_use]
    pub fn common_type(self, other: PrimitiveKind) -> Option<PrimitiveKind> {
        if other.can_promote_to(self) {
            Some(self)
        } else if self.can_promote_to(other) {
            Some(other)
        } else {
            None
        }
    }

    /// Number of lattice steps from `self` to `target`, for ranking overloads.
    #[must_use]
    pub fn promotion_distance(self, target: PrimitiveKind) -> Option<usize> {
        if self == target {
            return Some(0);
        }
        if !self.can_promote_to(target) {
            return None;
        }
        let rank = |kind: PrimitiveKind| -> usize {
            match kind {
                PrimitiveKind::Byte | PrimitiveKind::SByte => 0,
                PrimitiveKind::Int16 => 1,
                PrimitiveKind::Int32 => 2,
                PrimitiveKind::Int64 => 3,
                PrimitiveKind::Single => 4,
                PrimitiveKind::Double => 5,
                _ => 6,
            }
        };
        Some(rank(target).saturating_sub(rank(self)).max(1))
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.edm_name())
    }
}
