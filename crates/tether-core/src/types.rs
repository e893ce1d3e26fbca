//! Core value types for the tether kernel.

use std::fmt;

/// Number of priority buckets carried by every strength vector.
pub const MAX_STRENGTH: usize = 9;

/// Priority bucket of a constraint or error variable.
///
/// Buckets are compared lexicographically by the goal row, so a single unit of
/// error at a higher bucket always outweighs any amount at a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strength {
    #[default]
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Highest = 4,
    Equality = 5,
    Barrier = 6,
    Centering = 7,
    Fixed = 8,
}

impl Strength {
    /// All buckets in ascending order.
    pub const ALL: [Strength; MAX_STRENGTH] = [
        Strength::None,
        Strength::Low,
        Strength::Medium,
        Strength::High,
        Strength::Highest,
        Strength::Equality,
        Strength::Barrier,
        Strength::Centering,
        Strength::Fixed,
    ];

    /// Index of this strength in a strength vector.
    pub fn bucket(self) -> usize {
        self as usize
    }

    /// Look up a strength by bucket index.
    pub fn from_bucket(bucket: usize) -> Option<Self> {
        Self::ALL.get(bucket).copied()
    }

    /// Whether constraints at this strength are hard (no error terms).
    pub fn is_fixed(self) -> bool {
        self == Strength::Fixed
    }

    /// Scalar weight used when an error term lands in a plain row objective.
    pub fn error_weight(self) -> f32 {
        match self {
            Strength::Low => 1.0,
            Strength::Medium => 1e3,
            Strength::High => 1e6,
            Strength::Highest => 1e9,
            Strength::Equality => 1e12,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strength::None => "NONE",
            Strength::Low => "LOW",
            Strength::Medium => "MEDIUM",
            Strength::High => "HIGH",
            Strength::Highest => "HIGHEST",
            Strength::Equality => "EQUALITY",
            Strength::Barrier => "BARRIER",
            Strength::Centering => "CENTERING",
            Strength::Fixed => "FIXED",
        };
        f.write_str(name)
    }
}

/// Kind of unknown held by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableType {
    /// May take any sign (edge positions)
    Unrestricted,
    /// Constant term
    Constant,
    /// Non-negative helper for inequalities
    Slack,
    /// Non-negative error term of a soft constraint
    Error,
    /// Pooled or reset state
    #[default]
    Unknown,
}

impl VariableType {
    /// Slack and error variables are sign-restricted (>= 0).
    pub fn is_restricted(self) -> bool {
        !matches!(self, VariableType::Unrestricted)
    }

    /// Short prefix used when rendering unnamed variables.
    pub fn prefix(self) -> &'static str {
        match self {
            VariableType::Unrestricted => "U",
            VariableType::Constant => "C",
            VariableType::Slack => "S",
            VariableType::Error => "e",
            VariableType::Unknown => "V",
        }
    }
}

/// Opaque key of an external anchor that owns an object variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnchorKey(pub u64);

impl From<u64> for AnchorKey {
    fn from(key: u64) -> Self {
        AnchorKey(key)
    }
}
