//! Engine option configuration

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Search depth used until the caller changes it
pub const DEFAULT_DEPTH: i64 = 20;

/// Number of principal variations requested by default
pub const DEFAULT_MULTIPV: u32 = 1;

/// Smallest accepted MultiPV
pub const MULTIPV_MIN: u32 = 1;

/// Largest accepted MultiPV
pub const MULTIPV_MAX: u32 = 256;

/// Options tracked by the driver
///
/// `depth` is a per-search parameter for higher layers (`go depth N`); it is
/// never sent on its own. `multipv` mirrors the engine's `MultiPV` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Search depth
    pub depth: i64,

    /// Number of principal variations, in `[MULTIPV_MIN, MULTIPV_MAX]`
    pub multipv: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            multipv: DEFAULT_MULTIPV,
        }
    }
}

impl EngineOptions {
    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        check_multipv(i64::from(self.multipv))?;
        Ok(())
    }
}

/// Value passed to [`Engine::set_option`](crate::Engine::set_option)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    /// Integer value
    Int(i64),
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Options the driver recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOption {
    /// `depth`: stored locally only
    Depth,
    /// `multipv`: stored locally and sent as `setoption name MultiPV`
    MultiPv,
}

impl EngineOption {
    /// Look an option up by name, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("depth") {
            Some(Self::Depth)
        } else if name.eq_ignore_ascii_case("multipv") {
            Some(Self::MultiPv)
        } else {
            None
        }
    }

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::MultiPv => "multipv",
        }
    }

    /// Name of the matching UCI option, if the option exists on the wire
    pub fn uci_name(self) -> Option<&'static str> {
        match self {
            Self::Depth => None,
            Self::MultiPv => Some("MultiPV"),
        }
    }
}

/// Range-check a MultiPV value
pub(crate) fn check_multipv(value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|n| (MULTIPV_MIN..=MULTIPV_MAX).contains(n))
        .ok_or(EngineError::OptionOutOfRange {
            name: EngineOption::MultiPv.name(),
            value,
            min: i64::from(MULTIPV_MIN),
            max: i64::from(MULTIPV_MAX),
        })
}
