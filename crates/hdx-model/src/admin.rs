//! Administrative hierarchy types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HdxError;

/// Hierarchy level a raw location token is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    /// Level 0: a country, identified by its ISO3 code.
    Country,
    /// Level 1: a first-level subdivision, identified by a PCode-style code.
    Subdivision,
}

impl AdminLevel {
    /// Numeric depth of the level (country is 0).
    pub fn depth(self) -> u8 {
        match self {
            Self::Country => 0,
            Self::Subdivision => 1,
        }
    }

    /// The level resolved by the admin column at `position` in a dataset schema.
    pub fn from_column_position(position: usize) -> Option<Self> {
        match position {
            0 => Some(Self::Country),
            1 => Some(Self::Subdivision),
            _ => None,
        }
    }
}

/// Output level a result set is published at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Global,
    Regional,
    National,
    Subnational,
}

impl OutputLevel {
    pub const ALL: [OutputLevel; 4] = [
        OutputLevel::Global,
        OutputLevel::Regional,
        OutputLevel::National,
        OutputLevel::Subnational,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Regional => "regional",
            Self::National => "national",
            Self::Subnational => "subnational",
        }
    }

    /// The output level produced by a dataset with `admin_columns` admin columns.
    pub fn for_admin_depth(admin_columns: usize) -> Self {
        match admin_columns {
            0 => Self::Global,
            1 => Self::National,
            _ => Self::Subnational,
        }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputLevel {
    type Err = HdxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "regional" => Ok(Self::Regional),
            "national" => Ok(Self::National),
            "subnational" => Ok(Self::Subnational),
            other => Err(HdxError::configuration(format!(
                "unknown output level '{other}'"
            ))),
        }
    }
}

/// A country or first-level subdivision in the canonical hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUnit {
    /// ISO3 for countries, PCode for subdivisions.
    pub code: String,
    /// Canonical display name.
    pub name: String,
    pub level: AdminLevel,
    /// Parent country code (subdivisions only).
    pub parent: Option<String>,
}

impl AdminUnit {
    pub fn country(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            level: AdminLevel::Country,
            parent: None,
        }
    }

    pub fn subdivision(
        code: impl Into<String>,
        name: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            level: AdminLevel::Subdivision,
            parent: Some(parent.into()),
        }
    }
}
