use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifies one of the two independent ledgers.
///
/// The chains share the block shape and algorithms but never reference each
/// other: tampering with one cannot affect verification of the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    /// Fund-release records.
    Fund,
    /// Project records.
    Project,
}

impl ChainId {
    /// Both chains, in a stable order.
    pub const ALL: [ChainId; 2] = [ChainId::Fund, ChainId::Project];

    /// Lowercase name used in routes, logs, and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fund => "fund",
            Self::Project => "project",
        }
    }

    /// Relational table holding this chain's blocks.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Fund => "fund_chain",
            Self::Project => "project_chain",
        }
    }

    /// Column holding the serialized payload in [`Self::table_name`].
    pub fn payload_column(&self) -> &'static str {
        match self {
            Self::Fund => "fund_data",
            Self::Project => "project_data",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fund" => Ok(Self::Fund),
            "project" => Ok(Self::Project),
            other => Err(TypeError::UnknownChain(other.to_string())),
        }
    }
}
