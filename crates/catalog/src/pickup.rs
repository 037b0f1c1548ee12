use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tradeflow_core::DomainError;

/// Where a physical unit of an item sits within a warehouse.
///
/// Pickup is a dimension of every bucket key, not an entity of its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pickup {
    Rack,
    Depot,
    Plant,
}

impl Pickup {
    pub const ALL: [Pickup; 3] = [Pickup::Rack, Pickup::Depot, Pickup::Plant];

    pub fn as_str(self) -> &'static str {
        match self {
            Pickup::Rack => "rack",
            Pickup::Depot => "depot",
            Pickup::Plant => "plant",
        }
    }
}

impl fmt::Display for Pickup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pickup {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rack" => Ok(Pickup::Rack),
            "depot" => Ok(Pickup::Depot),
            "plant" => Ok(Pickup::Plant),
            other => Err(DomainError::validation(format!(
                "unknown pickup '{other}' (expected rack, depot or plant)"
            ))),
        }
    }
}
