use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tradeflow_catalog::{ItemId, Pickup};
use tradeflow_core::DomainError;

/// One of the three per-warehouse quantity pools.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Available-to-promise stock.
    Available,
    /// Reserved against bookings.
    Committed,
    /// Received/dispatched through purchases.
    Billed,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Available => "available",
            Bucket::Committed => "committed",
            Bucket::Billed => "billed",
        }
    }

    /// Whether an entry is dropped once its quantity reaches zero.
    pub fn prunes_zero_entries(self) -> bool {
        matches!(self, Bucket::Committed)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Bucket::Available),
            "committed" => Ok(Bucket::Committed),
            "billed" => Ok(Bucket::Billed),
            other => Err(DomainError::validation(format!("unknown bucket '{other}'"))),
        }
    }
}

/// Bucket entry key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub item: ItemId,
    pub pickup: Pickup,
}

impl BucketKey {
    pub fn new(item: ItemId, pickup: Pickup) -> Self {
        Self { item, pickup }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item, self.pickup)
    }
}

/// Serialize a bucket map as a list of `{item, pickup, quantity}` entries.
pub(crate) mod entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::BucketKey;
    use tradeflow_catalog::{ItemId, Pickup};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        item: ItemId,
        pickup: Pickup,
        quantity: i64,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<BucketKey, i64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter().map(|(key, quantity)| Entry {
            item: key.item,
            pickup: key.pickup,
            quantity: *quantity,
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<BucketKey, i64>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for e in entries {
            let key = BucketKey::new(e.item, e.pickup);
            if map.insert(key, e.quantity).is_some() {
                return Err(serde::de::Error::custom(format!(
                    "duplicate bucket entry for {key}"
                )));
            }
        }
        Ok(map)
    }
}
