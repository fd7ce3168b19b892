//! Asset directory and tradable-pair listing.
//!
//! Snapshots of what the exchange reports about its assets. Both are keyed
//! by exchange-internal identifiers and kept in ordered maps so every scan
//! visits entries in the same order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Assets
// =============================================================================

/// One entry of the exchange's asset directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Human-readable code (e.g., "XBT" for asset id "XXBT")
    pub altname: String,
    /// Asset class (e.g., "currency")
    #[serde(default)]
    pub aclass: Option<String>,
    /// Scaling decimal places for record keeping
    #[serde(default)]
    pub decimals: Option<u32>,
    /// Scaling decimal places for display
    #[serde(default)]
    pub display_decimals: Option<u32>,
    /// Funding/trading status (e.g., "enabled")
    #[serde(default)]
    pub status: Option<String>,
}

impl AssetInfo {
    /// Entry with only an altname set.
    pub fn with_altname(altname: impl Into<String>) -> Self {
        Self {
            altname: altname.into(),
            aclass: None,
            decimals: None,
            display_decimals: None,
            status: None,
        }
    }
}

/// Snapshot of the exchange's asset directory (`asset_id -> info`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetDirectory {
    assets: BTreeMap<String, AssetInfo>,
}

impl AssetDirectory {
    /// Build from decoded entries.
    pub fn new(assets: BTreeMap<String, AssetInfo>) -> Self {
        Self { assets }
    }

    /// Look up an entry by asset id.
    pub fn get(&self, asset_id: &str) -> Option<&AssetInfo> {
        self.assets.get(asset_id)
    }

    /// All asset ids whose altname equals `altname` exactly.
    pub fn ids_for_altname(&self, altname: &str) -> Vec<&str> {
        self.assets
            .iter()
            .filter(|(_, info)| info.altname == altname)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Iterate `(asset_id, info)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetInfo)> {
        self.assets.iter().map(|(id, info)| (id.as_str(), info))
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True when the exchange reported no assets.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<(String, AssetInfo)> for AssetDirectory {
    fn from_iter<T: IntoIterator<Item = (String, AssetInfo)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// =============================================================================
// Tradable pairs
// =============================================================================

/// One entry of the tradable-pair listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    /// Concatenated human-readable codes (e.g., "XBTUSD")
    pub altname: String,
    /// Slash-separated name (e.g., "XBT/USD")
    #[serde(default)]
    pub wsname: Option<String>,
    /// Base asset id
    #[serde(default)]
    pub base: Option<String>,
    /// Quote asset id
    #[serde(default)]
    pub quote: Option<String>,
    /// Volume precision
    #[serde(default)]
    pub lot_decimals: Option<u32>,
    /// Price precision
    #[serde(default)]
    pub pair_decimals: Option<u32>,
    /// Minimum order volume, as reported (decimal string)
    #[serde(default)]
    pub ordermin: Option<String>,
}

impl PairInfo {
    /// Entry with only an altname set.
    pub fn with_altname(altname: impl Into<String>) -> Self {
        Self {
            altname: altname.into(),
            wsname: None,
            base: None,
            quote: None,
            lot_decimals: None,
            pair_decimals: None,
            ordermin: None,
        }
    }
}

/// Snapshot of the exchange's tradable pairs (`pair_id -> info`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairListing {
    pairs: BTreeMap<String, PairInfo>,
}

impl PairListing {
    /// Build from decoded entries.
    pub fn new(pairs: BTreeMap<String, PairInfo>) -> Self {
        Self { pairs }
    }

    /// Look up an entry by pair id.
    pub fn get(&self, pair_id: &str) -> Option<&PairInfo> {
        self.pairs.get(pair_id)
    }

    /// Iterate `(pair_id, info)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PairInfo)> {
        self.pairs.iter().map(|(id, info)| (id.as_str(), info))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the exchange reported no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(String, PairInfo)> for PairListing {
    fn from_iter<T: IntoIterator<Item = (String, PairInfo)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
