//! Asset pair resolution.
//!
//! Turns two human-readable currency codes into the exchange's canonical
//! pair symbol. Resolution never guesses: an unknown code, a code shared by
//! several assets, or a pair the exchange does not list is an error.

use crate::assets::{AssetDirectory, PairListing};
use crate::value_objects::{AssetCode, DomainError, PairSymbol};

/// Resolution failures. None of these are retriable without fixing input
/// (or waiting for the exchange to list the asset).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// No asset in the directory carries this altname
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// More than one asset carries this altname
    #[error("Ambiguous asset {code}: matches {}", .asset_ids.join(", "))]
    AmbiguousAsset { code: String, asset_ids: Vec<String> },

    /// Neither orientation of the pair is listed as tradable
    #[error("Trading pair for {0}/{1} not found")]
    PairNotFound(String, String),

    /// Input code was not a valid currency code
    #[error(transparent)]
    InvalidCode(#[from] DomainError),
}

/// Resolve `(code_a, code_b)` against the asset directory.
///
/// The pair symbol is the asset id of `code_a` followed by the asset id of
/// `code_b`. Codes are matched case-insensitively against altnames.
///
/// # Examples
/// ```
/// # use coinpilot_domain::{resolve, AssetDirectory, AssetInfo};
/// let directory: AssetDirectory = [
///     ("XXBT".to_string(), AssetInfo::with_altname("XBT")),
///     ("ZUSD".to_string(), AssetInfo::with_altname("USD")),
/// ]
/// .into_iter()
/// .collect();
///
/// let pair = resolve("xbt", "usd", &directory).unwrap();
/// assert_eq!(pair.as_str(), "XXBTZUSD");
/// ```
pub fn resolve(
    code_a: &str,
    code_b: &str,
    directory: &AssetDirectory,
) -> Result<PairSymbol, ResolutionError> {
    let code_a = AssetCode::new(code_a)?;
    let code_b = AssetCode::new(code_b)?;

    let id_a = unique_asset_id(&code_a, directory)?;
    let id_b = unique_asset_id(&code_b, directory)?;

    Ok(PairSymbol::new(format!("{}{}", id_a, id_b))?)
}

/// Resolve `(code_a, code_b)` against the tradable-pair listing.
///
/// Matches the listing altname against `A+B` first, then `B+A`, and returns
/// the listed pair id.
pub fn resolve_tradable(
    code_a: &str,
    code_b: &str,
    listing: &PairListing,
) -> Result<PairSymbol, ResolutionError> {
    let code_a = AssetCode::new(code_a)?;
    let code_b = AssetCode::new(code_b)?;

    let forward = format!("{}{}", code_a, code_b);
    let reverse = format!("{}{}", code_b, code_a);

    let found = listing
        .iter()
        .find(|(_, info)| info.altname == forward)
        .or_else(|| listing.iter().find(|(_, info)| info.altname == reverse));

    match found {
        Some((pair_id, _)) => Ok(PairSymbol::new(pair_id)?),
        None => Err(ResolutionError::PairNotFound(
            code_a.as_str().to_string(),
            code_b.as_str().to_string(),
        )),
    }
}

/// Base asset id of a resolved code, for callers that need asset metadata.
pub fn asset_id_for<'a>(
    code: &str,
    directory: &'a AssetDirectory,
) -> Result<&'a str, ResolutionError> {
    let code = AssetCode::new(code)?;
    unique_asset_id(&code, directory)
}

fn unique_asset_id<'a>(
    code: &AssetCode,
    directory: &'a AssetDirectory,
) -> Result<&'a str, ResolutionError> {
    let ids = directory.ids_for_altname(code.as_str());
    match ids.as_slice() {
        [] => Err(ResolutionError::UnknownAsset(code.as_str().to_string())),
        [id] => Ok(*id),
        _ => Err(ResolutionError::AmbiguousAsset {
            code: code.as_str().to_string(),
            asset_ids: ids.iter().map(|id| id.to_string()).collect(),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetInfo, PairInfo};

    fn directory() -> AssetDirectory {
        [
            ("XXBT".to_string(), AssetInfo::with_altname("XBT")),
            ("ZUSD".to_string(), AssetInfo::with_altname("USD")),
            ("XETH".to_string(), AssetInfo::with_altname("ETH")),
        ]
        .into_iter()
        .collect()
    }

    fn listing() -> PairListing {
        [
            ("XXBTZUSD".to_string(), PairInfo::with_altname("XBTUSD")),
            ("XETHXXBT".to_string(), PairInfo::with_altname("ETHXBT")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let pair = resolve("xbt", "usd", &directory()).unwrap();
        assert_eq!(pair.as_str(), "XXBTZUSD");
    }

    #[test]
    fn test_resolve_keeps_argument_order() {
        let pair = resolve("USD", "XBT", &directory()).unwrap();
        assert_eq!(pair.as_str(), "ZUSDXXBT");
    }

    #[test]
    fn test_resolve_unknown_quote() {
        let err = resolve("XBT", "ZZZ", &directory()).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownAsset("ZZZ".to_string()));
    }

    #[test]
    fn test_resolve_unknown_base() {
        let err = resolve("doge", "usd", &directory()).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownAsset("DOGE".to_string()));
    }

    #[test]
    fn test_resolve_duplicate_altname_fails_loudly() {
        let directory: AssetDirectory = [
            ("XXBT".to_string(), AssetInfo::with_altname("XBT")),
            ("XBT2".to_string(), AssetInfo::with_altname("XBT")),
            ("ZUSD".to_string(), AssetInfo::with_altname("USD")),
        ]
        .into_iter()
        .collect();

        let err = resolve("XBT", "USD", &directory).unwrap_err();
        match err {
            ResolutionError::AmbiguousAsset { code, asset_ids } => {
                assert_eq!(code, "XBT");
                assert_eq!(asset_ids, vec!["XBT2".to_string(), "XXBT".to_string()]);
            },
            other => panic!("Expected AmbiguousAsset, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_dotted_altname() {
        let directory: AssetDirectory = [
            ("ETH2.S".to_string(), AssetInfo::with_altname("ETH2.S")),
            ("XETH".to_string(), AssetInfo::with_altname("ETH")),
        ]
        .into_iter()
        .collect();

        let pair = resolve("eth2.s", "eth", &directory).unwrap();
        assert_eq!(pair.as_str(), "ETH2.SXETH");
    }

    #[test]
    fn test_resolve_unlisted_punctuated_code_is_unknown() {
        let err = resolve("XBT/USD", "USD", &directory()).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownAsset("XBT/USD".to_string()));
    }

    #[test]
    fn test_resolve_rejects_invalid_code() {
        let err = resolve("", "USD", &directory()).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidCode(_)));
    }

    #[test]
    fn test_resolve_tradable_forward() {
        let pair = resolve_tradable("xbt", "usd", &listing()).unwrap();
        assert_eq!(pair.as_str(), "XXBTZUSD");
    }

    #[test]
    fn test_resolve_tradable_reverse_orientation() {
        let pair = resolve_tradable("XBT", "ETH", &listing()).unwrap();
        assert_eq!(pair.as_str(), "XETHXXBT");
    }

    #[test]
    fn test_resolve_tradable_not_found() {
        let err = resolve_tradable("XBT", "XRP", &listing()).unwrap_err();
        assert_eq!(err, ResolutionError::PairNotFound("XBT".to_string(), "XRP".to_string()));
    }

    #[test]
    fn test_asset_id_for() {
        assert_eq!(asset_id_for("eth", &directory()).unwrap(), "XETH");
        assert!(asset_id_for("ZZZ", &directory()).is_err());
    }
}
