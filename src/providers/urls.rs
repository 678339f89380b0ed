//! URL helpers for continuation handles

use super::error::ProviderError;
use num_bigint::BigUint;
use url::Url;

/// Set (or replace) one query parameter of an absolute URL
pub fn set_query_param(url: &str, key: &str, value: &str) -> Result<String, ProviderError> {
    let mut parsed = Url::parse(url)
        .map_err(|e| ProviderError::fatal(format!("invalid continuation URL {url}: {e}")))?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    Ok(parsed.into())
}

/// Whether a continuation handle looks like an absolute HTTP(S) URL
pub fn is_http_url(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.starts_with("http://") || candidate.starts_with("https://")
}

/// Hit count reported either as a JSON number or a decimal string
pub fn hit_count(value: &serde_json::Value) -> BigUint {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(BigUint::from).unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => BigUint::default(),
    }
}

/// Estimate reported by providers that do not give one
pub fn unknown_hit_count() -> BigUint {
    BigUint::from(i64::MAX as u64)
}
