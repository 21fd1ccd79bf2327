//! Cheap shape checks on caller-supplied identifiers.
//!
//! These run before any store or remote access so that obviously malformed
//! input fails fast instead of costing a network round trip.

use crate::error::EngineError;

/// Length of a remote catalog (base-62) identifier.
pub const EXTERNAL_ID_LEN: usize = 22;

/// Check that `id` looks like a remote catalog id: 22 ASCII alphanumerics.
pub fn validate_external_id(id: &str) -> Result<(), EngineError> {
    if id.len() != EXTERNAL_ID_LEN || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(EngineError::InvalidIdentifierFormat(id.to_string()));
    }
    Ok(())
}

/// Trim, drop blanks and duplicates (first occurrence wins), then shape-check
/// what is left. Returns the ids in caller order.
pub fn normalize_external_ids<I, S>(ids: I) -> Result<Vec<String>, EngineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut normalized = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if id.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }
        validate_external_id(id)?;
        normalized.push(id.to_string());
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "4uLU6hMCjMI75M1A2tKUQC";

    #[test]
    fn test_valid_id_passes() {
        assert!(validate_external_id(VALID).is_ok());
    }

    #[test]
    fn test_wrong_length_fails() {
        assert!(matches!(
            validate_external_id("abc"),
            Err(EngineError::InvalidIdentifierFormat(id)) if id == "abc"
        ));
    }

    #[test]
    fn test_non_alphanumeric_fails() {
        assert!(validate_external_id("4uLU6hMCjMI75M1A2tKU-C").is_err());
        assert!(validate_external_id("spotify:track:4uLU6hMC").is_err());
    }

    #[test]
    fn test_normalize_drops_blanks_and_duplicates_keeping_order() {
        let other = "1301WleyT98MSxVHPZCA6M";
        let ids = vec!["", VALID, "  ", other, VALID, " 1301WleyT98MSxVHPZCA6M "];
        let normalized = normalize_external_ids(ids).unwrap();
        assert_eq!(normalized, vec![VALID.to_string(), other.to_string()]);
    }

    #[test]
    fn test_normalize_fails_on_first_malformed_id() {
        let result = normalize_external_ids([VALID, "nope"]);
        assert!(matches!(result, Err(EngineError::InvalidIdentifierFormat(_))));
    }
}
