//! Bidirectional transform between `snake_case` identifiers and the DynamoDB
//! attribute-name convention.
//!
//! Attribute names in the store are initial-capitalized concatenations of the
//! caller-side `snake_case` tokens, with the key-marker tokens `gsi`, `pk`
//! and `sk` rendered fully upper-case:
//!
//! ```rust
//! use aws_clients::common::naming;
//!
//! assert_eq!(
//!     naming::to_attribute_name("gsi_dataset_summary_sk_latest_service_run_at"),
//!     "GSIDatasetSummarySKLatestServiceRunAt",
//! );
//! assert_eq!(
//!     naming::from_attribute_name("GSIDatasetSummarySKLatestServiceRunAt"),
//!     "gsi_dataset_summary_sk_latest_service_run_at",
//! );
//! ```
//!
//! The two directions are mutually consistent for identifiers composed of
//! lowercase tokens whose concatenation does not collide with the
//! `GSI`/`PK`/`SK` markers; round-tripping is not guaranteed for arbitrary
//! strings.

/// Tokens rendered fully upper-case instead of title-case.
const UPPER_TOKENS: [&str; 3] = ["gsi", "pk", "sk"];

/// Convert a `snake_case` identifier to a DynamoDB attribute name.
pub fn to_attribute_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for token in name.split('_') {
        if UPPER_TOKENS.contains(&token.to_ascii_lowercase().as_str()) {
            result.push_str(&token.to_ascii_uppercase());
        } else {
            let mut chars = token.chars();
            if let Some(first) = chars.next() {
                result.extend(first.to_uppercase());
                result.push_str(chars.as_str());
            }
        }
    }
    result
}

/// Convert a DynamoDB attribute name back to a `snake_case` identifier.
pub fn from_attribute_name(name: &str) -> String {
    // The markers must become standalone tokens before the generic split on
    // capital letters, otherwise e.g. "SK" would split into "s_k".
    let expanded = name
        .replace("GSI", "_gsi")
        .replace("PK", "_pk")
        .replace("SK", "_sk");
    let mut result = String::with_capacity(expanded.len() * 2);
    for character in expanded.chars() {
        if character.is_uppercase() {
            result.push('_');
            result.extend(character.to_lowercase());
        } else {
            result.push(character);
        }
    }
    if result.starts_with('_') {
        result.remove(0);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::single_token("region", "Region")]
    #[case::multiple_tokens("service_run_at", "ServiceRunAt")]
    #[case::partition_key_marker("pk", "PK")]
    #[case::index_with_markers("gsi_session_pk_region", "GSISessionPKRegion")]
    #[case::full_index_name(
        "gsi_dataset_summary_sk_latest_service_run_at",
        "GSIDatasetSummarySKLatestServiceRunAt"
    )]
    fn test_to_attribute_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(to_attribute_name(name), expected);
    }

    #[rstest]
    #[case::single_token("Region", "region")]
    #[case::multiple_tokens("ServiceRunAt", "service_run_at")]
    #[case::partition_key_marker("PK", "pk")]
    #[case::index_with_markers("GSISessionPKRegion", "gsi_session_pk_region")]
    #[case::full_index_name(
        "GSIDatasetSummarySKLatestServiceRunAt",
        "gsi_dataset_summary_sk_latest_service_run_at"
    )]
    fn test_from_attribute_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(from_attribute_name(name), expected);
    }

    #[rstest]
    #[case::plain("drivelog")]
    #[case::two_tokens("sender_service")]
    #[case::marker_leading("pk_region")]
    #[case::marker_inner("gsi_session_pk_region")]
    #[case::long("gsi_dataset_summary_sk_latest_service_run_at")]
    fn test_round_trip(#[case] name: &str) {
        assert_eq!(from_attribute_name(&to_attribute_name(name)), name);
    }
}
