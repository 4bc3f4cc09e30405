//! Auto-generated changelog entries summarising a reconciliation.

use super::model::ReconciliationResult;
use crate::db::changelog_repo::ChangelogRow;
use crate::db::new_id;
use crate::sanitize::{truncate_with_ellipsis, CHANGELOG_DETAILS_MAX_CHARS};

/// Changelog type used for every auto-generated entry.
pub const AUTO_CHANGELOG_TYPE: &str = "CHANGED";

/// Compact count notation in fixed order, e.g. `+3 ~1 -2`. Zero counts are omitted.
pub fn summary(result: &ReconciliationResult) -> String {
    let mut parts = Vec::with_capacity(3);
    if result.added_count > 0 {
        parts.push(format!("+{}", result.added_count));
    }
    if result.updated_count > 0 {
        parts.push(format!("~{}", result.updated_count));
    }
    if result.deleted_count > 0 {
        parts.push(format!("-{}", result.deleted_count));
    }
    parts.join(" ")
}

/// One sentence per non-zero count, bounded to 1000 characters.
pub fn details(result: &ReconciliationResult) -> String {
    let mut sentences = Vec::with_capacity(3);
    if result.added_count > 0 {
        sentences.push(format!("Added: {} endpoints.", result.added_count));
    }
    if result.updated_count > 0 {
        sentences.push(format!("Updated: {} endpoints.", result.updated_count));
    }
    if result.deleted_count > 0 {
        sentences.push(format!("Removed: {} endpoints.", result.deleted_count));
    }
    truncate_with_ellipsis(&sentences.join(" "), CHANGELOG_DETAILS_MAX_CHARS)
}

/// Builds the changelog entry for a successful reconciliation, or `None`
/// when nothing changed.
pub fn build_entry(
    contract_id: &str,
    result: &ReconciliationResult,
    released_at: &str,
) -> Option<ChangelogRow> {
    if !result.has_changes() {
        return None;
    }

    Some(ChangelogRow {
        id: new_id(),
        api_id: contract_id.to_string(),
        entry_type: AUTO_CHANGELOG_TYPE.to_string(),
        breaking: result.breaks_detected,
        summary: summary(result),
        details: Some(details(result)),
        released_at: released_at.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(added: u32, updated: u32, deleted: u32) -> ReconciliationResult {
        ReconciliationResult {
            added_count: added,
            updated_count: updated,
            deleted_count: deleted,
            breaks_detected: deleted > 0,
            breaking_changes: Vec::new(),
        }
    }

    #[test]
    fn test_no_entry_for_noop() {
        assert!(build_entry("api", &counts(0, 0, 0), "now").is_none());
    }

    #[test]
    fn test_summary_skips_zero_counts() {
        assert_eq!(summary(&counts(3, 1, 0)), "+3 ~1");
        assert_eq!(summary(&counts(0, 0, 2)), "-2");
        assert_eq!(summary(&counts(1, 2, 3)), "+1 ~2 -3");
    }

    #[test]
    fn test_details_sentences() {
        assert_eq!(
            details(&counts(3, 1, 0)),
            "Added: 3 endpoints. Updated: 1 endpoints."
        );
        assert_eq!(details(&counts(0, 0, 4)), "Removed: 4 endpoints.");
    }

    #[test]
    fn test_entry_mirrors_breaking_flag() {
        let entry = build_entry("api", &counts(0, 0, 1), "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(entry.entry_type, AUTO_CHANGELOG_TYPE);
        assert!(entry.breaking);
        assert_eq!(entry.api_id, "api");
        assert_eq!(entry.released_at, "2026-01-01T00:00:00Z");

        let entry = build_entry("api", &counts(2, 0, 0), "2026-01-01T00:00:00Z").unwrap();
        assert!(!entry.breaking);
        assert_eq!(entry.summary, "+2");
    }
}
