//! Advisory hints for failed deployments.
//!
//! The hints are derived from keywords in the error text. They are meant
//! for operators; callers must not branch on them.

/// Keyword groups and the hints they trigger, checked in order
const HINTS: &[(&[&str], &[&str])] = &[
    (
        &["unauthorized", "forbidden", "403", "401"],
        &[
            "Check workspace permissions - you need Member or Admin role",
            "Verify your authentication token is valid",
        ],
    ),
    (
        &["not found", "404"],
        &[
            "Verify the workspace ID is correct",
            "Check that all referenced items exist",
        ],
    ),
    (
        &["timeout", "timed out"],
        &[
            "The operation may take longer - try increasing the timeout",
            "Check your network connection",
        ],
    ),
    (
        &["already exists", "conflict", "409", "alreadyinuse"],
        &[
            "An item with this name already exists",
            "Consider allow_non_empty_workspace if this is intentional",
        ],
    ),
    (
        &["capacity"],
        &[
            "Check that your capacity is running",
            "Verify the capacity has sufficient resources",
        ],
    ),
];

/// Hints for an error message; the first matching keyword group wins
pub fn suggestions_for(error_text: &str) -> Vec<String> {
    let lower = error_text.to_lowercase();

    HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, hints)| hints.iter().map(|h| h.to_string()).collect())
        .unwrap_or_default()
}

/// Render hints as a trailing block for error messages (empty if none)
pub fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n\nSuggestions:");
    for suggestion in suggestions {
        out.push_str("\n  - ");
        out.push_str(suggestion);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_hints() {
        let hints = suggestions_for("Remote call failed (403): Forbidden");
        assert_eq!(hints.len(), 2);
        assert!(hints[0].contains("permissions"));
    }

    #[test]
    fn test_first_group_wins() {
        // Mentions both a timeout and a 404; not-found is checked first
        let hints = suggestions_for("404 after request timed out");
        assert!(hints[0].contains("workspace ID"));
    }

    #[test]
    fn test_no_match() {
        assert!(suggestions_for("something odd happened").is_empty());
        assert_eq!(format_suggestions(&[]), "");
    }

    #[test]
    fn test_format() {
        let block = format_suggestions(&["a".to_string(), "b".to_string()]);
        assert_eq!(block, "\n\nSuggestions:\n  - a\n  - b");
    }
}
