//! Scene-query derivation for memory retrieval.

use eidolon_core::RecentMessage;

/// How many trailing messages contribute to the scene query.
const SCENE_WINDOW: usize = 5;
/// Hard cap on query length, in characters.
const MAX_QUERY_CHARS: usize = 280;
/// Used when the history yields nothing usable.
const FALLBACK_QUERY: &str = "recent ttrpg conversation context";

/// Condense the trailing conversation into a single retrieval query.
///
/// Joins the last few non-empty message bodies with ` | `, caps the
/// result at 280 characters, and falls back to a generic scene query
/// when the history is empty or all-blank.
pub fn build_scene_query(history: &[RecentMessage]) -> String {
    let start = history.len().saturating_sub(SCENE_WINDOW);
    let parts: Vec<&str> = history[start..]
        .iter()
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let mut query = parts.join(" | ");
    if query.chars().count() > MAX_QUERY_CHARS {
        query = query.chars().take(MAX_QUERY_CHARS).collect();
        query.truncate(query.trim_end().len());
    }

    if query.is_empty() {
        FALLBACK_QUERY.to_string()
    } else {
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eidolon_core::Role;

    fn msg(content: &str) -> RecentMessage {
        RecentMessage {
            message_id: 1,
            channel_id: 1,
            author_id: 5,
            author_name: "alice".into(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            mentioned_user_ids: vec![],
        }
    }

    #[test]
    fn joins_trailing_messages() {
        let history = vec![msg("we enter the crypt"), msg("  "), msg("roll perception")];
        assert_eq!(
            build_scene_query(&history),
            "we enter the crypt | roll perception"
        );
    }

    #[test]
    fn only_last_five_contribute() {
        let history: Vec<_> = (1..=7).map(|i| msg(&format!("line{i}"))).collect();
        assert_eq!(
            build_scene_query(&history),
            "line3 | line4 | line5 | line6 | line7"
        );
    }

    #[test]
    fn long_queries_are_capped() {
        let history = vec![msg(&"a".repeat(200)), msg(&"b".repeat(200))];
        let query = build_scene_query(&history);
        assert_eq!(query.chars().count(), 280);
    }

    #[test]
    fn cap_strips_trailing_whitespace() {
        let mut long = "x".repeat(279);
        long.push(' ');
        long.push_str(&"y".repeat(40));
        let query = build_scene_query(&[msg(&long)]);
        assert_eq!(query, "x".repeat(279));
    }

    #[test]
    fn empty_or_blank_history_falls_back() {
        assert_eq!(build_scene_query(&[]), FALLBACK_QUERY);
        assert_eq!(build_scene_query(&[msg("   "), msg("")]), FALLBACK_QUERY);
    }
}
