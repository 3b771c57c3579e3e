//! Prompt assembly under a strict token budget.
//!
//! The budget is enforced with a deterministic whitespace tokenizer so
//! the same inputs always produce the same prompt, independent of any
//! model-side tokenization.

use eidolon_core::{CharacterCard, Error, MemoryRecord, RecentMessage, Result};

/// Deterministic token estimate: whitespace-separated chunks.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone)]
pub struct PromptBuildResult {
    pub system_prompt: String,
    pub user_prompt: String,
    pub estimated_input_tokens: usize,
    pub included_memory_count: usize,
    pub included_history_count: usize,
    pub was_truncated: bool,
}

type TokenCounter = fn(&str) -> usize;

/// Assembles system/user prompts from persona, rules, memories, and
/// history, never exceeding the configured token budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    token_budget: usize,
    count: TokenCounter,
}

impl PromptBuilder {
    pub fn new(token_budget: usize) -> Result<Self> {
        Self::with_counter(token_budget, estimate_tokens)
    }

    pub fn with_counter(token_budget: usize, count: TokenCounter) -> Result<Self> {
        if token_budget == 0 {
            return Err(Error::Config {
                message: "token_budget must be a positive integer".into(),
            });
        }
        Ok(Self {
            token_budget,
            count,
        })
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Priority order when the budget is tight: the persona block and
    /// conversation frame are always present, then the rules excerpt,
    /// then memories (best first), then history (most recent first).
    /// A final clamp trims the system prompt before the user prompt.
    pub fn build(
        &self,
        card: &CharacterCard,
        skill_rules_excerpt: &str,
        memories: &[MemoryRecord],
        recent_messages: &[RecentMessage],
    ) -> PromptBuildResult {
        let count = self.count;
        let system_fixed = build_system_fixed(card);
        let user_prefix = "Recent conversation:\n";
        let user_suffix =
            "\n\nSomeone is speaking to you now. Reply naturally in-character and keep it concise.";

        let used_tokens = count(&system_fixed) + count(user_prefix) + count(user_suffix);
        let mut budget_remaining = self.token_budget.saturating_sub(used_tokens);
        let mut was_truncated = used_tokens > self.token_budget;

        let mut skill_section = String::new();
        let excerpt_trimmed = skill_rules_excerpt.trim();
        if !excerpt_trimmed.is_empty() && budget_remaining > 0 {
            let label = "Game rules reference:\n";
            let excerpt_budget = budget_remaining.saturating_sub(count(label));
            let excerpt = truncate_to_token_budget(excerpt_trimmed, excerpt_budget, count);
            if !excerpt.is_empty() {
                skill_section = format!("\n\n{label}{excerpt}");
                budget_remaining = budget_remaining.saturating_sub(count(&skill_section));
                if excerpt != excerpt_trimmed {
                    was_truncated = true;
                }
            } else {
                was_truncated = true;
            }
        }

        let memory_lines: Vec<String> = memories
            .iter()
            .map(|m| {
                format!(
                    "- {} (source={}, score={:.3}, mode={})",
                    m.text, m.source, m.score, m.mode
                )
            })
            .collect();
        let (selected_memory_lines, memory_truncated) =
            select_lines_with_budget(&memory_lines, budget_remaining, count);
        let memory_block = if selected_memory_lines.is_empty() {
            "Memory highlights:\n- (none)".to_string()
        } else {
            let block = format!("Memory highlights:\n{}", selected_memory_lines.join("\n"));
            budget_remaining = budget_remaining.saturating_sub(count(&block) + count("\n\n"));
            block
        };
        was_truncated = was_truncated || memory_truncated;

        let history_lines: Vec<String> = recent_messages
            .iter()
            .map(|m| format!("[{}][{}] {}", m.role, m.author_name, m.content))
            .collect();
        let (selected_history_lines, history_truncated) =
            select_lines_from_tail_with_budget(&history_lines, budget_remaining, count);
        let history_block = if selected_history_lines.is_empty() {
            "(no recent messages)".to_string()
        } else {
            selected_history_lines.join("\n")
        };
        was_truncated = was_truncated || history_truncated;

        let included_memory_count = selected_memory_lines.len();
        let included_history_count = selected_history_lines.len();

        let mut system_prompt = format!("{system_fixed}{skill_section}\n\n{memory_block}");
        let mut user_prompt = format!("{user_prefix}{history_block}{user_suffix}");
        let mut total_tokens = count(&system_prompt) + count(&user_prompt);

        // Safety clamp for pathological budgets: the structured passes
        // above should already fit, but the final prompts must never
        // exceed the budget.
        if total_tokens > self.token_budget {
            was_truncated = true;
            let allowed_system = self.token_budget.saturating_sub(count(&user_prompt));
            system_prompt = truncate_to_token_budget(&system_prompt, allowed_system, count);
            total_tokens = count(&system_prompt) + count(&user_prompt);

            if total_tokens > self.token_budget {
                let allowed_user = self.token_budget.saturating_sub(count(&system_prompt));
                user_prompt = truncate_to_token_budget(&user_prompt, allowed_user, count);
                total_tokens = count(&system_prompt) + count(&user_prompt);
            }
        }

        PromptBuildResult {
            system_prompt,
            user_prompt,
            estimated_input_tokens: total_tokens,
            included_memory_count,
            included_history_count,
            was_truncated: was_truncated || total_tokens > self.token_budget,
        }
    }
}

fn build_system_fixed(card: &CharacterCard) -> String {
    format!(
        "You are {}, a TTRPG character.\n\
         Description: {}\n\
         Personality: {}\n\
         Background: {}\n\n\
         Stats: {}\n\
         Inventory: {}",
        card.name,
        card.description,
        card.personality,
        card.background,
        card.stats_summary(),
        card.inventory_summary(),
    )
}

/// Greedy prefix selection: stop at the first line that does not fit.
fn select_lines_with_budget(
    lines: &[String],
    budget: usize,
    count: TokenCounter,
) -> (Vec<String>, bool) {
    let mut selected = Vec::new();
    let mut remaining = budget;
    for line in lines {
        let cost = count(line);
        if cost <= remaining {
            selected.push(line.clone());
            remaining -= cost;
        } else {
            break;
        }
    }
    let truncated = selected.len() < lines.len();
    (selected, truncated)
}

/// Greedy suffix selection: keep the most recent lines that fit, in
/// original order.
fn select_lines_from_tail_with_budget(
    lines: &[String],
    budget: usize,
    count: TokenCounter,
) -> (Vec<String>, bool) {
    let mut selected_reversed = Vec::new();
    let mut remaining = budget;
    for line in lines.iter().rev() {
        let cost = count(line);
        if cost <= remaining {
            selected_reversed.push(line.clone());
            remaining -= cost;
        } else {
            break;
        }
    }
    selected_reversed.reverse();
    let truncated = selected_reversed.len() < lines.len();
    (selected_reversed, truncated)
}

/// Word-growth truncation: keep whole words while the running text
/// stays within the budget.
fn truncate_to_token_budget(text: &str, budget: usize, count: TokenCounter) -> String {
    if budget == 0 {
        return String::new();
    }
    if count(text) <= budget {
        return text.to_string();
    }

    let mut selected: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        selected.push(word);
        if count(&selected.join(" ")) > budget {
            selected.pop();
            break;
        }
    }
    selected.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eidolon_core::{RetrievalMode, Role};
    use std::collections::BTreeMap;

    fn card() -> CharacterCard {
        CharacterCard {
            name: "Vesper".into(),
            description: "A wary archivist".into(),
            personality: "Dry, observant".into(),
            background: "Raised in the stacks".into(),
            stats: BTreeMap::from([("DEX".into(), 60), ("STR".into(), 40)]),
            skills: BTreeMap::new(),
            inventory: vec!["lantern".into(), "journal".into()],
        }
    }

    fn memory(text: &str, score: f64) -> MemoryRecord {
        MemoryRecord {
            text: text.into(),
            source: "notes.md".into(),
            score,
            mode: RetrievalMode::Query,
        }
    }

    fn message(author: &str, role: Role, content: &str) -> RecentMessage {
        RecentMessage {
            message_id: 1,
            channel_id: 1,
            author_id: 5,
            author_name: author.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            mentioned_user_ids: vec![],
        }
    }

    #[test]
    fn whitespace_tokenizer() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   "), 0);
        assert_eq!(estimate_tokens("one two  three\nfour"), 4);
    }

    #[test]
    fn zero_budget_rejected() {
        assert!(PromptBuilder::new(0).is_err());
    }

    #[test]
    fn includes_all_sections_under_generous_budget() {
        let builder = PromptBuilder::new(2000).unwrap();
        let result = builder.build(
            &card(),
            "Roll 1d100 under the skill value.",
            &[memory("fears deep water", 0.91)],
            &[message("alice", Role::User, "what do you see ahead?")],
        );

        assert!(result.system_prompt.starts_with("You are Vesper, a TTRPG character."));
        assert!(result.system_prompt.contains("Stats: DEX=60, STR=40"));
        assert!(result.system_prompt.contains("Inventory: lantern, journal"));
        assert!(result.system_prompt.contains("Game rules reference:\nRoll 1d100"));
        assert!(result
            .system_prompt
            .contains("- fears deep water (source=notes.md, score=0.910, mode=query)"));
        assert!(result.user_prompt.starts_with("Recent conversation:\n"));
        assert!(result
            .user_prompt
            .contains("[user][alice] what do you see ahead?"));
        assert!(result.user_prompt.ends_with("keep it concise."));
        assert_eq!(result.included_memory_count, 1);
        assert_eq!(result.included_history_count, 1);
        assert!(!result.was_truncated);
        assert!(result.estimated_input_tokens <= 2000);
    }

    #[test]
    fn placeholders_for_empty_inputs() {
        let builder = PromptBuilder::new(2000).unwrap();
        let result = builder.build(&card(), "", &[], &[]);
        assert!(result.system_prompt.contains("Memory highlights:\n- (none)"));
        assert!(result.user_prompt.contains("(no recent messages)"));
        assert!(!result.system_prompt.contains("Game rules reference"));
        assert_eq!(result.included_memory_count, 0);
        assert_eq!(result.included_history_count, 0);
    }

    #[test]
    fn memories_are_prefix_greedy() {
        // Sized so the first memory line fits and the second does not.
        let builder = PromptBuilder::new(50).unwrap();
        let memories = vec![
            memory("remembers the ritual chant", 0.9),
            memory("owes the innkeeper three silver coins and a favor", 0.8),
            memory("distrusts the constable", 0.7),
        ];
        let result = builder.build(&card(), "", &memories, &[]);
        assert!(result.included_memory_count < memories.len());
        assert!(result
            .system_prompt
            .contains("remembers the ritual chant"));
        assert!(result.was_truncated);
        assert!(result.estimated_input_tokens <= 50);
    }

    #[test]
    fn history_keeps_most_recent_lines() {
        let builder = PromptBuilder::new(60).unwrap();
        let history = vec![
            message("alice", Role::User, "a very old line from long ago in the session"),
            message("bob", Role::User, "middle line"),
            message("alice", Role::User, "newest line"),
        ];
        let result = builder.build(&card(), "", &[], &history);
        assert!(result.user_prompt.contains("newest line"));
        if result.included_history_count < history.len() {
            assert!(result.was_truncated);
        }
        // Order is chronological even when selected from the tail.
        if result.included_history_count == 3 {
            let middle = result.user_prompt.find("middle line").unwrap();
            let newest = result.user_prompt.find("newest line").unwrap();
            assert!(middle < newest);
        }
        assert!(result.estimated_input_tokens <= 60);
    }

    #[test]
    fn tail_selection_keeps_original_order() {
        // Seven 2-token lines; a 6-token budget admits exactly the
        // last three, in chronological order rather than reversed.
        let lines: Vec<String> = (1..=7).map(|i| format!("msg {i}")).collect();
        let (selected, truncated) = select_lines_from_tail_with_budget(&lines, 6, estimate_tokens);
        assert_eq!(selected, vec!["msg 5", "msg 6", "msg 7"]);
        assert!(truncated);

        let (all, truncated) = select_lines_from_tail_with_budget(&lines, 100, estimate_tokens);
        assert_eq!(all.len(), 7);
        assert!(!truncated);
    }

    #[test]
    fn final_prompts_never_exceed_budget() {
        let builder = PromptBuilder::new(40).unwrap();
        let memories: Vec<_> = (0..20)
            .map(|i| memory(&format!("long memory fact number {i} with extra words"), 0.5))
            .collect();
        let history: Vec<_> = (0..20)
            .map(|i| message("alice", Role::User, &format!("chatter line {i} with padding")))
            .collect();
        let result = builder.build(&card(), "rules text ".repeat(50).as_str(), &memories, &history);
        assert!(result.was_truncated);
        assert!(
            estimate_tokens(&result.system_prompt) + estimate_tokens(&result.user_prompt) <= 40
        );
        assert_eq!(
            result.estimated_input_tokens,
            estimate_tokens(&result.system_prompt) + estimate_tokens(&result.user_prompt)
        );
    }
}
