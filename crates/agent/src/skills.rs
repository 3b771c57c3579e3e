//! Prompt-ready skill ruleset excerpts.
//!
//! Excerpts are embedded at compile time so a deployment never depends
//! on data files being installed next to the binary.

use thiserror::Error;

pub const SUPPORTED_RULESETS: &[&str] = &["coc7e", "dnd5e"];

/// Default cap on excerpt length, in characters.
pub const DEFAULT_MAX_CHARS: usize = 2400;

const COC7E: &str = include_str!("excerpts/coc7e.md");
const DND5E: &str = include_str!("excerpts/dnd5e.md");

#[derive(Debug, Error)]
pub enum SkillExcerptError {
    #[error("unsupported skill ruleset '{ruleset}', expected one of: {allowed}")]
    UnsupportedRuleset { ruleset: String, allowed: String },
    #[error("max_chars must be a positive integer")]
    InvalidMaxChars,
}

/// Load the excerpt for `ruleset`, capped at `max_chars` characters.
///
/// Ruleset names are matched case-insensitively after trimming. A
/// capped excerpt ends with `...` after trailing whitespace is
/// stripped.
pub fn load_skill_excerpt(ruleset: &str, max_chars: usize) -> Result<String, SkillExcerptError> {
    if max_chars == 0 {
        return Err(SkillExcerptError::InvalidMaxChars);
    }
    let normalized = ruleset.trim().to_lowercase();
    let text = match normalized.as_str() {
        "coc7e" => COC7E,
        "dnd5e" => DND5E,
        _ => {
            return Err(SkillExcerptError::UnsupportedRuleset {
                ruleset: ruleset.to_string(),
                allowed: SUPPORTED_RULESETS.join(", "),
            })
        }
    };

    let text = text.trim();
    if text.chars().count() <= max_chars {
        return Ok(text.to_string());
    }
    let capped: String = text.chars().take(max_chars).collect();
    Ok(format!("{}...", capped.trim_end()))
}
