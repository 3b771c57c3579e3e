//! In-character reply formatting.

/// Prefixes replies with the speaking persona's name in bold.
#[derive(Debug, Clone)]
pub struct ReplyFormatter {
    speaker: String,
}

impl ReplyFormatter {
    /// Blank names collapse to a generic "NPC" speaker.
    pub fn new(speaker: &str) -> Self {
        let trimmed = speaker.trim();
        Self {
            speaker: if trimmed.is_empty() {
                "NPC".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    /// `**{name}:** {text}`, with both sides trimmed. An empty reply
    /// body becomes an ellipsis so the persona never posts a bare name.
    pub fn format(&self, text: &str) -> String {
        let body = text.trim();
        let body = if body.is_empty() { "..." } else { body };
        format!("**{}:** {}", self.speaker, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_speaker_name() {
        let formatter = ReplyFormatter::new("Kovach");
        assert_eq!(
            formatter.format("Stay behind me."),
            "**Kovach:** Stay behind me."
        );
    }

    #[test]
    fn trims_both_sides() {
        let formatter = ReplyFormatter::new("  Kovach  ");
        assert_eq!(formatter.format("  easy now.  "), "**Kovach:** easy now.");
    }

    #[test]
    fn blank_speaker_becomes_npc() {
        let formatter = ReplyFormatter::new("   ");
        assert_eq!(formatter.format("Who goes there?"), "**NPC:** Who goes there?");
    }

    #[test]
    fn blank_reply_becomes_ellipsis() {
        let formatter = ReplyFormatter::new("Kovach");
        assert_eq!(formatter.format("   "), "**Kovach:** ...");
    }
}
