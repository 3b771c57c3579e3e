//! Character card — the persona identity fed into the prompt.
//!
//! Full schema validation is owned by the card tooling outside this
//! system; here we load the JSON and enforce the handful of invariants
//! the prompt builder relies on.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PersonaError;

/// A roleplay persona. `stats` and `skills` use sorted maps so rendered
/// summaries are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterCard {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub background: String,
    #[serde(default)]
    pub stats: BTreeMap<String, i64>,
    #[serde(default)]
    pub skills: BTreeMap<String, i64>,
    #[serde(default)]
    pub inventory: Vec<String>,
}

impl CharacterCard {
    /// Load and validate a card from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PersonaError> {
        if !path.exists() {
            return Err(PersonaError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| PersonaError::InvalidJson {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let card: CharacterCard =
            serde_json::from_str(&raw).map_err(|e| PersonaError::InvalidJson {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        card.validate()?;
        Ok(card)
    }

    /// Enforce the invariants the prompt builder depends on.
    pub fn validate(&self) -> Result<(), PersonaError> {
        for (field, value) in [
            ("name", &self.name),
            ("description", &self.description),
            ("personality", &self.personality),
            ("background", &self.background),
        ] {
            if value.trim().is_empty() {
                return Err(PersonaError::InvalidField {
                    field: field.into(),
                    message: "value cannot be empty".into(),
                });
            }
        }
        for (key, value) in self.stats.iter().chain(self.skills.iter()) {
            if !(0..=100).contains(value) {
                return Err(PersonaError::InvalidField {
                    field: key.clone(),
                    message: format!("expected a value between 0 and 100, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// `key=value` summary of stats in sorted order.
    pub fn stats_summary(&self) -> String {
        self.stats
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Comma-joined inventory, or a placeholder when empty.
    pub fn inventory_summary(&self) -> String {
        if self.inventory.is_empty() {
            "(none)".into()
        } else {
            self.inventory.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_card() -> CharacterCard {
        CharacterCard {
            name: "Vesper".into(),
            description: "A wandering archivist".into(),
            personality: "Dry, precise, quietly kind".into(),
            background: "Raised among the stacks of a drowned library".into(),
            stats: BTreeMap::from([("STR".into(), 40), ("INT".into(), 80)]),
            skills: BTreeMap::from([("Library Use".into(), 70)]),
            inventory: vec!["brass key".into(), "waterlogged journal".into()],
        }
    }

    #[test]
    fn valid_card_passes() {
        assert!(sample_card().validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut card = sample_card();
        card.name = "  ".into();
        assert!(matches!(
            card.validate(),
            Err(PersonaError::InvalidField { field, .. }) if field == "name"
        ));
    }

    #[test]
    fn out_of_range_stat_rejected() {
        let mut card = sample_card();
        card.stats.insert("POW".into(), 120);
        assert!(card.validate().is_err());
    }

    #[test]
    fn summaries_are_deterministic() {
        let card = sample_card();
        // BTreeMap iterates sorted, so INT precedes STR.
        assert_eq!(card.stats_summary(), "INT=80, STR=40");
        assert_eq!(card.inventory_summary(), "brass key, waterlogged journal");
    }

    #[test]
    fn empty_inventory_has_placeholder() {
        let mut card = sample_card();
        card.inventory.clear();
        assert_eq!(card.inventory_summary(), "(none)");
    }

    #[test]
    fn load_round_trip() {
        let card = sample_card();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&card).unwrap()).unwrap();
        let loaded = CharacterCard::load(file.path()).unwrap();
        assert_eq!(loaded.name, "Vesper");
        assert_eq!(loaded.stats.get("INT"), Some(&80));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err = CharacterCard::load(Path::new("/nonexistent/card.json")).unwrap_err();
        assert!(matches!(err, PersonaError::NotFound(_)));
    }
}
