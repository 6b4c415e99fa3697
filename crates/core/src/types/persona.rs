//! AI persona profiles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::PersonaId;

/// A persona as returned by `GET /personas/`.
///
/// Fields the admin does not edit are kept in `extra` so that backups
/// round-trip everything the backend sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub profile_image_key: Option<String>,
    #[serde(default)]
    pub starting_message: Option<String>,
    #[serde(default)]
    pub conversation_starters: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Persona {
    /// Conversation starters, empty when the backend sent none.
    #[must_use]
    pub fn starters(&self) -> &[String] {
        self.conversation_starters.as_deref().unwrap_or_default()
    }

    /// Starters joined one per line, as shown in the edit form.
    #[must_use]
    pub fn starters_text(&self) -> String {
        self.starters().join("\n")
    }
}

/// Body of `POST /personas/` and `PUT /personas/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaInput {
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub is_public: bool,
    pub profile_image_key: Option<String>,
    pub starting_message: Option<String>,
    pub conversation_starters: Vec<String>,
}

/// Split textarea input into conversation starters: one per line, trimmed,
/// blank lines dropped.
#[must_use]
pub fn parse_conversation_starters(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_starters_trims_and_drops_blanks() {
        let parsed = parse_conversation_starters("  hello \n\n\r\n  what is this?\n   ");
        assert_eq!(parsed, vec!["hello", "what is this?"]);
        assert!(parse_conversation_starters("").is_empty());
    }

    #[test]
    fn test_persona_keeps_unknown_fields() {
        let json = r#"{
            "id": 9,
            "name": "Grandma",
            "system_prompt": "be kind",
            "is_public": true,
            "owner_id": 1,
            "created_at": "2024-01-01T00:00:00"
        }"#;
        let persona: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(persona.extra.get("owner_id"), Some(&Value::from(1)));
        assert!(persona.starters().is_empty());

        let back = serde_json::to_value(&persona).unwrap();
        assert_eq!(back["created_at"], "2024-01-01T00:00:00");
        assert_eq!(back["name"], "Grandma");
    }

    #[test]
    fn test_starters_text() {
        let persona: Persona = serde_json::from_str(
            r#"{"id": 1, "name": "x", "conversation_starters": ["a", "b"]}"#,
        )
        .unwrap();
        assert_eq!(persona.starters_text(), "a\nb");
    }
}
