//! Conversations between users and personas, and their messages.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{ConversationId, MessageId, PhishingCaseId, UserId};
use super::persona::Persona;

/// Korea Standard Time, UTC+9.
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// The user side of a conversation, as embedded in the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A conversation from `GET /admin/conversations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user: ConversationUser,
    pub persona: Persona,
    #[serde(default)]
    pub applied_phishing_case_id: Option<PhishingCaseId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
}

impl Conversation {
    /// Case-insensitive substring match over the user's email and the
    /// persona's name. `needle` must already be lowercased.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.user
            .email
            .as_deref()
            .is_some_and(|email| email.to_lowercase().contains(needle))
            || self.persona.name.to_lowercase().contains(needle)
    }

    /// Scenario ID shown in the listing, 0 when none was applied.
    #[must_use]
    pub fn scenario_id(&self) -> i64 {
        self.applied_phishing_case_id
            .map_or(0, |id| id.as_i64())
    }

    /// Last message time in KST, or `N/A`.
    #[must_use]
    pub fn last_message_kst(&self) -> String {
        format_kst(self.last_message_at.as_deref())
    }
}

/// Response of the admin creation endpoints; only the new ID is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CreatedConversation {
    pub id: ConversationId,
}

/// Who sent a message.
///
/// Unknown values from the backend are treated as [`SenderType::System`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SenderType {
    #[default]
    User,
    Ai,
    System,
}

impl From<String> for SenderType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Self::User,
            "ai" => Self::Ai,
            _ => Self::System,
        }
    }
}

impl SenderType {
    /// Avatar shown next to a message.
    #[must_use]
    pub const fn avatar(self) -> &'static str {
        match self {
            Self::User => "👤",
            Self::Ai => "🤖",
            Self::System => "⚙️",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(default)]
    pub sender_type: SenderType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_key: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Every field except `content` and `image_key`, for the details panel.
    #[must_use]
    pub fn details(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("id".to_owned(), Value::from(self.id.as_i64()));
        map.insert(
            "sender_type".to_owned(),
            Value::from(self.sender_type.as_str()),
        );
        if let Some(created_at) = &self.created_at {
            map.insert("created_at".to_owned(), Value::from(created_at.as_str()));
        }
        Value::Object(map)
    }

    /// Text content when it is non-empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}

/// Response of `POST /conversations/{id}/messages/`.
///
/// The whole body is kept so that it can be shown verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub suggested_user_questions: Option<Vec<String>>,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl SendMessageResponse {
    /// Suggested follow-up questions, empty when none were returned.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        self.suggested_user_questions.as_deref().unwrap_or_default()
    }
}

/// Format a backend timestamp in KST as `YYYY-MM-DD HH:MM:SS`.
///
/// Timestamps without an offset are taken to be UTC. Missing or unparsable
/// values yield `N/A`.
///
/// ```
/// use mung_core::format_kst;
///
/// assert_eq!(format_kst(Some("2024-05-01T15:30:00")), "2024-05-02 00:30:00");
/// assert_eq!(format_kst(Some("garbage")), "N/A");
/// assert_eq!(format_kst(None), "N/A");
/// ```
#[must_use]
pub fn format_kst(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(parse_utc)
        .zip(FixedOffset::east_opt(KST_OFFSET_SECS))
        .map_or_else(
            || "N/A".to_owned(),
            |(utc, kst)| {
                utc.with_timezone(&kst)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        )
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
