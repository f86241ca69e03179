use std::{borrow::Cow, collections::BTreeMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{ValidateLength, ValidationError, ValidationErrors};

use crate::config::Config;

pub type NoteId = i64;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A note that has not been stored yet. `created_at` is fixed at construction.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Create form payload. A client-supplied `id` is not part of it and is dropped.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateNoteForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl From<CreateNoteForm> for NewNote {
    fn from(CreateNoteForm { title, content }: CreateNoteForm) -> Self {
        NewNote::new(title, content)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EditNoteForm {
    #[serde(default, deserialize_with = "note_id")]
    pub id: Option<NoteId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl From<&Note> for EditNoteForm {
    fn from(note: &Note) -> Self {
        Self {
            id: Some(note.id),
            title: note.title.clone(),
            content: note.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NoteIdQuery {
    #[serde(default, deserialize_with = "note_id")]
    pub id: Option<NoteId>,
}

/// An empty or non-numeric id names no note, so it reads as `None` and ends up as a 404.
fn note_id<'de, D>(deserializer: D) -> Result<Option<NoteId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| raw.trim().parse().ok()))
}

/// Length bounds for the two text fields. Each bound has its own message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteRules {
    pub title_max_length: u64,
    pub content_max_length: u64,
}

impl Default for NoteRules {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for NoteRules {
    fn from(config: &Config) -> Self {
        Self {
            title_max_length: config.title_max_length,
            content_max_length: config.content_max_length,
        }
    }
}

impl NoteRules {
    pub fn validate(&self, title: &str, content: &str) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(error) = check_field("Title", title, self.title_max_length) {
            errors.add("title", error);
        }
        if let Some(error) = check_field("Content", content, self.content_max_length) {
            errors.add("content", error);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_field(label: &str, value: &str, max: u64) -> Option<ValidationError> {
    if value.trim().is_empty() {
        return Some(field_error("required", format!("{label} is required")));
    }
    if !value.validate_length(None, Some(max), None) {
        return Some(field_error("length", format!("{label} cannot exceed {max} characters")));
    }
    None
}

fn field_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message));
    error
}

/// First message per field, in the shape the form templates read (`errors.title`).
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, String> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let message = errs.first()?.message.as_ref()?.to_string();
            Some((field.to_string(), message))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> NoteRules {
        NoteRules {
            title_max_length: 10,
            content_max_length: 20,
        }
    }

    #[test]
    fn accepts_values_within_bounds() {
        assert!(rules().validate("Groceries", "Milk, eggs, bread").is_ok());
        assert!(rules().validate("0123456789", "x").is_ok());
    }

    #[test]
    fn rejects_missing_fields() {
        let errors = rules().validate("", "   ").unwrap_err();
        let messages = field_messages(&errors);

        assert_eq!(messages["title"], "Title is required");
        assert_eq!(messages["content"], "Content is required");
    }

    #[test]
    fn bounds_and_messages_are_independent() {
        let errors = rules().validate("01234567890", "fits").unwrap_err();
        let messages = field_messages(&errors);
        assert_eq!(messages["title"], "Title cannot exceed 10 characters");
        assert!(!messages.contains_key("content"));

        let errors = rules().validate("ok", "this content is too long").unwrap_err();
        let messages = field_messages(&errors);
        assert_eq!(messages["content"], "Content cannot exceed 20 characters");
        assert!(!messages.contains_key("title"));
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert!(rules().validate("éééééééééé", "ok").is_ok());
    }

    #[test]
    fn empty_or_malformed_id_reads_as_none() {
        let query: NoteIdQuery = serde_urlencoded::from_str("id=").unwrap();
        assert_eq!(query.id, None);
        let query: NoteIdQuery = serde_urlencoded::from_str("id=abc").unwrap();
        assert_eq!(query.id, None);
        let query: NoteIdQuery = serde_urlencoded::from_str("").unwrap();
        assert_eq!(query.id, None);
        let query: NoteIdQuery = serde_urlencoded::from_str("id=7").unwrap();
        assert_eq!(query.id, Some(7));

        let form: EditNoteForm = serde_urlencoded::from_str("id=&title=a&content=b").unwrap();
        assert_eq!(form.id, None);
    }

    #[test]
    fn new_note_stamps_creation_time() {
        let before = Utc::now();
        let note = NewNote::from(CreateNoteForm {
            title: "a".into(),
            content: "b".into(),
        });
        assert!(note.created_at >= before);
        assert!(note.created_at <= Utc::now());
    }
}
