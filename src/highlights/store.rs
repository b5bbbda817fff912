//! Highlight persistence
//!
//! The engine only consumes persistence through [`HighlightStore`]: fetch by
//! document, create, update presentation fields, delete. Any transport that
//! provides those four operations fits. [`InMemoryHighlightStore`] backs
//! tests and hosts without a server.
//!
//! Older clients stored highlights as notes, with the anchor JSON tucked
//! into a free-form `context` field; [`LegacyNote`] converts them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{HighlightAnchor, HighlightRecord, DEFAULT_HIGHLIGHT_COLOR};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHighlightRequest {
    pub document_id: String,
    pub anchor: HighlightAnchor,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_text: Option<String>,
}

/// Presentation fields a user can edit; the anchor is never rewritten
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHighlightRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_text: Option<String>,
}

impl UpdateHighlightRequest {
    /// Apply the patch to a record, stamping `updated_at`
    pub fn apply(&self, record: &mut HighlightRecord, updated_at: String) {
        if let Some(color) = &self.color {
            record.color = color.clone();
        }
        if let Some(opacity) = self.opacity {
            record.opacity = Some(opacity);
        }
        if let Some(note_text) = &self.note_text {
            record.note_text = Some(note_text.clone());
        }
        record.updated_at = updated_at;
    }
}

/// Persistence collaborator
pub trait HighlightStore {
    fn fetch_highlights(&self, document_id: &str, user_id: &str) -> Result<Vec<HighlightRecord>, StoreError>;

    fn create_highlight(&mut self, request: CreateHighlightRequest) -> Result<HighlightRecord, StoreError>;

    fn update_highlight(&mut self, id: &str, request: UpdateHighlightRequest) -> Result<HighlightRecord, StoreError>;

    fn delete_highlight(&mut self, id: &str) -> Result<(), StoreError>;
}

/// Process-local store, records kept in creation order
#[derive(Debug, Clone, Default)]
pub struct InMemoryHighlightStore {
    user_id: String,
    records: Vec<HighlightRecord>,
}

impl InMemoryHighlightStore {
    /// Store whose created records belong to `user_id`
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            records: Vec::new(),
        }
    }

    /// Store pre-filled with records
    pub fn with_records(user_id: &str, records: Vec<HighlightRecord>) -> Self {
        Self {
            user_id: user_id.to_string(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[HighlightRecord] {
        &self.records
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

impl HighlightStore for InMemoryHighlightStore {
    fn fetch_highlights(&self, document_id: &str, user_id: &str) -> Result<Vec<HighlightRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.document_id == document_id && record.user_id == user_id)
            .cloned()
            .collect())
    }

    fn create_highlight(&mut self, request: CreateHighlightRequest) -> Result<HighlightRecord, StoreError> {
        let now = now_rfc3339();
        let record = HighlightRecord {
            id: Uuid::new_v4().to_string(),
            document_id: request.document_id,
            user_id: self.user_id.clone(),
            anchor: request.anchor,
            color: request.color,
            opacity: request.opacity,
            note_text: request.note_text,
            created_at: now.clone(),
            updated_at: now,
            highlighted_text: None,
            highlight_color: None,
            context: None,
        };
        log::debug!("Created highlight {}", record.id);
        self.records.push(record.clone());
        Ok(record)
    }

    fn update_highlight(&mut self, id: &str, request: UpdateHighlightRequest) -> Result<HighlightRecord, StoreError> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        request.apply(record, now_rfc3339());
        Ok(record.clone())
    }

    fn delete_highlight(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        if self.records.len() == before {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}

/// Note shape written by older clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNote {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "documentId")]
    pub lecture_id: String,
    #[serde(default, alias = "userId")]
    pub student_id: String,
    #[serde(default)]
    pub highlighted_text: Option<String>,
    #[serde(default, alias = "color")]
    pub highlight_color: Option<String>,
    #[serde(default)]
    pub note_text: Option<String>,
    /// Anchor JSON for notes written by the highlight client, free text otherwise
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl LegacyNote {
    /// Note payload for a create request, with the anchor serialized into `context`
    pub fn from_request(request: &CreateHighlightRequest) -> Self {
        Self {
            id: String::new(),
            lecture_id: request.document_id.clone(),
            student_id: String::new(),
            highlighted_text: Some(request.anchor.text_quote.exact.clone()),
            highlight_color: Some(request.color.clone()),
            note_text: request.note_text.clone(),
            context: serde_json::to_string(&request.anchor).ok(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Note shape of a stored record
    pub fn from_record(record: &HighlightRecord) -> Self {
        Self {
            id: record.id.clone(),
            lecture_id: record.document_id.clone(),
            student_id: record.user_id.clone(),
            highlighted_text: Some(record.anchor.text_quote.exact.clone()),
            highlight_color: Some(record.color.clone()),
            note_text: record.note_text.clone(),
            context: serde_json::to_string(&record.anchor).ok(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    /// Anchor stored in `context`, or one synthesized from the highlighted text
    pub fn anchor(&self) -> HighlightAnchor {
        self.context
            .as_deref()
            .and_then(|context| serde_json::from_str::<serde_json::Value>(context).ok())
            .filter(|value| value.get("textQuote").is_some())
            .and_then(|value| serde_json::from_value::<HighlightAnchor>(value).ok())
            .unwrap_or_else(|| HighlightAnchor::from_quote(self.highlighted_text.as_deref().unwrap_or("")))
    }

    pub fn into_record(self) -> HighlightRecord {
        let anchor = self.anchor();
        HighlightRecord {
            id: self.id,
            document_id: self.lecture_id,
            user_id: self.student_id,
            anchor,
            color: self
                .highlight_color
                .clone()
                .unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_string()),
            opacity: None,
            note_text: self.note_text,
            created_at: self.created_at,
            updated_at: self.updated_at,
            highlighted_text: self.highlighted_text,
            highlight_color: self.highlight_color,
            context: self.context,
        }
    }
}

impl From<LegacyNote> for HighlightRecord {
    fn from(note: LegacyNote) -> Self {
        note.into_record()
    }
}
