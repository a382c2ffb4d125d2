//! Request and response messages exchanged with the document manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a document within a space.
pub type DocumentId = String;

/// Request for documents changed after a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeedRequest {
    pub space: String,
    /// Only documents with an id greater than this are returned.
    pub after_document: DocumentId,
    /// Only documents updated at or after this instant are returned.
    pub from_time: DateTime<Utc>,
    /// Maximum number of references to return.
    pub limit: u32,
}

/// Minimal change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    pub id: DocumentId,
    pub updated_at: DateTime<Utc>,
}

/// Change-feed response, ordered as produced by the index query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeedResult {
    pub space: String,
    pub updates: Vec<DocumentReference>,
}

impl ChangeFeedResult {
    /// An empty result for `space`.
    pub fn empty(space: impl Into<String>) -> Self {
        Self {
            space: space.into(),
            updates: Vec::new(),
        }
    }
}

/// Request for full document payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFetchRequest {
    pub space: String,
    /// Requested ids. May contain duplicates and ids that do not exist.
    pub wanted: Vec<DocumentId>,
}

/// Full document record.
///
/// `alive == false` marks a deleted document that should be dropped from the
/// index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub text: String,
    pub alive: bool,
}

/// Document fetch response. Unknown ids are absent, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFetchResult {
    pub space: String,
    pub documents: Vec<Document>,
}

impl DocumentFetchResult {
    /// An empty result for `space`.
    pub fn empty(space: impl Into<String>) -> Self {
        Self {
            space: space.into(),
            documents: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_change_feed_request_uses_camel_case() {
        let request = ChangeFeedRequest {
            space: "docs".to_string(),
            after_document: "a".to_string(),
            from_time: Utc.timestamp_nanos(0),
            limit: 5,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["afterDocument"], "a");
        assert_eq!(json["limit"], 5);
        assert!(json.get("fromTime").is_some());
    }

    #[test]
    fn test_empty_results_carry_space() {
        assert_eq!(ChangeFeedResult::empty("docs").space, "docs");
        assert!(ChangeFeedResult::empty("docs").updates.is_empty());
        assert!(DocumentFetchResult::empty("docs").documents.is_empty());
    }
}
