//! Content store port.
//!
//! The proxy only ever creates and patches documents. Implementations hold
//! the write credentials; nothing here is visible to the caller.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::WriteError;
use crate::models::PatchOperations;

// System attributes owned by the store; callers may not set them through `data`.
const RESERVED_KEYS: [&str; 5] = ["_id", "_type", "_rev", "_createdAt", "_updatedAt"];

/// Document about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub document_type: String,
    pub fields: Map<String, Value>,
    pub created_at: String,
    /// Fixed id for idempotent creates; the store assigns one otherwise.
    pub id: Option<String>,
}

impl NewDocument {
    pub fn new(document_type: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            fields.remove(key);
        }

        Self {
            document_type: document_type.into(),
            fields,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Full document body as the store expects it.
    pub fn to_json(&self) -> Value {
        let mut body = self.fields.clone();
        if let Some(id) = &self.id {
            body.insert("_id".to_owned(), Value::String(id.clone()));
        }
        body.insert(
            "_type".to_owned(),
            Value::String(self.document_type.clone()),
        );
        body.insert(
            "createdAt".to_owned(),
            Value::String(self.created_at.clone()),
        );
        Value::Object(body)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Creates a document and returns its id.
    async fn create(&self, document: NewDocument) -> Result<String, WriteError>;

    /// Applies `operations` to `document_id` as one transaction and returns the id.
    async fn patch(
        &self,
        document_id: &str,
        operations: &PatchOperations,
    ) -> Result<String, WriteError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn reserved_keys_cannot_override_type_or_id() {
        let document = NewDocument::new(
            "booking",
            fields(json!({"_type": "siteSettings", "_id": "drafts.x", "name": "Ana"})),
        );
        let body = document.to_json();
        assert_eq!(body["_type"], "booking");
        assert!(body.get("_id").is_none());
        assert_eq!(body["name"], "Ana");
    }

    #[test]
    fn creation_timestamp_is_server_assigned() {
        let document = NewDocument::new("quizResult", fields(json!({"createdAt": "1999-01-01"})));
        let body = document.to_json();
        assert_ne!(body["createdAt"], "1999-01-01");
        assert!(chrono::DateTime::parse_from_rfc3339(&document.created_at).is_ok());
    }

    #[test]
    fn explicit_id_is_written() {
        let document = NewDocument::new("booking", Map::new()).with_id("booking-abc");
        assert_eq!(document.to_json()["_id"], "booking-abc");
    }
}
