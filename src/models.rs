use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::error::WriteError;

// Document types the proxy is allowed to create
pub const ALLOWED_DOCUMENT_TYPES: [&str; 4] = [
    "calculatorResult",
    "booking",
    "quizResult",
    "newsletterSubscriber",
];

pub fn is_allowed_document_type(document_type: &str) -> bool {
    ALLOWED_DOCUMENT_TYPES.contains(&document_type)
}

// Write request body as posted by the site
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequestBody {
    #[serde(rename = "_type")]
    pub document_type: Option<String>,
    pub data: Option<Map<String, Value>>,
    pub action: Option<String>,
    pub document_id: Option<String>,
    pub operations: Option<OperationsBody>,
}

#[derive(Deserialize, Debug, Default)]
pub struct OperationsBody {
    pub inc: Option<BTreeMap<String, Number>>,
    pub set: Option<Map<String, Value>>,
}

/// Field level changes applied to one document in a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchOperations {
    pub inc: BTreeMap<String, Number>,
    pub set: Map<String, Value>,
}

impl PatchOperations {
    pub fn is_empty(&self) -> bool {
        self.inc.is_empty() && self.set.is_empty()
    }
}

/// A validated mutation, ready to hand to the content store.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    Create {
        document_type: String,
        fields: Map<String, Value>,
    },
    Patch {
        document_id: String,
        operations: PatchOperations,
    },
}

impl MutationRequest {
    pub fn action(&self) -> &'static str {
        match self {
            MutationRequest::Create { .. } => "create",
            MutationRequest::Patch { .. } => "patch",
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self, WriteError> {
        let raw: WriteRequestBody =
            serde_json::from_slice(body).map_err(|_| WriteError::InvalidBody)?;
        Self::try_from(raw)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<WriteRequestBody> for MutationRequest {
    type Error = WriteError;

    fn try_from(body: WriteRequestBody) -> Result<Self, Self::Error> {
        match body.action.as_deref().unwrap_or("create") {
            "create" => {
                let (Some(document_type), Some(fields)) =
                    (non_blank(body.document_type), body.data)
                else {
                    return Err(WriteError::MissingRequiredFields);
                };

                if !is_allowed_document_type(&document_type) {
                    return Err(WriteError::InvalidDocumentType);
                }

                Ok(MutationRequest::Create {
                    document_type,
                    fields,
                })
            }
            "patch" => {
                let (Some(document_id), Some(ops)) =
                    (non_blank(body.document_id), body.operations)
                else {
                    return Err(WriteError::MissingRequiredFields);
                };

                let operations = PatchOperations {
                    inc: ops.inc.unwrap_or_default(),
                    set: ops.set.unwrap_or_default(),
                };
                if operations.is_empty() {
                    return Err(WriteError::MissingRequiredFields);
                }

                Ok(MutationRequest::Patch {
                    document_id,
                    operations,
                })
            }
            _ => Err(WriteError::InvalidAction),
        }
    }
}

// Success body
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub success: bool,
    pub id: String,
}

impl WriteResponse {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: id.into(),
        }
    }
}
