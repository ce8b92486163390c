use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::{Json, extract::State};
use std::sync::Arc;
use std::time::Instant;

use crate::client::ClientKey;
use crate::error::WriteError;
use crate::idempotency::{IDEMPOTENCY_HEADER, document_id_for_key};
use crate::metrics::{RATE_LIMITED_TOTAL, REJECTED_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL, STORE_FAILURES};
use crate::models::{MutationRequest, WriteResponse};
use crate::state::AppState;
use crate::store::NewDocument;

// Admission pipeline: rate check, validate, mutate
async fn process(
    state: &AppState,
    client: &ClientKey,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WriteResponse, WriteError> {
    if !state.rate_limiter.check_and_increment(client.as_str()).await? {
        return Err(WriteError::RateLimitExceeded);
    }

    let request = MutationRequest::parse(body)?;
    let action = request.action();

    let id = match request {
        MutationRequest::Create {
            document_type,
            fields,
        } => {
            let idempotency_key = headers
                .get(IDEMPOTENCY_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|key| !key.is_empty());

            let mut document = NewDocument::new(document_type, fields);
            if let Some(key) = idempotency_key {
                let id = document_id_for_key(&document.document_type, key);
                document = document.with_id(id);
            }
            state.store.create(document).await?
        }
        MutationRequest::Patch {
            document_id,
            operations,
        } => state.store.patch(&document_id, &operations).await?,
    };

    tracing::info!(client = client.as_str(), action, %id, "document written");
    Ok(WriteResponse::ok(id))
}

pub async fn write_handler(
    State(state): State<Arc<AppState>>,
    client: ClientKey,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WriteResponse>, WriteError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let result = process(&state, &client, &headers, &body).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match &result {
        Ok(_) => {}
        Err(WriteError::RateLimitExceeded) => {
            RATE_LIMITED_TOTAL.inc();
            tracing::warn!(client = client.as_str(), "rate limit exceeded");
        }
        Err(WriteError::StoreUnavailable(_)) => STORE_FAILURES.inc(),
        Err(WriteError::InvalidDocumentType) => {
            REJECTED_TOTAL.inc();
            tracing::warn!(client = client.as_str(), "create rejected: document type not allowed");
        }
        Err(e) => {
            REJECTED_TOTAL.inc();
            tracing::info!(client = client.as_str(), reason = %e, "write rejected");
        }
    }

    result.map(Json)
}
