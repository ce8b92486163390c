//! Sanity mutation API client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::SecretToken;
use crate::error::WriteError;
use crate::models::PatchOperations;
use crate::store::{ContentStore, NewDocument};

// Mutate API response: one result per mutation in the transaction
#[derive(Deserialize, Debug)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Deserialize, Debug)]
struct MutateResult {
    id: String,
}

pub struct SanityClient {
    client: reqwest::Client,
    mutate_url: String,
    token: SecretToken,
}

impl SanityClient {
    pub fn new(
        client: reqwest::Client,
        api_host: &str,
        api_version: &str,
        dataset: &str,
        token: SecretToken,
    ) -> Self {
        let version = api_version.trim_start_matches('v');
        let mutate_url = format!(
            "{}/v{version}/data/mutate/{dataset}?returnIds=true",
            api_host.trim_end_matches('/')
        );

        Self {
            client,
            mutate_url,
            token,
        }
    }

    pub fn default_api_host(project_id: &str) -> String {
        format!("https://{project_id}.api.sanity.io")
    }

    #[cfg(test)]
    pub fn mutate_url(&self) -> &str {
        &self.mutate_url
    }

    // Sends a single-mutation transaction and returns the first affected id
    async fn mutate(&self, mutation: Value) -> Result<Option<String>, WriteError> {
        let response = self
            .client
            .post(&self.mutate_url)
            .bearer_auth(self.token.expose())
            .json(&json!({ "mutations": [mutation] }))
            .send()
            .await
            .map_err(|e| WriteError::StoreUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(512).collect();
            return Err(WriteError::StoreUnavailable(format!(
                "sanity responded {status}: {body}"
            )));
        }

        let body = response
            .json::<MutateResponse>()
            .await
            .map_err(|e| WriteError::StoreUnavailable(format!("parse error: {e}")))?;

        Ok(body.results.into_iter().next().map(|result| result.id))
    }
}

pub fn create_mutation(document: &NewDocument) -> Value {
    if document.id.is_some() {
        json!({ "createIfNotExists": document.to_json() })
    } else {
        json!({ "create": document.to_json() })
    }
}

pub fn patch_mutation(document_id: &str, operations: &PatchOperations) -> Value {
    let mut patch = serde_json::Map::new();
    patch.insert("id".to_owned(), Value::String(document_id.to_owned()));
    if !operations.inc.is_empty() {
        patch.insert("inc".to_owned(), json!(operations.inc));
    }
    if !operations.set.is_empty() {
        patch.insert("set".to_owned(), Value::Object(operations.set.clone()));
    }
    json!({ "patch": patch })
}

#[async_trait]
impl ContentStore for SanityClient {
    async fn create(&self, document: NewDocument) -> Result<String, WriteError> {
        let returned = self.mutate(create_mutation(&document)).await?;

        // createIfNotExists on an existing id reports no result
        returned.or(document.id).ok_or_else(|| {
            WriteError::StoreUnavailable("create returned no document id".to_owned())
        })
    }

    async fn patch(
        &self,
        document_id: &str,
        operations: &PatchOperations,
    ) -> Result<String, WriteError> {
        let returned = self.mutate(patch_mutation(document_id, operations)).await?;
        Ok(returned.unwrap_or_else(|| document_id.to_owned()))
    }
}
