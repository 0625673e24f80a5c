//! Execution context validation.
//!
//! Activities that talk to the content store derive their client from the payload. The three
//! fields it needs are checked up front so a misconfigured trigger fails before any network call.

use docflow_api::{ClientSettings, ContentStoreClient};
use docflow_types::{ActivityFailure, ClassifiedError, ErrorKind, ExecutionPayload};

fn missing(field: &str) -> ClassifiedError {
    ClassifiedError::new(
        ErrorKind::ActivityParamNotFound,
        format!("missing required parameter '{}' in execution context", field),
    )
    .with_field("param", field)
}

fn present<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, ClassifiedError> {
    value
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| missing(field))
}

/// Derive content store settings: `server_url` from `config.studio_url`, `store_url` from
/// `config.store_url`, and `api_key` from `auth_token`.
pub fn client_settings(payload: &ExecutionPayload) -> Result<ClientSettings, ClassifiedError> {
    let api_key = present(payload.auth_token.as_ref(), "auth_token")?;
    let server_url = present(payload.config.studio_url.as_ref(), "config.studio_url")?;
    let store_url = present(payload.config.store_url.as_ref(), "config.store_url")?;
    Ok(ClientSettings {
        server_url: server_url.to_string(),
        store_url: store_url.to_string(),
        api_key: api_key.to_string(),
    })
}

/// Check the execution context without building a client.
pub fn validate_context(payload: &ExecutionPayload) -> Result<(), ClassifiedError> {
    client_settings(payload).map(|_| ())
}

/// Build a content store client for the payload's account.
pub fn content_store(payload: &ExecutionPayload) -> Result<ContentStoreClient, ActivityFailure> {
    let settings = client_settings(payload)?;
    Ok(ContentStoreClient::new(settings)?)
}
