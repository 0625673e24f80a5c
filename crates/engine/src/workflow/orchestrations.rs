//! Built-in orchestrating workflows composed from proxies, fan-out, and dispatch.
//!
//! These functions are workflow code: they perform no I/O themselves and reach the outside world
//! only through activity proxies.

use docflow_types::{ClassifiedError, ErrorKind, ExecutionPayload, Params, require_var};
use serde_json::{Value, json};
use tracing::info;

use super::{
    dispatch::{ActivitySelector, Candidate, ConditionalDispatcher, Predicate},
    fanout::join_all_or_nothing,
};
use crate::{
    error::{EngineError, WorkflowFailure},
    executor::ActivityProxies,
};

pub const NOTIFY_WEBHOOKS: &str = "notify_webhooks";
pub const RECALCULATE_EMBEDDINGS: &str = "recalculate_embeddings";
pub const EXTRACT_CONTENT: &str = "extract_content";

/// Activity delivering one webhook call.
pub const NOTIFY_WEBHOOK_ACTIVITY: &str = "notify_webhook";
/// Activity generating embeddings of one type.
pub const GENERATE_EMBEDDINGS_ACTIVITY: &str = "generate_embeddings";
/// Activity reporting an object's media type.
pub const RESOLVE_CONTENT_TYPE_ACTIVITY: &str = "resolve_content_type";

/// Workflow variable switching PDF extraction to the vision model.
pub const USE_VISION_VAR: &str = "use_vision";

const DEFAULT_WEBHOOK_METHOD: &str = "POST";

/// Call every webhook listed in the `webhooks` variable in parallel.
///
/// Entries are either a URL string or `{ url, method }`. Each call receives
/// `{ webhook, method, payload }`, where `payload` summarizes the triggering event. The fan-out
/// is all-or-nothing: the first failing endpoint fails the workflow.
pub async fn notify_webhooks(proxies: &ActivityProxies, payload: &ExecutionPayload) -> Result<Vec<Value>, WorkflowFailure> {
    let webhooks = require_var(&payload.vars, "webhooks")
        .and_then(parse_webhooks)
        .map_err(|error| WorkflowFailure::rejected(NOTIFY_WEBHOOKS, error))?;
    let proxy = proxies.require(NOTIFY_WEBHOOK_ACTIVITY)?;
    let body = json!({
        "event": payload.event,
        "objectIds": payload.object_ids,
        "account_id": payload.account_id,
        "project_id": payload.project_id,
    });
    info!(workflow = NOTIFY_WEBHOOKS, endpoint_count = webhooks.len(), "notifying webhooks");

    let calls = webhooks.into_iter().enumerate().map(|(index, (url, method))| {
        let mut params = Params::new();
        params.insert("webhook".into(), Value::String(url));
        params.insert("method".into(), Value::String(method));
        params.insert("payload".into(), body.clone());
        async move {
            proxy
                .call_in(NOTIFY_WEBHOOKS, payload, params)
                .await
                .map_err(|failure| WorkflowFailure::activity(NOTIFY_WEBHOOKS, index, NOTIFY_WEBHOOK_ACTIVITY, failure))
        }
    });
    join_all_or_nothing(calls).await
}

fn parse_webhooks(value: &Value) -> Result<Vec<(String, String)>, ClassifiedError> {
    let invalid = |reason: &str| {
        ClassifiedError::new(ErrorKind::ActivityParamInvalid, format!("invalid 'webhooks' variable: {}", reason))
            .with_field("param", "webhooks")
    };
    let entries = value.as_array().ok_or_else(|| invalid("expected an array"))?;
    entries
        .iter()
        .map(|entry| match entry {
            Value::String(url) => Ok((url.clone(), DEFAULT_WEBHOOK_METHOD.to_string())),
            Value::Object(map) => {
                let url = map.get("url").and_then(Value::as_str).ok_or_else(|| invalid("entry is missing 'url'"))?;
                let method = map.get("method").and_then(Value::as_str).unwrap_or(DEFAULT_WEBHOOK_METHOD);
                Ok((url.to_string(), method.to_uppercase()))
            }
            _ => Err(invalid("entries must be URLs or { url, method } objects")),
        })
        .collect()
}

/// Regenerate embeddings for every type in the `embedding_types` variable, in parallel.
pub async fn recalculate_embeddings(proxies: &ActivityProxies, payload: &ExecutionPayload) -> Result<Vec<Value>, WorkflowFailure> {
    let types = require_var(&payload.vars, "embedding_types")
        .and_then(|value| {
            value
                .as_array()
                .map(|entries| entries.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>())
                .filter(|types| !types.is_empty())
                .ok_or_else(|| {
                    ClassifiedError::new(ErrorKind::ActivityParamInvalid, "'embedding_types' must be a non-empty array of strings")
                        .with_field("param", "embedding_types")
                })
        })
        .map_err(|error| WorkflowFailure::rejected(RECALCULATE_EMBEDDINGS, error))?;
    let proxy = proxies.require(GENERATE_EMBEDDINGS_ACTIVITY)?;
    info!(workflow = RECALCULATE_EMBEDDINGS, type_count = types.len(), "recalculating embeddings");

    let calls = types.into_iter().enumerate().map(|(index, embedding_type)| {
        let mut params = Params::new();
        params.insert("type".into(), Value::String(embedding_type));
        async move {
            proxy
                .call_in(RECALCULATE_EMBEDDINGS, payload, params)
                .await
                .map_err(|failure| WorkflowFailure::activity(RECALCULATE_EMBEDDINGS, index, GENERATE_EMBEDDINGS_ACTIVITY, failure))
        }
    });
    join_all_or_nothing(calls).await
}

/// Dispatcher used by [`extract_content`].
///
/// - `application/pdf`: `convert_pdf_to_text`, or `extract_pdf_with_vision` when `use_vision` is set
/// - `audio/*`, `video/*`: `transcribe_media`
/// - anything else: `extract_text`
pub fn content_extraction_dispatcher() -> Result<ConditionalDispatcher, EngineError> {
    ConditionalDispatcher::new(
        EXTRACT_CONTENT,
        vec![
            Candidate::new(
                Predicate::pattern(r"^application/pdf$")?,
                ActivitySelector::Override {
                    var: USE_VISION_VAR.into(),
                    when_set: "extract_pdf_with_vision".into(),
                    otherwise: "convert_pdf_to_text".into(),
                },
            ),
            Candidate::new(Predicate::pattern(r"^(audio|video)/")?, ActivitySelector::fixed("transcribe_media")),
            Candidate::fallback(ActivitySelector::fixed("extract_text")),
        ],
    )
}

/// Extract content from every target object, choosing the activity by media type.
///
/// Each object's media type comes from the `resolve_content_type` activity, which returns a
/// string or `null`. Objects are processed in parallel; the first failure fails the workflow.
pub async fn extract_content(proxies: &ActivityProxies, payload: &ExecutionPayload) -> Result<Vec<Value>, WorkflowFailure> {
    let dispatcher = content_extraction_dispatcher()?;
    dispatcher.validate(proxies)?;
    let resolver = proxies.require(RESOLVE_CONTENT_TYPE_ACTIVITY)?;
    if payload.object_ids.is_empty() {
        return Err(WorkflowFailure::rejected(
            EXTRACT_CONTENT,
            ClassifiedError::document_not_found::<&str>(&[], "no target objects supplied"),
        ));
    }
    info!(workflow = EXTRACT_CONTENT, object_count = payload.object_ids.len(), "extracting content");

    let dispatcher = &dispatcher;
    let calls = payload.object_ids.iter().enumerate().map(|(index, object_id)| async move {
        let mut params = Params::new();
        params.insert("object_id".into(), Value::String(object_id.clone()));
        let content_type = resolver
            .call_in(EXTRACT_CONTENT, payload, params.clone())
            .await
            .map_err(|failure| WorkflowFailure::activity(EXTRACT_CONTENT, index, RESOLVE_CONTENT_TYPE_ACTIVITY, failure))?;
        let content_type = match &content_type {
            Value::String(content_type) => Some(content_type.as_str()),
            Value::Null => None,
            other => {
                let error = ClassifiedError::activity_param_invalid(
                    RESOLVE_CONTENT_TYPE_ACTIVITY,
                    "content_type",
                    format!("expected a media type string or null, got {}", other),
                );
                return Err(WorkflowFailure::activity(EXTRACT_CONTENT, index, RESOLVE_CONTENT_TYPE_ACTIVITY, error.into()));
            }
        };
        dispatcher.dispatch(proxies, payload, index, content_type, params).await
    });
    join_all_or_nothing(calls).await
}
