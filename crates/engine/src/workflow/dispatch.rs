//! Content-based activity selection.
//!
//! A [`ConditionalDispatcher`] holds an ordered list of candidates. The first candidate whose
//! predicate matches the runtime attribute wins, so more specific patterns must come first. The
//! last candidate must match anything; a dispatcher without one cannot be built.

use docflow_types::{ExecutionPayload, Params, Vars};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{EngineError, WorkflowFailure},
    executor::ActivityProxies,
};

#[derive(Debug, Clone)]
pub enum Predicate {
    /// Matches every attribute, including a missing one.
    Any,
    Matches(Regex),
}

impl Predicate {
    pub fn pattern(pattern: &str) -> Result<Self, EngineError> {
        Regex::new(pattern).map(Predicate::Matches).map_err(|error| EngineError::InvalidPattern {
            pattern: pattern.to_string(),
            message: error.to_string(),
        })
    }

    pub fn matches(&self, attribute: Option<&str>) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Matches(regex) => attribute.is_some_and(|attribute| regex.is_match(attribute)),
        }
    }
}

/// Picks the activity name for a matched candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivitySelector {
    Fixed(String),
    /// Chooses `when_set` if the workflow variable `var` is truthy, else `otherwise`.
    Override { var: String, when_set: String, otherwise: String },
}

impl ActivitySelector {
    pub fn fixed(name: impl Into<String>) -> Self {
        ActivitySelector::Fixed(name.into())
    }

    pub fn select(&self, vars: &Vars) -> &str {
        match self {
            ActivitySelector::Fixed(name) => name,
            ActivitySelector::Override { var, when_set, otherwise } => {
                if vars.get(var).is_some_and(is_truthy) {
                    when_set
                } else {
                    otherwise
                }
            }
        }
    }

    fn names(&self) -> Vec<&str> {
        match self {
            ActivitySelector::Fixed(name) => vec![name.as_str()],
            ActivitySelector::Override { when_set, otherwise, .. } => vec![when_set.as_str(), otherwise.as_str()],
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty() && text != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub predicate: Predicate,
    pub selector: ActivitySelector,
    /// Static parameters; they win over call-site parameters of the same name.
    pub params: Params,
}

impl Candidate {
    pub fn new(predicate: Predicate, selector: ActivitySelector) -> Self {
        Self {
            predicate,
            selector,
            params: Params::new(),
        }
    }

    pub fn fallback(selector: ActivitySelector) -> Self {
        Self::new(Predicate::Any, selector)
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Result of [`ConditionalDispatcher::select`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub index: usize,
    pub activity: &'a str,
    pub params: &'a Params,
}

#[derive(Debug, Clone)]
pub struct ConditionalDispatcher {
    name: String,
    candidates: Vec<Candidate>,
}

impl ConditionalDispatcher {
    /// Build a dispatcher; fails unless the last candidate matches anything.
    pub fn new(name: impl Into<String>, candidates: Vec<Candidate>) -> Result<Self, EngineError> {
        let name = name.into();
        match candidates.last() {
            Some(Candidate {
                predicate: Predicate::Any, ..
            }) => Ok(Self { name, candidates }),
            _ => Err(EngineError::MissingFallback(name)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every activity name any candidate can select.
    pub fn activity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.candidates.iter().flat_map(|candidate| candidate.selector.names()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Confirm every selectable activity is bound in `proxies`.
    pub fn validate(&self, proxies: &ActivityProxies) -> Result<(), EngineError> {
        match self.activity_names().into_iter().find(|name| !proxies.contains(name)) {
            Some(name) => Err(EngineError::UnknownActivity(name.to_string())),
            None => Ok(()),
        }
    }

    pub fn select(&self, attribute: Option<&str>, vars: &Vars) -> Selection<'_> {
        let (index, candidate) = self
            .candidates
            .iter()
            .enumerate()
            .find(|(_, candidate)| candidate.predicate.matches(attribute))
            .unwrap_or_else(|| (self.candidates.len() - 1, &self.candidates[self.candidates.len() - 1]));
        let activity = candidate.selector.select(vars);
        debug!(dispatcher = %self.name, attribute = ?attribute, candidate = index, activity, "dispatcher selected activity");
        Selection {
            index,
            activity,
            params: &candidate.params,
        }
    }

    /// Select a candidate for `attribute` and invoke it with `params` plus the candidate's static
    /// parameters.
    ///
    /// `step` is the caller's index for the dispatched item and is what a failure reports.
    pub async fn dispatch(
        &self,
        proxies: &ActivityProxies,
        payload: &ExecutionPayload,
        step: usize,
        attribute: Option<&str>,
        mut params: Params,
    ) -> Result<Value, WorkflowFailure> {
        let selection = self.select(attribute, &payload.vars);
        let proxy = proxies.require(selection.activity)?;
        for (key, value) in selection.params {
            params.insert(key.clone(), value.clone());
        }
        proxy
            .call_in(&self.name, payload, params)
            .await
            .map_err(|failure| WorkflowFailure::activity(&self.name, step, selection.activity, failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media_dispatcher() -> ConditionalDispatcher {
        ConditionalDispatcher::new(
            "media",
            vec![
                Candidate::new(Predicate::pattern("^application/pdf$").expect("regex"), ActivitySelector::fixed("a")),
                Candidate::new(Predicate::pattern("^(audio|video)/").expect("regex"), ActivitySelector::fixed("b")),
                Candidate::fallback(ActivitySelector::fixed("c")),
            ],
        )
        .expect("dispatcher")
    }

    #[test]
    fn first_matching_candidate_wins() {
        let dispatcher = media_dispatcher();
        let vars = Vars::new();
        assert_eq!(dispatcher.select(Some("application/pdf"), &vars).activity, "a");
        assert_eq!(dispatcher.select(Some("audio/mpeg"), &vars).activity, "b");
        assert_eq!(dispatcher.select(Some("video/mp4"), &vars).activity, "b");
        assert_eq!(dispatcher.select(Some("text/plain"), &vars).activity, "c");
        assert_eq!(dispatcher.select(None, &vars).activity, "c");
    }

    #[test]
    fn reordering_changes_the_winner_for_overlapping_patterns() {
        let broad_first = ConditionalDispatcher::new(
            "broad",
            vec![
                Candidate::new(Predicate::pattern("^application/").expect("regex"), ActivitySelector::fixed("generic")),
                Candidate::new(Predicate::pattern("^application/pdf$").expect("regex"), ActivitySelector::fixed("pdf")),
                Candidate::fallback(ActivitySelector::fixed("other")),
            ],
        )
        .expect("dispatcher");
        let narrow_first = ConditionalDispatcher::new(
            "narrow",
            vec![
                Candidate::new(Predicate::pattern("^application/pdf$").expect("regex"), ActivitySelector::fixed("pdf")),
                Candidate::new(Predicate::pattern("^application/").expect("regex"), ActivitySelector::fixed("generic")),
                Candidate::fallback(ActivitySelector::fixed("other")),
            ],
        )
        .expect("dispatcher");
        let vars = Vars::new();
        assert_eq!(broad_first.select(Some("application/pdf"), &vars).activity, "generic");
        assert_eq!(narrow_first.select(Some("application/pdf"), &vars).activity, "pdf");
    }

    #[test]
    fn missing_fallback_is_rejected() {
        let error = ConditionalDispatcher::new(
            "strict",
            vec![Candidate::new(Predicate::pattern("^image/").expect("regex"), ActivitySelector::fixed("a"))],
        )
        .expect_err("no fallback");
        assert_eq!(error, EngineError::MissingFallback("strict".into()));
        assert!(ConditionalDispatcher::new("empty", Vec::new()).is_err());
    }

    #[test]
    fn fallback_in_the_middle_is_not_enough() {
        let error = ConditionalDispatcher::new(
            "misordered",
            vec![
                Candidate::fallback(ActivitySelector::fixed("c")),
                Candidate::new(Predicate::pattern("^image/").expect("regex"), ActivitySelector::fixed("a")),
            ],
        )
        .expect_err("fallback not last");
        assert!(matches!(error, EngineError::MissingFallback(_)));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(matches!(Predicate::pattern("("), Err(EngineError::InvalidPattern { .. })));
    }

    #[test]
    fn override_variable_switches_selection() {
        let selector = ActivitySelector::Override {
            var: "use_vision".into(),
            when_set: "vision".into(),
            otherwise: "text".into(),
        };
        let mut vars = Vars::new();
        assert_eq!(selector.select(&vars), "text");
        vars.insert("use_vision".into(), json!(true));
        assert_eq!(selector.select(&vars), "vision");
        vars.insert("use_vision".into(), json!(false));
        assert_eq!(selector.select(&vars), "text");
        vars.insert("use_vision".into(), json!("false"));
        assert_eq!(selector.select(&vars), "text");
    }

    #[test]
    fn candidate_params_ride_along_with_the_selection() {
        let mut params = Params::new();
        params.insert("ocr".into(), json!(false));
        let dispatcher = ConditionalDispatcher::new(
            "with-params",
            vec![Candidate::fallback(ActivitySelector::fixed("extract_text")).with_params(params.clone())],
        )
        .expect("dispatcher");
        assert_eq!(dispatcher.select(Some("text/html"), &Vars::new()).params, &params);
        assert_eq!(dispatcher.activity_names(), vec!["extract_text"]);
    }
}
