//! Parameter import: merge workflow variables into an activity's declared parameters.

use docflow_types::{ActivitySpec, Params, Vars};
use tracing::trace;

/// Compute the effective parameters for one activity invocation.
///
/// Each `import` name is copied from `vars` into the result in order, unless `params` already
/// sets that key explicitly. Variables absent from `vars` are left absent; activities that need
/// them report `ActivityParamNotFoundError` themselves. Neither input is mutated.
pub fn resolve_params(spec: &ActivitySpec, vars: &Vars) -> Params {
    let mut effective = spec.params.clone();
    for name in &spec.import {
        if spec.params.contains_key(name) {
            continue;
        }
        match vars.get(name) {
            Some(value) => {
                effective.insert(name.clone(), value.clone());
            }
            None => trace!(activity = %spec.name, variable = %name, "imported variable is not set"),
        }
    }
    effective
}
