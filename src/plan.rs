//! Plan computation for managed resources.
//!
//! Planning fills in schema defaults for attributes the configuration left
//! null, takes computed-only attributes (the resource id) from the prior
//! state, and diffs the result against that state.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Compute the plan for one resource instance.
///
/// `prior` is `None` when the resource is being created. A null `proposed`
/// state plans a destroy.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        return Ok(plan_destroy(prior));
    }

    let Value::Object(proposed) = proposed else {
        return Err(ProviderError::InvalidRequest(
            "proposed state must be an object".to_string(),
        ));
    };
    let prior_obj = match prior {
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(ProviderError::InvalidRequest(
                "prior state must be an object".to_string(),
            ))
        },
        None => None,
    };

    let mut planned = proposed.clone();
    for (name, attr) in &schema.block.attributes {
        // Computed-only values come from prior state, whatever was proposed.
        if attr.flags.is_computed_only() {
            match prior_obj.and_then(|p| non_null(p.get(name))) {
                Some(value) => planned.insert(name.clone(), value.clone()),
                None => planned.remove(name),
            };
            continue;
        }
        if !is_null(planned.get(name)) {
            continue;
        }
        if attr.flags.optional && attr.flags.computed {
            if let Some(default) = &attr.default {
                planned.insert(name.clone(), default.clone());
                continue;
            }
        }
        if attr.use_state_for_unknown {
            if let Some(value) = prior_obj.and_then(|p| p.get(name)).filter(|v| !v.is_null()) {
                planned.insert(name.clone(), value.clone());
            }
        }
    }

    let empty = Map::new();
    let before = prior_obj.unwrap_or(&empty);

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in schema_keys(schema) {
        let change = match (non_null(before.get(&name)), non_null(planned.get(&name))) {
            (None, None) => None,
            (None, Some(after)) => Some(AttributeChange::added(name.clone(), after.clone())),
            (Some(old), None) => Some(AttributeChange::removed(name.clone(), old.clone())),
            (Some(old), Some(new)) if old != new => Some(AttributeChange::modified(
                name.clone(),
                old.clone(),
                new.clone(),
            )),
            _ => None,
        };

        if let Some(change) = change {
            let force_new = schema.attribute(&name).is_some_and(|a| a.force_new);
            if force_new && prior_obj.is_some() {
                requires_replace = true;
            }
            changes.push(change);
        }
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_destroy(prior: Option<&Value>) -> PlanResult {
    let changes = match prior {
        Some(Value::Object(map)) => {
            let mut names: Vec<_> = map.keys().collect();
            names.sort();
            names
                .into_iter()
                .filter_map(|name| {
                    non_null(map.get(name)).map(|v| AttributeChange::removed(name.clone(), v.clone()))
                })
                .collect()
        },
        _ => Vec::new(),
    };
    PlanResult::with_changes(Value::Null, changes, false)
}

/// Attribute and nested block names, sorted so change lists are stable.
fn schema_keys(schema: &Schema) -> Vec<String> {
    let mut keys: Vec<String> = schema
        .block
        .attributes
        .keys()
        .chain(schema.block.blocks.keys())
        .cloned()
        .collect();
    keys.sort();
    keys
}

fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}
