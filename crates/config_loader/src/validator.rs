//! Config validation
//!
//! Rules:
//! - field rules declared on the contract types (non-empty names, capacities >= 1)
//! - topic labels unique
//! - sink names unique
//! - ingress topic routed
//! - age_parity forward targets routed

use std::collections::HashSet;

use ::validator::Validate;
use contracts::{ContractError, RouterBlueprint};

/// Validate a RouterBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_topics(blueprint)?;
    validate_sink_names(blueprint)?;
    validate_ingress(blueprint)?;
    validate_forward_targets(blueprint)?;
    Ok(())
}

/// Per-field rules from the derive
fn validate_fields(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// Topic labels must be unique
fn validate_topics(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for route in &blueprint.routes {
        if !seen.insert(route.topic.as_str()) {
            return Err(ContractError::config_validation(
                format!("routes[topic={}]", route.topic),
                "duplicate topic",
            ));
        }
    }
    Ok(())
}

/// Sink names must be unique (outcomes and metrics are keyed by name)
fn validate_sink_names(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for route in &blueprint.routes {
        if !seen.insert(route.sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("routes[topic={}].sink.name", route.topic),
                format!("duplicate sink name '{}'", route.sink.name),
            ));
        }
    }
    Ok(())
}

fn validate_ingress(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    if blueprint.route(&blueprint.ingress_topic).is_none() {
        return Err(ContractError::config_validation(
            "ingress_topic",
            format!(
                "ingress topic '{}' has no route",
                blueprint.ingress_topic
            ),
        ));
    }
    Ok(())
}

fn validate_forward_targets(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    for (route, target) in blueprint.forward_targets() {
        if blueprint.route(&target).is_none() {
            return Err(ContractError::config_validation(
                format!("routes[topic={}].sink.params", route.topic),
                format!("forward target '{}' not found in routes", target),
            ));
        }
        if target == route.topic {
            return Err(ContractError::config_validation(
                format!("routes[topic={}].sink.params", route.topic),
                format!("forward target '{}' loops back to its own topic", target),
            ));
        }
    }
    Ok(())
}
