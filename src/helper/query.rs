//! Helpers that consult the companion store.

use super::parser::HelperDefinition;
use super::transform::{any_arg, write};
use super::types::{Operation, OperationResult};
use crate::error::BuildError;
use crate::query::QueryClient;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// `wdb_update/<query>/`: send the query and store whether the store
/// answered `ok` as a boolean at the destination.
///
/// The query is a literal or a reference to a string field. An absent,
/// non-string or empty reference fails without contacting the store; any
/// reply, including synthesized transport errors, succeeds.
///
/// The one exception after a reply: when the boolean cannot be written
/// because the destination path runs through a non-object value, the
/// operation fails and the event is left unchanged, like every other
/// write helper.
pub fn update(definition: &HelperDefinition, client: Arc<dyn QueryClient>) -> Result<Operation, BuildError> {
    let argument = any_arg(definition, 0)?.clone();
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |event: Value| {
        let request = match argument.resolve_str(&event) {
            Some(request) if !request.is_empty() => request.to_string(),
            _ => {
                let trace = format!("[{name}] query reference '{argument}' is empty or not found");
                return OperationResult::failure(event, trace);
            }
        };

        let response = client.query(&request);
        debug!(helper = %name, status = response.status(), "companion store replied");
        write(&name, &destination, event, Value::Bool(response.is_ok()))
    }))
}

/// `wdb_query/<query>/`: send the query and store the reply payload at the
/// destination. A reply other than `ok` writes nothing and fails.
pub fn query(definition: &HelperDefinition, client: Arc<dyn QueryClient>) -> Result<Operation, BuildError> {
    let argument = any_arg(definition, 0)?.clone();
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |event: Value| {
        let request = match argument.resolve_str(&event) {
            Some(request) if !request.is_empty() => request.to_string(),
            _ => {
                let trace = format!("[{name}] query reference '{argument}' is empty or not found");
                return OperationResult::failure(event, trace);
            }
        };

        let response = client.query(&request);
        if !response.is_ok() {
            let trace = format!("[{name}] store replied '{}'", response.raw());
            return OperationResult::failure(event, trace);
        }
        let payload = response.payload().unwrap_or_default().to_string();
        write(&name, &destination, event, Value::String(payload))
    }))
}
