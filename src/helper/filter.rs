//! Helpers that only inspect the event.

use super::parser::HelperDefinition;
use super::transform::any_arg;
use super::types::{Operation, OperationResult};
use crate::error::BuildError;
use crate::field::FieldPath;
use serde_json::Value;

/// `exists/`: succeeds when the destination field is present.
pub fn exists(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    presence(definition, true)
}

/// `not_exists/`: succeeds when the destination field is absent.
pub fn not_exists(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    presence(definition, false)
}

fn presence(definition: &HelperDefinition, expected: bool) -> Result<Operation, BuildError> {
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |event: Value| {
        if destination.exists(&event) == expected {
            OperationResult::success(event)
        } else if expected {
            let trace = format!("[{name}] field '{destination}' does not exist");
            OperationResult::failure(event, trace)
        } else {
            let trace = format!("[{name}] field '{destination}' exists");
            OperationResult::failure(event, trace)
        }
    }))
}

/// `s_eq/<value>/`: succeeds when the destination holds a string equal to the
/// argument. A reference argument must resolve to a string.
pub fn string_equal(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    let argument = any_arg(definition, 0)?.clone();
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |event: Value| {
        let matched = match (destination.resolve_str(&event), argument.resolve_str(&event)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        };
        if matched {
            OperationResult::success(event)
        } else {
            let trace = format!("[{name}] '{destination}' is not a string equal to '{argument}'");
            OperationResult::failure(event, trace)
        }
    }))
}

/// Succeeds when the destination equals `value`. Used for literal checks.
///
/// Comparison is strict: the number `4624` does not equal the string `"4624"`.
pub fn value_equal(destination: FieldPath, value: Value) -> Operation {
    let description = format!("{destination} == {value}");
    Operation::new("equal", description, move |event: Value| {
        if destination.resolve(&event) == Some(&value) {
            OperationResult::success(event)
        } else {
            let trace = format!("[equal] '{destination}' is not {value}");
            OperationResult::failure(event, trace)
        }
    })
}

/// Succeeds when both fields are present and equal.
pub fn reference_equal(destination: FieldPath, source: FieldPath) -> Operation {
    let description = format!("{destination} == ${source}");
    Operation::new("equal", description, move |event: Value| {
        match (destination.resolve(&event), source.resolve(&event)) {
            (Some(left), Some(right)) if left == right => OperationResult::success(event),
            _ => {
                let trace = format!("[equal] '{destination}' does not equal '{source}'");
                OperationResult::failure(event, trace)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(destination: &str, invocation: &str) -> HelperDefinition {
        HelperDefinition::parse(destination, invocation).unwrap()
    }

    #[test]
    fn test_exists_and_not_exists() {
        let exists = exists(&def("a.b", "+exists/")).unwrap();
        let not_exists = not_exists(&def("a.b", "+not_exists/")).unwrap();

        let present = json!({"a": {"b": null}});
        let absent = json!({"a": {}});
        assert!(exists.apply(present.clone()).is_success());
        assert!(exists.apply(absent.clone()).is_failure());
        assert!(not_exists.apply(present).is_failure());
        assert!(not_exists.apply(absent).is_success());
    }

    #[test]
    fn test_string_equal_literal() {
        let op = string_equal(&def("user", "+s_eq/root/")).unwrap();
        assert!(op.apply(json!({"user": "root"})).is_success());
        assert!(op.apply(json!({"user": "Root"})).is_failure());
        assert!(op.apply(json!({})).is_failure());
    }

    #[test]
    fn test_string_equal_reference() {
        let op = string_equal(&def("a", "+s_eq/$b/")).unwrap();
        assert!(op.apply(json!({"a": "x", "b": "x"})).is_success());
        assert!(op.apply(json!({"a": "x", "b": "y"})).is_failure());
        assert!(op.apply(json!({"a": 1, "b": 1})).is_failure());
        assert!(op.apply(json!({"a": "x"})).is_failure());
    }

    #[test]
    fn test_value_equal_is_strict() {
        let op = value_equal(FieldPath::parse("id").unwrap(), json!(4624));
        assert!(op.apply(json!({"id": 4624})).is_success());
        assert!(op.apply(json!({"id": "4624"})).is_failure());
    }

    #[test]
    fn test_reference_equal() {
        let op = reference_equal(
            FieldPath::parse("a").unwrap(),
            FieldPath::parse("b").unwrap(),
        );
        assert!(op.apply(json!({"a": [1], "b": [1]})).is_success());
        assert!(op.apply(json!({"a": [1]})).is_failure());
    }
}
