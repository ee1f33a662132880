//! Helpers that write to the event.

use super::parser::HelperDefinition;
use super::types::{Operation, OperationResult};
use crate::error::BuildError;
use crate::field::{merge_values, Argument, FieldPath};
use regex::Regex;
use serde_json::Value;

/// `ef_append/$source/`: merge the value at `source` into the destination.
///
/// Objects merge recursively; any other pairing overwrites the destination.
/// Fails, leaving the event untouched, when either field is missing.
pub fn append(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    let source = reference_arg(definition, 0)?.clone();
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |mut event: Value| {
        let Some(value) = source.resolve(&event).cloned() else {
            let trace = format!("[{name}] reference '{source}' not found");
            return OperationResult::failure(event, trace);
        };
        match destination.resolve_mut(&mut event) {
            Some(target) => {
                merge_values(target, value);
                OperationResult::success(event)
            }
            None => {
                let trace = format!("[{name}] target field '{destination}' not found");
                OperationResult::failure(event, trace)
            }
        }
    }))
}

/// `ef_delete/`: remove the destination field. Fails when it is absent.
pub fn delete(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |mut event: Value| {
        match destination.remove(&mut event) {
            Some(_) => OperationResult::success(event),
            None => {
                let trace = format!("[{name}] field '{destination}' not found");
                OperationResult::failure(event, trace)
            }
        }
    }))
}

/// `s_up/<value>/`: write the upper-cased argument to the destination.
pub fn upper_case(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    case_map(definition, str::to_uppercase)
}

/// `s_lo/<value>/`: write the lower-cased argument to the destination.
pub fn lower_case(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    case_map(definition, str::to_lowercase)
}

fn case_map(definition: &HelperDefinition, map: fn(&str) -> String) -> Result<Operation, BuildError> {
    let argument = any_arg(definition, 0)?.clone();
    let destination = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |event: Value| {
        let Some(text) = argument.resolve_str(&event).map(map) else {
            let trace = format!("[{name}] reference '{argument}' not found or not a string");
            return OperationResult::failure(event, trace);
        };
        write(&name, &destination, event, Value::String(text))
    }))
}

/// `r_ext/<target>/<pattern>/`: search the destination string with `pattern`
/// and store the first capture group at `target`.
///
/// The matched field being absent or not a string, the pattern not matching,
/// and the group not participating are all successful no-ops.
pub fn regex_extract(definition: &HelperDefinition) -> Result<Operation, BuildError> {
    let target_text = literal_arg(definition, 0)?;
    let pattern_text = literal_arg(definition, 1)?;

    let target = FieldPath::parse(target_text)?;
    let pattern = Regex::new(pattern_text).map_err(|err| BuildError::InvalidPattern {
        operation: definition.name.clone(),
        pattern: pattern_text.to_string(),
        reason: err.to_string(),
    })?;
    if pattern.captures_len() < 2 {
        return Err(BuildError::InvalidPattern {
            operation: definition.name.clone(),
            pattern: pattern_text.to_string(),
            reason: "pattern has no capture group".to_string(),
        });
    }

    let source = definition.destination.clone();
    let name = definition.name.clone();

    Ok(Operation::new(&definition.name, definition.to_string(), move |event: Value| {
        let extracted = source
            .resolve_str(&event)
            .and_then(|text| pattern.captures(text))
            .and_then(|captures| captures.get(1))
            .map(|group| group.as_str().to_string());

        match extracted {
            Some(text) => write(&name, &target, event, Value::String(text)),
            None => OperationResult::success(event),
        }
    }))
}

/// Write a fixed value to `destination`. Used for literal map entries.
pub fn assign_value(destination: FieldPath, value: Value) -> Operation {
    let description = format!("{destination} = {value}");
    Operation::new("assign", description, move |event: Value| {
        write("assign", &destination, event, value.clone())
    })
}

/// Copy the value at `source` to `destination`. Fails when `source` is absent.
pub fn copy_reference(destination: FieldPath, source: FieldPath) -> Operation {
    let description = format!("{destination} = ${source}");
    Operation::new("copy", description, move |event: Value| {
        match source.resolve(&event).cloned() {
            Some(value) => write("copy", &destination, event, value),
            None => {
                let trace = format!("[copy] reference '{source}' not found");
                OperationResult::failure(event, trace)
            }
        }
    })
}

/// Set `value` at `path`, turning a path conflict into a failure.
pub(crate) fn write(name: &str, path: &FieldPath, mut event: Value, value: Value) -> OperationResult {
    match path.set(&mut event, value) {
        Ok(()) => OperationResult::success(event),
        Err(conflict) => OperationResult::failure(event, format!("[{name}] {conflict}")),
    }
}

pub(crate) fn reference_arg(definition: &HelperDefinition, index: usize) -> Result<&FieldPath, BuildError> {
    match definition.arguments.get(index) {
        Some(Argument::Reference(path)) => Ok(path),
        _ => Err(kind_error(definition, index, "a field reference")),
    }
}

pub(crate) fn literal_arg(definition: &HelperDefinition, index: usize) -> Result<&str, BuildError> {
    match definition.arguments.get(index) {
        Some(Argument::Literal(text)) => Ok(text),
        _ => Err(kind_error(definition, index, "a literal")),
    }
}

pub(crate) fn any_arg(definition: &HelperDefinition, index: usize) -> Result<&Argument, BuildError> {
    definition
        .arguments
        .get(index)
        .ok_or_else(|| BuildError::ArityMismatch {
            operation: definition.name.clone(),
            expected: index + 1,
            actual: definition.arguments.len(),
        })
}

fn kind_error(definition: &HelperDefinition, index: usize, expected: &'static str) -> BuildError {
    BuildError::ArgumentKind {
        operation: definition.name.clone(),
        index,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(destination: &str, invocation: &str) -> HelperDefinition {
        HelperDefinition::parse(destination, invocation).unwrap()
    }

    #[test]
    fn test_append_merges_objects() {
        let op = append(&def("fieldTo", "+ef_append/$fieldFrom/")).unwrap();
        let event = json!({"fieldTo": {"a": 1, "n": {"x": 1}}, "fieldFrom": {"b": 2, "n": {"y": 2}}});
        let result = op.apply(event);
        assert!(result.is_success());
        assert_eq!(
            result.event()["fieldTo"],
            json!({"a": 1, "n": {"x": 1, "y": 2}, "b": 2})
        );
    }

    #[test]
    fn test_append_missing_fields_fail_untouched() {
        let op = append(&def("fieldTo", "+ef_append/$fieldFrom/")).unwrap();

        let event = json!({"fieldFrom": 1});
        let result = op.apply(event.clone());
        assert!(result.is_failure());
        assert_eq!(result.event(), &event);

        let event = json!({"fieldTo": 1});
        let result = op.apply(event.clone());
        assert!(result.is_failure());
        assert_eq!(result.event(), &event);
    }

    #[test]
    fn test_append_rejects_literal() {
        assert!(matches!(
            append(&def("fieldTo", "+ef_append/fieldFrom/")),
            Err(BuildError::ArgumentKind { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let op = delete(&def("a.b", "+ef_delete/")).unwrap();
        let result = op.apply(json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(result, OperationResult::success(json!({"a": {"c": 2}})));
        assert!(op.apply(json!({"a": {}})).is_failure());
    }

    #[test]
    fn test_case_mapping() {
        let up = upper_case(&def("out", "+s_up/$in/")).unwrap();
        let result = up.apply(json!({"in": "MiXed"}));
        assert_eq!(result.event()["out"], json!("MIXED"));

        let lo = lower_case(&def("out", "+s_lo/ABC/")).unwrap();
        assert_eq!(lo.apply(json!({})).event()["out"], json!("abc"));

        assert!(up.apply(json!({"in": 5})).is_failure());
        assert!(up.apply(json!({})).is_failure());
    }

    #[test]
    fn test_regex_extract_basic() {
        let op = regex_extract(&def("field", "+r_ext/_field/(exp)/")).unwrap();
        let result = op.apply(json!({"field": "this is a test exp"}));
        assert!(result.is_success());
        assert_eq!(result.event()["_field"], json!("exp"));
    }

    #[test]
    fn test_regex_extract_no_match_is_noop() {
        let op = regex_extract(&def("field", "+r_ext/_field/(exp)/")).unwrap();
        let event = json!({"field": "nothing here"});
        assert_eq!(op.apply(event.clone()), OperationResult::success(event));

        let event = json!({"other": "exp"});
        assert_eq!(op.apply(event.clone()), OperationResult::success(event));
    }

    #[test]
    fn test_regex_build_errors() {
        assert!(matches!(
            regex_extract(&def("field", "+r_ext/_field/(exp/")),
            Err(BuildError::InvalidPattern { .. })
        ));
        assert!(matches!(
            regex_extract(&def("field", "+r_ext/_field/exp/")),
            Err(BuildError::InvalidPattern { .. })
        ));
        assert!(matches!(
            regex_extract(&def("field", "+r_ext/_field/$pattern/")),
            Err(BuildError::ArgumentKind { index: 1, .. })
        ));
    }

    #[test]
    fn test_assign_and_copy() {
        let assign = assign_value(FieldPath::parse("a.b").unwrap(), json!(4624));
        assert_eq!(assign.apply(json!({})).event(), &json!({"a": {"b": 4624}}));

        let copy = copy_reference(
            FieldPath::parse("dst").unwrap(),
            FieldPath::parse("src").unwrap(),
        );
        assert_eq!(
            copy.apply(json!({"src": [1]})).event(),
            &json!({"src": [1], "dst": [1]})
        );
        assert!(copy.apply(json!({})).is_failure());
    }

    #[test]
    fn test_write_conflict_fails() {
        let assign = assign_value(FieldPath::parse("a.b").unwrap(), json!(1));
        let event = json!({"a": "scalar"});
        let result = assign.apply(event.clone());
        assert!(result.is_failure());
        assert_eq!(result.event(), &event);
    }
}
