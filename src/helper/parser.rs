//! Parsing of `<op>/<arg1>/<arg2>/.../` helper invocations.
//!
//! A helper invocation is the value side of a rule entry whose key is the
//! destination field:
//!
//! ```text
//! event.original: +r_ext/_field/(exp)/
//! ^ destination    ^ name ^ args
//! ```
//!
//! The leading `+` is optional and the trailing `/` may be omitted. A literal
//! slash inside an argument is written `\/`.

use crate::error::BuildError;
use crate::field::{Argument, FieldPath};
use std::fmt;

/// Prefix marking a value as a helper invocation in rule documents.
pub const HELPER_PREFIX: char = '+';

const SEPARATOR: char = '/';
const ESCAPE: char = '\\';

/// A parsed, not yet validated, helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperDefinition {
    pub destination: FieldPath,
    pub name: String,
    pub arguments: Vec<Argument>,
}

impl HelperDefinition {
    /// Parse `invocation` for the given destination field.
    ///
    /// # Example
    /// ```rust
    /// use event_engine::helper::HelperDefinition;
    ///
    /// let def = HelperDefinition::parse("field", "+r_ext/_field/(exp)/").unwrap();
    /// assert_eq!(def.name, "r_ext");
    /// assert_eq!(def.arguments.len(), 2);
    /// ```
    pub fn parse(destination: &str, invocation: &str) -> Result<Self, BuildError> {
        let mut tokens = split_invocation(invocation);

        if tokens.last().map_or(false, String::is_empty) {
            tokens.pop();
        }

        let mut tokens = tokens.into_iter();
        let name = tokens.next().unwrap_or_default();
        let arguments: Vec<String> = tokens.collect();

        Self::from_parts_owned(destination, &name, &arguments, invocation)
    }

    /// Build a definition from already-split parts.
    pub fn from_parts(destination: &str, name: &str, arguments: &[&str]) -> Result<Self, BuildError> {
        let arguments: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
        let text = render(name, &arguments);
        Self::from_parts_owned(destination, name, &arguments, &text)
    }

    fn from_parts_owned(
        destination: &str,
        name: &str,
        arguments: &[String],
        text: &str,
    ) -> Result<Self, BuildError> {
        let malformed = |reason: String| BuildError::MalformedInvocation {
            text: text.to_string(),
            reason,
        };

        let name = name.strip_prefix(HELPER_PREFIX).unwrap_or(name);
        if name.is_empty() {
            return Err(malformed("missing operation name".to_string()));
        }
        if let Some(position) = arguments.iter().position(String::is_empty) {
            return Err(malformed(format!("argument {position} is empty")));
        }

        let destination = FieldPath::parse(destination)?;
        let arguments = arguments
            .iter()
            .map(|token| Argument::parse(token))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            destination,
            name: name.to_string(),
            arguments,
        })
    }
}

impl fmt::Display for HelperDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        write!(f, "{}.{}({})", self.destination, self.name, args.join(", "))
    }
}

/// Split on unescaped separators, unescaping `\/`.
fn split_invocation(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE if chars.peek() == Some(&SEPARATOR) => {
                current.push(SEPARATOR);
                chars.next();
            }
            SEPARATOR => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);
    tokens
}

fn render(name: &str, arguments: &[String]) -> String {
    let mut text = name.to_string();
    for argument in arguments {
        text.push(SEPARATOR);
        text.push_str(&argument.replace(SEPARATOR, "\\/"));
    }
    text.push(SEPARATOR);
    text
}
