use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use super::form::{FieldValue, FormField};
use super::schema::{FieldKind, FieldSpec, FormSchema};

/// Field name to human-readable message. Empty means the form is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    /// Messages for the aggregate banner shown above the form.
    pub fn summary(&self) -> Vec<String> {
        self.0.values().cloned().collect()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|field, _| keep(field));
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in self.0.values() {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(message)?;
            first = false;
        }
        Ok(())
    }
}

/// Run every field rule of `schema` against `fields`.
pub fn validate(schema: &FormSchema, fields: &[FormField]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for spec in schema.fields {
        let value = fields
            .iter()
            .find(|field| field.name == spec.name)
            .map(|field| &field.value);
        if let Some(message) = check_field(spec, value) {
            errors.insert(spec.name, message);
        }
    }
    errors
}

/// Message for the first rule `value` breaks, if any.
pub fn check_field(spec: &FieldSpec, value: Option<&FieldValue>) -> Option<String> {
    let value = match value {
        Some(value) if !value.is_blank() => value,
        _ if spec.required => return Some(required_message(spec.label)),
        _ => return None,
    };

    match &spec.kind {
        FieldKind::Text => None,
        FieldKind::Number { integer } => check_number(spec.label, value, *integer),
        FieldKind::Choice(options) => {
            let text = value.as_text();
            let text = text.trim();
            if options.iter().any(|option| *option == text) {
                None
            } else {
                Some(format!("{} must be one of the listed options", spec.label))
            }
        }
        FieldKind::Date => {
            let text = value.as_text();
            match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                Ok(_) => None,
                Err(_) => Some(format!("{} must be a date (YYYY-MM-DD)", spec.label)),
            }
        }
        FieldKind::Pattern(rule) => {
            let text = value.as_text();
            if rule.matches(text.trim()) {
                None
            } else {
                Some(format!("{} must look like {}", spec.label, rule.example))
            }
        }
    }
}

pub(crate) fn required_message(label: &str) -> String {
    format!("{label} is required")
}

pub(crate) fn check_number(label: &str, value: &FieldValue, integer: bool) -> Option<String> {
    match value.as_number() {
        None => Some(format!("{label} must be a valid number")),
        Some(number) if integer && number.fract() != 0.0 => {
            Some(format!("{label} must be a whole number"))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_messages_in_field_order() {
        let mut errors = ValidationErrors::new();
        errors.insert("b", "B is required");
        errors.insert("a", "A is required");
        assert_eq!(errors.to_string(), "A is required; B is required");
        assert_eq!(errors.summary(), vec!["A is required", "B is required"]);
    }

    #[test]
    fn numeric_check_rejects_non_finite_values() {
        let value = FieldValue::Text("NaN".to_string());
        assert_eq!(
            check_number("Import Volume", &value, false).as_deref(),
            Some("Import Volume must be a valid number")
        );
        let value = FieldValue::Text("inf".to_string());
        assert!(check_number("Import Volume", &value, false).is_some());
        let value = FieldValue::Text(" 12.5 ".to_string());
        assert!(check_number("Import Volume", &value, false).is_none());
        assert!(check_number("Past Violations", &value, true).is_some());
    }
}
