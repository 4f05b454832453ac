use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::FormSchema;
use super::validation::{self, ValidationErrors};

/// Value held by a form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Number(_) | Self::Flag(_) => false,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_str()),
            Self::Number(number) => Cow::Owned(number.to_string()),
            Self::Flag(flag) => Cow::Owned(flag.to_string()),
        }
    }

    /// Finite numeric reading of the value, parsing text when needed.
    pub fn as_number(&self) -> Option<f64> {
        let number = match self {
            Self::Number(number) => *number,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
            Self::Flag(_) => return None,
        };
        number.is_finite().then_some(number)
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::empty()),
            Value::Bool(flag) => Some(Self::Flag(*flag)),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub value: FieldValue,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' only accepts text, numbers, or booleans")]
    UnsupportedValue(String),
}

/// Per-form holder of field values and their validation messages.
#[derive(Debug, Clone)]
pub struct FormState {
    schema: &'static FormSchema,
    fields: Vec<FormField>,
    errors: ValidationErrors,
}

impl FormState {
    pub fn new(schema: &'static FormSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|spec| FormField {
                name: spec.name,
                value: FieldValue::empty(),
                required: spec.required,
            })
            .collect();

        Self {
            schema,
            fields,
            errors: ValidationErrors::new(),
        }
    }

    pub fn schema(&self) -> &'static FormSchema {
        self.schema
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Record an edit. An existing error on this field is dropped once the new value
    /// satisfies its rules; errors are never added here.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), FormError> {
        let spec = self
            .schema
            .field(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        let field = self
            .fields
            .iter_mut()
            .find(|field| field.name == spec.name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        field.value = value.into();

        if self.errors.contains(spec.name)
            && validation::check_field(spec, Some(&field.value)).is_none()
        {
            self.errors.remove(spec.name);
        }
        Ok(())
    }

    /// Apply every entry of a decoded JSON object as an edit.
    pub fn apply_json(&mut self, values: &Map<String, Value>) -> Result<(), FormError> {
        for (name, raw) in values {
            let value = FieldValue::from_json(raw)
                .ok_or_else(|| FormError::UnsupportedValue(name.clone()))?;
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Recompute and store the full error map.
    pub fn validate(&mut self) -> &ValidationErrors {
        self.errors = validation::validate(self.schema, &self.fields);
        &self.errors
    }

    /// Restore every field to its empty default and clear messages.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.value = FieldValue::empty();
        }
        self.errors = ValidationErrors::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_untagged_values() {
        let values: Vec<FieldValue> =
            serde_json::from_value(json!([true, 4.5, "IMP001"])).expect("values decode");
        assert_eq!(
            values,
            vec![
                FieldValue::Flag(true),
                FieldValue::Number(4.5),
                FieldValue::Text("IMP001".to_string()),
            ]
        );
    }

    #[test]
    fn reset_clears_values_and_messages() {
        let mut form = FormState::new(&crate::assessment::forms::end_user::END_USER_FORM);
        form.set("customer_name", "Acme Labs").expect("known field");
        assert!(!form.validate().is_empty());

        form.reset();
        assert!(form.errors().is_empty());
        assert!(form
            .value("customer_name")
            .is_some_and(FieldValue::is_blank));
    }

    #[test]
    fn whitespace_text_is_blank() {
        assert!(FieldValue::from("   ").is_blank());
        assert!(!FieldValue::from(0.0).is_blank());
        assert_eq!(FieldValue::from("12").as_number(), Some(12.0));
        assert_eq!(FieldValue::from(true).as_number(), None);
    }
}
