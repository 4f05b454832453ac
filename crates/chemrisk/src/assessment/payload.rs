use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::form::{FieldValue, FormField};
use super::schema::{FieldKind, FieldSpec, FormSchema, PayloadShape};
use super::validation::{self, ValidationErrors};

/// Request body derived from a valid form. Client-only fields never appear here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SubmissionPayload(Value);

impl SubmissionPayload {
    pub fn from_record(record: Map<String, Value>, shape: PayloadShape) -> Self {
        match shape {
            PayloadShape::Object => Self(Value::Object(record)),
            PayloadShape::SingleRowTable => Self(Value::Array(vec![Value::Object(record)])),
        }
    }

    pub fn body(&self) -> &Value {
        &self.0
    }

    pub fn into_body(self) -> Value {
        self.0
    }

    fn record(&self) -> Option<&Map<String, Value>> {
        match &self.0 {
            Value::Object(record) => Some(record),
            Value::Array(rows) => rows.first().and_then(Value::as_object),
            _ => None,
        }
    }

    fn record_mut(&mut self) -> Option<&mut Map<String, Value>> {
        match &mut self.0 {
            Value::Object(record) => Some(record),
            Value::Array(rows) => rows.first_mut().and_then(Value::as_object_mut),
            _ => None,
        }
    }

    /// Look up a transmitted field by its wire name.
    pub fn get(&self, wire_name: &str) -> Option<&Value> {
        self.record().and_then(|record| record.get(wire_name))
    }

    pub fn contains(&self, wire_name: &str) -> bool {
        self.get(wire_name).is_some()
    }

    /// Same payload with an extra top-level entry, e.g. the requested explanation size.
    pub fn with_entry(mut self, key: &str, value: Value) -> Self {
        if let Some(record) = self.record_mut() {
            record.insert(key.to_string(), value);
        }
        self
    }
}

/// Validate `fields` and serialize the transmitted subset, coercing numeric fields.
pub fn build(
    schema: &FormSchema,
    fields: &[FormField],
) -> Result<SubmissionPayload, ValidationErrors> {
    validation::validate(schema, fields).into_result()?;

    let mut record = Map::new();
    for spec in schema.fields.iter().filter(|spec| !spec.client_only) {
        let Some(value) = fields
            .iter()
            .find(|field| field.name == spec.name)
            .map(|field| &field.value)
        else {
            continue;
        };
        if value.is_blank() {
            continue;
        }
        record.insert(spec.wire_name.to_string(), wire_value(spec, value));
    }

    Ok(SubmissionPayload::from_record(record, schema.shape))
}

fn wire_value(spec: &FieldSpec, value: &FieldValue) -> Value {
    match spec.kind {
        FieldKind::Number { integer } => value
            .as_number()
            .and_then(|number| numeric_json(number, integer))
            .unwrap_or(Value::Null),
        FieldKind::Text | FieldKind::Choice(_) | FieldKind::Date | FieldKind::Pattern(_) => {
            Value::String(value.as_text().trim().to_string())
        }
    }
}

pub(crate) fn numeric_json(number: f64, integer: bool) -> Option<Value> {
    if integer && number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(number as i64)));
    }
    Number::from_f64(number).map(Value::Number)
}
