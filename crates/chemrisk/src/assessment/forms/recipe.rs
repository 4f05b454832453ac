use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::assessment::client::Endpoint;
use crate::assessment::controller::AssessmentForm;
use crate::assessment::form::{FieldValue, FormError};
use crate::assessment::interpreter::Expectation;
use crate::assessment::payload::{numeric_json, SubmissionPayload};
use crate::assessment::schema::{FormKind, PayloadShape};
use crate::assessment::validation::{check_number, required_message, ValidationErrors};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityUnit {
    #[default]
    #[serde(rename = "g")]
    Grams,
    #[serde(rename = "mg")]
    Milligrams,
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "mL")]
    Millilitres,
    #[serde(rename = "L")]
    Litres,
    #[serde(rename = "mol")]
    Moles,
}

impl QuantityUnit {
    pub const ALL: [Self; 6] = [
        Self::Grams,
        Self::Milligrams,
        Self::Kilograms,
        Self::Millilitres,
        Self::Litres,
        Self::Moles,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Grams => "g",
            Self::Milligrams => "mg",
            Self::Kilograms => "kg",
            Self::Millilitres => "mL",
            Self::Litres => "L",
            Self::Moles => "mol",
        }
    }
}

impl fmt::Display for QuantityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for QuantityUnit {
    type Err = FormError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|unit| unit.symbol() == value)
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|unit| unit.symbol().eq_ignore_ascii_case(value))
            })
            .ok_or_else(|| FormError::UnsupportedValue(format!("unit '{value}'")))
    }
}

/// One editable line of the recipe form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChemicalRow {
    pub id: Uuid,
    pub name: String,
    pub quantity: FieldValue,
    pub unit: QuantityUnit,
}

impl ChemicalRow {
    fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            quantity: FieldValue::empty(),
            unit: QuantityUnit::default(),
        }
    }
}

/// Chemical line as received from a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChemicalInput {
    #[serde(default)]
    pub name: String,
    #[serde(default = "FieldValue::empty")]
    pub quantity: FieldValue,
    #[serde(default)]
    pub unit: QuantityUnit,
}

/// Recipe as received from a client: `{chemicals: [...], description?}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecipeSubmission {
    pub chemicals: Vec<ChemicalInput>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Variable-length list of chemicals with an optional description.
#[derive(Debug, Clone)]
pub struct RecipeForm {
    rows: Vec<ChemicalRow>,
    description: String,
    errors: ValidationErrors,
}

impl RecipeForm {
    pub fn new() -> Self {
        Self {
            rows: vec![ChemicalRow::blank()],
            description: String::new(),
            errors: ValidationErrors::new(),
        }
    }

    /// Form pre-filled from a client submission. An empty chemical list still yields
    /// one blank row so validation can report it.
    pub fn from_submission(submission: RecipeSubmission) -> Self {
        let mut form = Self::new();
        if !submission.chemicals.is_empty() {
            form.rows = submission
                .chemicals
                .into_iter()
                .map(|input| ChemicalRow {
                    name: input.name,
                    quantity: input.quantity,
                    unit: input.unit,
                    ..ChemicalRow::blank()
                })
                .collect();
        }
        form.description = submission.description.unwrap_or_default();
        form
    }

    pub fn rows(&self) -> &[ChemicalRow] {
        &self.rows
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Append a blank row and return its id.
    pub fn add_chemical(&mut self) -> Uuid {
        let row = ChemicalRow::blank();
        let id = row.id;
        self.rows.push(row);
        id
    }

    /// Remove the row with `id`. The last remaining row is never removed.
    pub fn remove_chemical(&mut self, id: Uuid) -> bool {
        if self.rows.len() <= 1 {
            return false;
        }
        let Some(removed) = self.rows.iter().position(|row| row.id == id) else {
            return false;
        };
        self.rows.remove(removed);

        // Rows below the removed one move up; their messages follow them.
        let shown: BTreeSet<String> = self
            .errors
            .iter()
            .filter_map(|(field, _)| shifted_key(field, removed))
            .collect();
        let mut errors = self.collect_errors();
        errors.retain(|field| shown.contains(field));
        self.errors = errors;
        true
    }

    pub fn set_name(&mut self, index: usize, name: impl Into<String>) -> Result<(), FormError> {
        let row = self.row_mut(index)?;
        row.name = name.into();
        if !row.name.trim().is_empty() {
            self.errors.remove(&name_key(index));
        }
        Ok(())
    }

    pub fn set_quantity(
        &mut self,
        index: usize,
        quantity: impl Into<FieldValue>,
    ) -> Result<(), FormError> {
        let row = self.row_mut(index)?;
        row.quantity = quantity.into();
        if quantity_error(index, &row.quantity).is_none() {
            self.errors.remove(&quantity_key(index));
        }
        Ok(())
    }

    pub fn set_unit(&mut self, index: usize, unit: QuantityUnit) -> Result<(), FormError> {
        self.row_mut(index)?.unit = unit;
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn row_mut(&mut self, index: usize) -> Result<&mut ChemicalRow, FormError> {
        self.rows
            .get_mut(index)
            .ok_or_else(|| FormError::UnknownField(format!("chemicals.{index}")))
    }

    fn collect_errors(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (index, row) in self.rows.iter().enumerate() {
            if row.name.trim().is_empty() {
                errors.insert(
                    name_key(index),
                    required_message(&format!("Chemical {} name", index + 1)),
                );
            }
            if let Some(message) = quantity_error(index, &row.quantity) {
                errors.insert(quantity_key(index), message);
            }
        }
        errors
    }
}

impl Default for RecipeForm {
    fn default() -> Self {
        Self::new()
    }
}

fn name_key(index: usize) -> String {
    format!("chemicals.{index}.name")
}

fn quantity_key(index: usize) -> String {
    format!("chemicals.{index}.quantity")
}

/// Key of a row error once row `removed` is gone, or `None` if it belonged to that row.
fn shifted_key(field: &str, removed: usize) -> Option<String> {
    let Some((index, column)) = field
        .strip_prefix("chemicals.")
        .and_then(|rest| rest.split_once('.'))
    else {
        return Some(field.to_string());
    };
    match index.parse::<usize>() {
        Ok(index) if index == removed => None,
        Ok(index) if index > removed => Some(format!("chemicals.{}.{column}", index - 1)),
        _ => Some(field.to_string()),
    }
}

fn quantity_error(index: usize, quantity: &FieldValue) -> Option<String> {
    let label = format!("Chemical {} quantity", index + 1);
    if quantity.is_blank() {
        Some(required_message(&label))
    } else {
        check_number(&label, quantity, false)
    }
}

impl AssessmentForm for RecipeForm {
    fn kind(&self) -> FormKind {
        FormKind::Recipe
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::Analyze
    }

    fn expectation(&self) -> Expectation {
        Expectation::Recipe
    }

    fn validate(&mut self) -> ValidationErrors {
        self.errors = self.collect_errors();
        self.errors.clone()
    }

    fn payload(&self) -> Result<SubmissionPayload, ValidationErrors> {
        self.collect_errors().into_result()?;

        let chemicals = self
            .rows
            .iter()
            .map(|row| {
                let quantity = row
                    .quantity
                    .as_number()
                    .and_then(|number| numeric_json(number, false))
                    .unwrap_or(Value::Null);
                serde_json::json!({
                    "name": row.name.trim(),
                    "quantity": quantity,
                    "unit": row.unit.symbol(),
                })
            })
            .collect::<Vec<Value>>();

        let mut record = Map::new();
        record.insert("chemicals".to_string(), Value::Array(chemicals));
        let description = self.description.trim();
        if !description.is_empty() {
            record.insert("description".to_string(), Value::from(description));
        }
        Ok(SubmissionPayload::from_record(record, PayloadShape::Object))
    }

    fn echo(&self, payload: &SubmissionPayload) -> Map<String, Value> {
        let names = payload
            .get("chemicals")
            .and_then(Value::as_array)
            .map(|chemicals| {
                chemicals
                    .iter()
                    .filter_map(|chemical| chemical.get("name").cloned())
                    .collect::<Vec<Value>>()
            })
            .unwrap_or_default();

        let mut echo = Map::new();
        echo.insert("chemicals".to_string(), Value::Array(names));
        if let Some(description) = payload.get("description") {
            echo.insert("description".to_string(), description.clone());
        }
        echo
    }
}
