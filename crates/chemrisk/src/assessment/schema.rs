use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::client::Endpoint;
use super::interpreter::Expectation;
use super::payload::SubmissionPayload;

/// The four assessment forms offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Importer,
    EndUser,
    Future,
    Recipe,
}

impl FormKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Importer => "Importer Risk",
            Self::EndUser => "End-User Risk",
            Self::Future => "Future Risk Trend",
            Self::Recipe => "Recipe Risk",
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Format constraint on free-text identifiers, e.g. `IMP` followed by three digits.
#[derive(Debug)]
pub struct PatternRule {
    pub pattern: &'static str,
    pub example: &'static str,
    compiled: OnceLock<Option<Regex>>,
}

impl PatternRule {
    pub const fn new(pattern: &'static str, example: &'static str) -> Self {
        Self {
            pattern,
            example,
            compiled: OnceLock::new(),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.compiled
            .get_or_init(|| Regex::new(self.pattern).ok())
            .as_ref()
            .is_some_and(|regex| regex.is_match(value))
    }
}

#[derive(Debug)]
pub enum FieldKind {
    Text,
    Number { integer: bool },
    Choice(&'static [&'static str]),
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
    Pattern(&'static PatternRule),
}

/// Static description of one form field.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    /// Key used in the body sent to the scoring service.
    pub wire_name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Collected for display only and never transmitted.
    pub client_only: bool,
    /// Echoed into `RiskResult::raw_input` for risk-factor explanations.
    pub echo: bool,
}

impl FieldSpec {
    pub const fn required(
        name: &'static str,
        label: &'static str,
        wire_name: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            name,
            label,
            wire_name,
            kind,
            required: true,
            client_only: false,
            echo: false,
        }
    }

    pub const fn optional(
        name: &'static str,
        label: &'static str,
        wire_name: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, label, wire_name, kind)
        }
    }

    pub const fn client_only(mut self) -> Self {
        self.client_only = true;
        self
    }

    pub const fn echoed(mut self) -> Self {
        self.echo = true;
        self
    }
}

/// How the serialized fields are wrapped in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Object,
    /// A one-element array of records, as expected by table-oriented endpoints.
    SingleRowTable,
}

#[derive(Debug)]
pub struct FormSchema {
    pub kind: FormKind,
    pub endpoint: Endpoint,
    pub expectation: Expectation,
    pub shape: PayloadShape,
    pub fields: &'static [FieldSpec],
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn required_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name)
    }

    /// Copy of the echoed fields present in `payload`, keyed by wire name.
    pub fn echo(&self, payload: &SubmissionPayload) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|spec| spec.echo && !spec.client_only)
            .filter_map(|spec| {
                payload
                    .get(spec.wire_name)
                    .map(|value| (spec.wire_name.to_string(), value.clone()))
            })
            .collect()
    }
}
