//! Multi-field risk submission workflow shared by the importer, end-user, future-trend,
//! and recipe assessment forms.
//!
//! A form instance owns its field values and validation messages. Submitting runs the
//! validator, serializes a payload, performs one call against the remote scoring
//! service, and normalizes the reply into a [`RiskResult`] that the presentation layer
//! turns into badges, progress indicators, and recommendation text.

pub mod batch;
pub mod client;
pub mod controller;
pub mod explanation;
pub mod form;
pub mod forms;
pub mod interpreter;
pub mod lifetime;
pub mod payload;
pub mod presentation;
pub mod router;
pub mod schema;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use client::{Endpoint, HttpScoringClient, ScoringClientError, ScoringService};
pub use controller::{AssessmentForm, ErrorKind, SubmissionController, SubmissionError, SubmissionView};
pub use explanation::{
    ExplanationData, ExplanationError, ExplanationMethod, ExplanationPanel, FeatureImportance,
};
pub use form::{FieldValue, FormError, FormField, FormState};
pub use forms::importer::ImporterAssessment;
pub use forms::recipe::{ChemicalInput, ChemicalRow, QuantityUnit, RecipeForm, RecipeSubmission};
pub use interpreter::{interpret, is_risky, Expectation, InterpretError, RiskCategory, RiskResult};
pub use lifetime::{AbortSignal, FormLifetime};
pub use payload::SubmissionPayload;
pub use presentation::{ProgressIndicator, RiskView, Tone};
pub use router::{dashboard_router, DashboardState};
pub use schema::{FieldKind, FieldSpec, FormKind, FormSchema};
pub use service::{AssessmentError, AssessmentReport, AssessmentService};
pub use validation::ValidationErrors;
