use serde_json::{Map, Value};

use super::{COMPLIANCE_HISTORY, FINANCIAL_STABILITY};
use crate::assessment::client::{Endpoint, ScoringService};
use crate::assessment::controller::{AssessmentForm, SubmissionController};
use crate::assessment::explanation::{
    self, ExplanationData, ExplanationError, ExplanationMethod, ExplanationPanel,
};
use crate::assessment::form::{FieldValue, FormError, FormState};
use crate::assessment::interpreter::Expectation;
use crate::assessment::payload::{self, SubmissionPayload};
use crate::assessment::schema::{
    FieldKind, FieldSpec, FormKind, FormSchema, PatternRule, PayloadShape,
};
use crate::assessment::validation::ValidationErrors;

pub const HS_CODES: &[&str] = &[
    "282619", "280700", "283711", "280800", "282611", "280120", "280110", "280130", "282911",
    "310210", "283719", "284800",
];

pub const CHEMICAL_NAMES: &[&str] = &[
    "Fluorides; fluorosilicates, fluoroaluminates, and other complex fluorine salts",
    "Sulphuric acid; oleum",
    "Cyanides and cyanide oxides: Of sodium",
    "Nitric acid; sulphonitric acids",
    "Halides and halide oxides of non-metals",
    "Iodine",
    "Chlorine",
    "Bromine",
    "Chlorates and perchlorates; bromates and perbromates; iodates and periodates",
    "Mineral or chemical fertilizers, nitrogenous",
    "Cyanides and cyanide oxides: Other",
    "Hydrogen peroxide, whether or not solidified with urea",
];

pub const COUNTRIES_OF_ORIGIN: &[&str] = &[
    "Pakistan",
    "Brazil",
    "India",
    "China",
    "USA",
    "Germany",
    "South Korea",
    "France",
    "Russia",
    "United Kingdom",
    "Japan",
    "Canada",
];

pub const IMPORTATION_DESCRIPTIONS: &[&str] = &[
    "Used in aluminum smelting & glass manufacturing",
    "Petroleum refining & chemical synthesis",
    "Gold mining & electroplating industry",
    "Used in fertilizer manufacturing & explosives production",
    "Semiconductor manufacturing & etching process",
    "Pharmaceutical & medical applications",
    "Industrial water purification & disinfection",
    "Used in flame retardants & water treatment",
    "Manufacturing of explosives & oxidizing agents",
    "Agriculture sector, soil nutrient enhancement",
    "Used in synthetic organic chemistry & pest control",
    "Textile bleaching & paper pulp industry",
];

static LICENCE_ID: PatternRule = PatternRule::new(r"^IMP\d{3}$", "IMP123");

static IMPORTER_FIELDS: [FieldSpec; 10] = [
    FieldSpec::required(
        "importerLicenseId",
        "Importer License ID",
        "importerLicenseId",
        FieldKind::Pattern(&LICENCE_ID),
    )
    .client_only(),
    FieldSpec::required("hsCode", "HS Code", "hsCode", FieldKind::Choice(HS_CODES)).echoed(),
    FieldSpec::required(
        "chemicalName",
        "Chemical Name",
        "chemicalName",
        FieldKind::Choice(CHEMICAL_NAMES),
    )
    .echoed(),
    FieldSpec::required(
        "countryOfOrigin",
        "Country of Origin",
        "countryOfOrigin",
        FieldKind::Choice(COUNTRIES_OF_ORIGIN),
    )
    .echoed(),
    FieldSpec::required(
        "importationDescription",
        "Importation Description",
        "importationDescription",
        FieldKind::Choice(IMPORTATION_DESCRIPTIONS),
    ),
    FieldSpec::required(
        "complianceHistory",
        "Compliance History",
        "complianceHistory",
        FieldKind::Choice(COMPLIANCE_HISTORY),
    )
    .echoed(),
    FieldSpec::required(
        "financialStability",
        "Financial Stability",
        "financialStability",
        FieldKind::Choice(FINANCIAL_STABILITY),
    )
    .echoed(),
    FieldSpec::required(
        "importFrequency",
        "Import Frequency",
        "importFrequency",
        FieldKind::Number { integer: true },
    )
    .echoed(),
    FieldSpec::required(
        "importVolume",
        "Import Volume",
        "importVolume",
        FieldKind::Number { integer: false },
    )
    .echoed(),
    FieldSpec::required(
        "pastViolations",
        "Past Violations",
        "pastViolations",
        FieldKind::Number { integer: true },
    )
    .echoed(),
];

pub static IMPORTER_FORM: FormSchema = FormSchema {
    kind: FormKind::Importer,
    endpoint: Endpoint::ImporterRisk,
    expectation: Expectation::Categorized,
    shape: PayloadShape::Object,
    fields: &IMPORTER_FIELDS,
};

/// Importer form plus its explanation panel.
#[derive(Debug, Clone)]
pub struct ImporterAssessment {
    form: FormState,
    panel: ExplanationPanel,
    preferred: ExplanationMethod,
    submitted: Option<SubmissionPayload>,
}

impl ImporterAssessment {
    pub fn new(preferred: ExplanationMethod) -> Self {
        Self {
            form: FormState::new(&IMPORTER_FORM),
            panel: ExplanationPanel::new(preferred),
            preferred,
            submitted: None,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), FormError> {
        self.form.set(name, value)
    }

    pub fn panel(&self) -> &ExplanationPanel {
        &self.panel
    }

    /// Fetch an explanation of the last prediction with `method`.
    pub async fn explain<S>(
        &mut self,
        controller: &SubmissionController<S>,
        method: ExplanationMethod,
        num_features: u8,
    ) -> Result<&ExplanationData, ExplanationError>
    where
        S: ScoringService + ?Sized,
    {
        let payload = self
            .submitted
            .as_ref()
            .ok_or(ExplanationError::NoPrediction)?;
        self.panel
            .select_method(
                controller.service().as_ref(),
                payload,
                method,
                num_features,
                controller.signal(),
            )
            .await
    }
}

impl Default for ImporterAssessment {
    fn default() -> Self {
        Self::new(ExplanationMethod::default())
    }
}

impl AssessmentForm for ImporterAssessment {
    fn kind(&self) -> FormKind {
        FormKind::Importer
    }

    fn endpoint(&self) -> Endpoint {
        IMPORTER_FORM.endpoint
    }

    fn expectation(&self) -> Expectation {
        IMPORTER_FORM.expectation
    }

    fn validate(&mut self) -> ValidationErrors {
        self.form.validate().clone()
    }

    fn payload(&self) -> Result<SubmissionPayload, ValidationErrors> {
        Ok(payload::build(&IMPORTER_FORM, self.form.fields())?
            .with_entry("xai_method", Value::from(self.preferred.as_str())))
    }

    fn echo(&self, payload: &SubmissionPayload) -> Map<String, Value> {
        IMPORTER_FORM.echo(payload)
    }

    fn on_success(&mut self, body: &Value) {
        self.submitted = payload::build(&IMPORTER_FORM, self.form.fields()).ok();
        self.panel.clear();
        if let Some(data) = explanation::embedded(body, self.preferred) {
            self.panel.seed(data);
        }
    }

    fn on_failure(&mut self) {
        self.submitted = None;
        self.panel.clear();
    }
}
