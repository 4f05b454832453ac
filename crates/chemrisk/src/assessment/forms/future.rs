use super::importer::{CHEMICAL_NAMES, COUNTRIES_OF_ORIGIN, HS_CODES};
use super::{COMPLIANCE_HISTORY, FINANCIAL_STABILITY};
use crate::assessment::client::Endpoint;
use crate::assessment::interpreter::Expectation;
use crate::assessment::schema::{FieldKind, FieldSpec, FormKind, FormSchema, PayloadShape};

pub const RISK_CATEGORIES: &[&str] = &["Low", "Medium", "High"];

const INTEGER: FieldKind = FieldKind::Number { integer: true };
const DECIMAL: FieldKind = FieldKind::Number { integer: false };

static FUTURE_FIELDS: [FieldSpec; 11] = [
    FieldSpec::required("hs_code", "HS Code", "HS_Code", FieldKind::Choice(HS_CODES)).echoed(),
    FieldSpec::required(
        "chemical_name",
        "Chemical Name",
        "Chemical_Name",
        FieldKind::Choice(CHEMICAL_NAMES),
    )
    .echoed(),
    FieldSpec::required(
        "country_of_origin",
        "Country of Origin",
        "Country_of_Origin",
        FieldKind::Choice(COUNTRIES_OF_ORIGIN),
    )
    .echoed(),
    FieldSpec::required(
        "risk_category",
        "Risk Category",
        "Risk_Category",
        FieldKind::Choice(RISK_CATEGORIES),
    ),
    FieldSpec::required(
        "compliance_history",
        "Compliance History",
        "Compliance_History",
        FieldKind::Choice(COMPLIANCE_HISTORY),
    )
    .echoed(),
    FieldSpec::required(
        "financial_stability",
        "Financial Stability",
        "Financial_Stability",
        FieldKind::Choice(FINANCIAL_STABILITY),
    )
    .echoed(),
    FieldSpec::required("import_frequency", "Import Frequency", "Import_Frequency", INTEGER)
        .echoed(),
    FieldSpec::required(
        "import_quantity",
        "Import Quantity",
        "Import_Quantity (kg)",
        DECIMAL,
    )
    .echoed(),
    FieldSpec::required("compliance_score", "Compliance Score", "Compliance_Score", DECIMAL),
    FieldSpec::required("past_violations", "Past Violations", "Past_Violations", INTEGER)
        .echoed(),
    FieldSpec::required("import_trend", "Import Trend", "Import_Trend", DECIMAL),
];

/// Forecast of an importer's risk trend. The model reads a table, so the record is
/// sent as a single row.
pub static FUTURE_FORM: FormSchema = FormSchema {
    kind: FormKind::Future,
    endpoint: Endpoint::Predict,
    expectation: Expectation::Trend,
    shape: PayloadShape::SingleRowTable,
    fields: &FUTURE_FIELDS,
};
