use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use chemrisk::assessment::batch::{self, BatchRow};
use chemrisk::assessment::forms::end_user::END_USER_FORM;
use chemrisk::assessment::forms::future::FUTURE_FORM;
use chemrisk::assessment::forms::importer::IMPORTER_FORM;
use chemrisk::assessment::{
    AbortSignal, AssessmentError, AssessmentReport, AssessmentService, ChemicalInput,
    ExplanationMethod, FieldValue, FormLifetime, FormSchema, FormState, HttpScoringClient,
    QuantityUnit, RecipeSubmission, ScoringService, SubmissionError,
};
use chemrisk::config::AppConfig;
use chemrisk::error::AppError;
use chemrisk::telemetry;
use clap::{Args, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub(crate) enum AssessCommand {
    /// Importer risk prediction, optionally with a LIME or SHAP explanation
    Importer(ImporterArgs),
    /// End-user purchase pattern scoring
    EndUser(FieldArgs),
    /// Future risk trend forecast
    Future(FieldArgs),
    /// Chemical combination analysis
    Recipe(RecipeArgs),
}

#[derive(Args, Debug)]
pub(crate) struct FieldArgs {
    /// Field value as name=value; repeat for each field
    #[arg(long = "field", value_parser = parse_field, conflicts_with = "csv")]
    pub(crate) fields: Vec<(String, String)>,
    /// Headed CSV file; every row is submitted in turn
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ImporterArgs {
    #[command(flatten)]
    pub(crate) input: FieldArgs,
    /// Fetch an explanation with the prediction (lime or shap)
    #[arg(long, value_parser = parse_method)]
    pub(crate) explain: Option<ExplanationMethod>,
}

#[derive(Args, Debug)]
pub(crate) struct RecipeArgs {
    /// Chemical as name:quantity:unit; repeat for each row
    #[arg(long = "chemical", value_parser = parse_chemical, required = true)]
    pub(crate) chemicals: Vec<ChemicalInput>,
    /// Free-text description of the intended use
    #[arg(long)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum FieldForm {
    Importer(Option<ExplanationMethod>),
    EndUser,
    Future,
}

impl FieldForm {
    fn schema(self) -> &'static FormSchema {
        match self {
            Self::Importer(_) => &IMPORTER_FORM,
            Self::EndUser => &END_USER_FORM,
            Self::Future => &FUTURE_FORM,
        }
    }
}

pub(crate) async fn run_assess(command: AssessCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let client = Arc::new(HttpScoringClient::new(&config.scoring)?);
    let service = AssessmentService::new(client, config.scoring.explanation_features);
    let lifetime = abort_on_ctrl_c();

    match command {
        AssessCommand::Importer(args) => {
            let form = FieldForm::Importer(args.explain);
            submit_inputs(&service, form, args.input, &lifetime).await
        }
        AssessCommand::EndUser(args) => {
            submit_inputs(&service, FieldForm::EndUser, args, &lifetime).await
        }
        AssessCommand::Future(args) => {
            submit_inputs(&service, FieldForm::Future, args, &lifetime).await
        }
        AssessCommand::Recipe(args) => {
            let submission = RecipeSubmission {
                chemicals: args.chemicals,
                description: args.description,
            };
            let report = service
                .analyze_recipe(submission, lifetime.signal())
                .await?;
            print_report("recipe", &report);
            Ok(())
        }
    }
}

/// Lifetime handle aborted by the first Ctrl-C.
pub(crate) fn abort_on_ctrl_c() -> Arc<FormLifetime> {
    let lifetime = Arc::new(FormLifetime::new());
    let handle = Arc::clone(&lifetime);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, aborting in-flight submission");
            handle.abort();
        }
    });
    lifetime
}

async fn submit_inputs<S>(
    service: &AssessmentService<S>,
    form: FieldForm,
    args: FieldArgs,
    lifetime: &FormLifetime,
) -> Result<(), AppError>
where
    S: ScoringService + ?Sized,
{
    let inputs = collect_inputs(form.schema(), args)?;
    let total = inputs.len();
    let mut failures = 0usize;

    for (label, fields) in inputs {
        match assess_fields(service, form, &fields, lifetime.signal()).await {
            Ok(report) => print_report(&label, &report),
            Err(AssessmentError::Submission(SubmissionError::Cancelled)) => {
                return Err(SubmissionError::Cancelled.into());
            }
            Err(err) if total == 1 => return Err(err.into()),
            Err(err) => {
                failures += 1;
                eprintln!("[{label}] {err}");
            }
        }
    }

    info!(total, failures, "assessments finished");
    Ok(())
}

async fn assess_fields<S>(
    service: &AssessmentService<S>,
    form: FieldForm,
    fields: &Map<String, Value>,
    signal: AbortSignal,
) -> Result<AssessmentReport, AssessmentError>
where
    S: ScoringService + ?Sized,
{
    match form {
        FieldForm::Importer(method) => service.assess_importer(fields, method, signal).await,
        FieldForm::EndUser => service.assess_end_user(fields, signal).await,
        FieldForm::Future => service.assess_future(fields, signal).await,
    }
}

fn collect_inputs(
    schema: &'static FormSchema,
    args: FieldArgs,
) -> Result<Vec<(String, Map<String, Value>)>, AppError> {
    let Some(path) = args.csv else {
        let fields = args
            .fields
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        return Ok(vec![("input".to_string(), fields)]);
    };

    let rows = batch::parse_rows(File::open(&path)?)?;
    info!(path = %path.display(), rows = rows.len(), "batch loaded");
    rows.iter()
        .map(|row| Ok((format!("line {}", row.line), row_fields(schema, row)?)))
        .collect()
}

/// Resolve a CSV row's headers to field names and keep its non-blank cells.
fn row_fields(schema: &'static FormSchema, row: &BatchRow) -> Result<Map<String, Value>, AppError> {
    let mut form = FormState::new(schema);
    batch::apply_row(&mut form, row)?;
    Ok(form
        .fields()
        .iter()
        .filter(|field| !field.value.is_blank())
        .map(|field| (field.name.to_string(), field_json(&field.value)))
        .collect())
}

fn field_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Flag(flag) => Value::Bool(*flag),
        FieldValue::Number(number) => serde_json::Number::from_f64(*number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Text(text) => Value::String(text.clone()),
    }
}

pub(crate) fn print_report(label: &str, report: &AssessmentReport) {
    print!("[{label}] {}", report.view);
    if let Some(explanation) = &report.explanation {
        println!("  {} explanation:", explanation.method);
        for feature in &explanation.feature_importances {
            println!("    {:<40} {:+.4}", feature.feature, feature.importance);
        }
        if let Some(confidence) = explanation.model_confidence {
            println!("    model confidence {:.0}%", confidence * 100.0);
        }
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_method(raw: &str) -> Result<ExplanationMethod, String> {
    raw.parse::<ExplanationMethod>()
        .map_err(|err| err.to_string())
}

fn parse_chemical(raw: &str) -> Result<ChemicalInput, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(unit), Some(quantity), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected name:quantity:unit, got '{raw}'"));
    };
    let unit = unit
        .parse::<QuantityUnit>()
        .map_err(|err| err.to_string())?;
    Ok(ChemicalInput {
        name: name.trim().to_string(),
        quantity: FieldValue::from(quantity.trim()),
        unit,
    })
}
