use std::sync::Arc;
use std::time::Duration;

use chemrisk::assessment::presentation;
use chemrisk::assessment::{
    AssessmentService, ExplanationData, ExplanationMethod, FormKind, ImporterAssessment,
    QuantityUnit, RecipeForm, SubmissionController,
};
use chemrisk::error::AppError;
use clap::Args;
use serde_json::{json, Map, Value};

use crate::assess::{abort_on_ctrl_c, print_report};
use crate::infra::CannedScoringService;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Simulated scoring latency in milliseconds; Ctrl-C during a call aborts it
    #[arg(long, default_value_t = 0)]
    pub(crate) latency_ms: u64,
    /// Number of features requested for explanations
    #[arg(long, default_value_t = 5)]
    pub(crate) features: u8,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let scoring = Arc::new(CannedScoringService::with_latency(Duration::from_millis(
        args.latency_ms,
    )));
    let service = AssessmentService::new(Arc::clone(&scoring), args.features);
    let lifetime = abort_on_ctrl_c();

    println!("Chemical risk dashboard demo (offline scoring)\n");

    println!("Importer assessment, LIME explanation embedded in the prediction:");
    let controller = SubmissionController::new(Arc::clone(&scoring), lifetime.signal());
    let mut importer = ImporterAssessment::new(ExplanationMethod::Lime);
    importer
        .form_mut()
        .apply_json(&as_object(json!({
            "importerLicenseId": "IMP314",
            "hsCode": "280800",
            "chemicalName": "Nitric acid; sulphonitric acids",
            "countryOfOrigin": "India",
            "importationDescription": "Used in fertilizer manufacturing & explosives production",
            "complianceHistory": "Poor",
            "financialStability": "Low",
            "importFrequency": 12,
            "importVolume": 5400.5,
            "pastViolations": 2
        })))?;
    let result = controller.submit(&mut importer).await?;
    print!("  {}", presentation::render(FormKind::Importer, &result));
    if let Some(data) = importer.panel().data() {
        print_explanation(data);
    }

    println!("\nSwitching the explanation to SHAP:");
    match importer
        .explain(&controller, ExplanationMethod::Shap, args.features)
        .await
    {
        Ok(data) => print_explanation(data),
        Err(err) => println!("  explanation unavailable: {err}"),
    }

    println!("\nEnd-user purchase pattern:");
    let report = service
        .assess_end_user(
            &as_object(json!({
                "customer_name": "Borealis Chemicals",
                "product_code": "HP-50",
                "issued_qty": 1250,
                "transaction_date": "2024-05-02",
                "purchase_frequency": 9
            })),
            lifetime.signal(),
        )
        .await?;
    print_report("end-user", &report);

    println!("\nFuture risk trend:");
    let report = service
        .assess_future(
            &as_object(json!({
                "hs_code": "282619",
                "chemical_name": "Iodine",
                "country_of_origin": "Japan",
                "risk_category": "Low",
                "compliance_history": "Good",
                "financial_stability": "High",
                "import_frequency": 4,
                "import_quantity": 300,
                "compliance_score": 88.5,
                "past_violations": 0,
                "import_trend": -0.2
            })),
            lifetime.signal(),
        )
        .await?;
    print_report("future", &report);

    println!("\nRecipe analysis:");
    let mut recipe = RecipeForm::new();
    recipe.set_name(0, "Potassium nitrate")?;
    recipe.set_quantity(0, 75.0)?;
    recipe.add_chemical();
    recipe.set_name(1, "Sulfur")?;
    recipe.set_quantity(1, 10.0)?;
    recipe.add_chemical();
    recipe.set_name(2, "Charcoal")?;
    recipe.set_quantity(2, 15.0)?;
    recipe.set_unit(2, QuantityUnit::Grams)?;
    recipe.set_description("Classic black powder ratio");
    let report = service.submit(&mut recipe, lifetime.signal()).await?;
    print_report("recipe", &report);

    Ok(())
}

fn print_explanation(data: &ExplanationData) {
    println!("  {} feature importance:", data.method);
    for feature in &data.feature_importances {
        println!("    {:<32} {:+.3}", feature.feature, feature.importance);
    }
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
