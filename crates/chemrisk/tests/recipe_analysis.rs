use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chemrisk::assessment::{
    AssessmentForm, AssessmentService, ChemicalInput, Endpoint, FieldValue, FormLifetime,
    QuantityUnit, RecipeForm, RecipeSubmission, ScoringClientError, ScoringService,
    SubmissionController, SubmissionError, Tone,
};
use serde_json::{json, Value};

struct FakeAnalyzer {
    reply: Value,
    requests: Mutex<Vec<(Endpoint, Value)>>,
}

impl FakeAnalyzer {
    fn new(reply: Value) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<(Endpoint, Value)> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

#[async_trait]
impl ScoringService for FakeAnalyzer {
    async fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ScoringClientError> {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .push((endpoint, body.clone()));
        Ok(self.reply.clone())
    }
}

fn scored_reply() -> Value {
    json!({
        "explosiveness": 82.0,
        "health_risk": 64.5,
        "risk_score": 77.0,
        "overall_risk_level": "High"
    })
}

#[tokio::test]
async fn recipe_rows_are_serialized_in_order_with_units() {
    let analyzer = Arc::new(FakeAnalyzer::new(scored_reply()));
    let lifetime = FormLifetime::new();
    let controller = SubmissionController::new(Arc::clone(&analyzer), lifetime.signal());

    let mut form = RecipeForm::new();
    form.set_name(0, "Potassium nitrate").expect("first row");
    form.set_quantity(0, "250").expect("first row");
    form.set_unit(0, QuantityUnit::Grams).expect("first row");
    form.add_chemical();
    form.set_name(1, "Sugar").expect("second row");
    form.set_quantity(1, "0.5").expect("second row");
    form.set_unit(1, QuantityUnit::Kilograms).expect("second row");
    form.set_description("Smoke composition for a school demo");

    let result = controller.submit(&mut form).await.expect("analysis succeeds");
    assert_eq!(result.label, "High");
    assert_eq!(result.risk_percentage, Some(77));

    let requests = analyzer.requests();
    assert_eq!(requests.len(), 1);
    let (endpoint, body) = &requests[0];
    assert_eq!(*endpoint, Endpoint::Analyze);
    assert_eq!(
        body,
        &json!({
            "chemicals": [
                { "name": "Potassium nitrate", "quantity": 250.0, "unit": "g" },
                { "name": "Sugar", "quantity": 0.5, "unit": "kg" }
            ],
            "description": "Smoke composition for a school demo"
        })
    );
}

#[tokio::test]
async fn incomplete_rows_are_reported_per_chemical() {
    let analyzer = Arc::new(FakeAnalyzer::new(scored_reply()));
    let lifetime = FormLifetime::new();
    let controller = SubmissionController::new(Arc::clone(&analyzer), lifetime.signal());

    let mut form = RecipeForm::new();
    form.set_name(0, "Acetone").expect("first row");
    form.set_quantity(0, "1").expect("first row");
    form.add_chemical();
    form.set_quantity(1, "lots").expect("second row");

    match controller.submit(&mut form).await {
        Err(SubmissionError::ValidationFailed(errors)) => {
            assert_eq!(
                errors.get("chemicals.1.name"),
                Some("Chemical 2 name is required")
            );
            assert_eq!(
                errors.get("chemicals.1.quantity"),
                Some("Chemical 2 quantity must be a valid number")
            );
            assert!(!errors.contains("chemicals.0.name"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(analyzer.requests().is_empty());
    assert_eq!(form.errors().len(), 2);
}

#[tokio::test]
async fn service_renders_indicators_and_recommendation() {
    let analyzer = Arc::new(FakeAnalyzer::new(scored_reply()));
    let service = AssessmentService::new(Arc::clone(&analyzer), 5);
    let lifetime = FormLifetime::new();

    let submission = RecipeSubmission {
        chemicals: vec![ChemicalInput {
            name: "Hydrogen peroxide".to_string(),
            quantity: FieldValue::Number(30.0),
            unit: QuantityUnit::Millilitres,
        }],
        description: None,
    };
    let report = service
        .analyze_recipe(submission, lifetime.signal())
        .await
        .expect("analysis succeeds");

    let labels = report
        .view
        .indicators
        .iter()
        .map(|indicator| (indicator.label, indicator.tone))
        .collect::<Vec<_>>();
    assert_eq!(
        labels,
        vec![
            ("Explosiveness", Tone::Danger),
            ("Health Risk", Tone::Warning),
            ("Overall Risk", Tone::Danger),
        ]
    );
    assert!(report
        .view
        .recommendation
        .is_some_and(|text| text.contains("potentially hazardous")));
    assert_eq!(report.result.raw_input["chemicals"], json!(["Hydrogen peroxide"]));
}

#[test]
fn recipe_form_reports_its_wiring() {
    let form = RecipeForm::new();
    assert_eq!(form.endpoint(), Endpoint::Analyze);
    assert_eq!(form.rows().len(), 1);
}
