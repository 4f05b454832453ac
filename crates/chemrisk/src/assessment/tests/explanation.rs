use super::common::*;
use std::sync::Arc;

use serde_json::json;

use crate::assessment::client::Endpoint;
use crate::assessment::controller::{ErrorKind, SubmissionController};
use crate::assessment::explanation::{ExplanationError, ExplanationMethod};
use crate::assessment::forms::importer::ImporterAssessment;
use crate::assessment::lifetime::AbortSignal;

#[tokio::test]
async fn switching_method_issues_one_request_and_replaces_features() {
    let scoring = Arc::new(
        ScriptedScoring::replying(Endpoint::ImporterRisk, importer_reply())
            .with(Endpoint::ExplainShap, Scripted::Body(shap_reply())),
    );
    let controller = SubmissionController::new(Arc::clone(&scoring), AbortSignal::never());
    let mut form = filled_importer();
    controller.submit(&mut form).await.expect("prediction succeeds");

    let seeded = form.panel().data().expect("embedded lime explanation");
    assert_eq!(seeded.method, ExplanationMethod::Lime);
    assert_eq!(seeded.feature_importances.len(), 2);
    assert_eq!(seeded.model_confidence, Some(0.64));

    let data = form
        .explain(&controller, ExplanationMethod::Shap, 5)
        .await
        .expect("shap explanation");
    assert_eq!(data.method, ExplanationMethod::Shap);
    assert_eq!(data.feature_importances[0].feature, "importVolume");
    assert_eq!(data.feature_importances.len(), 3);

    let requests = scoring.calls_to(Endpoint::ExplainShap);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["num_features"], json!(5));
    assert_eq!(requests[0]["xai_method"], json!("shap"));
    assert!(requests[0].get("importerLicenseId").is_none());
    assert!(scoring.calls_to(Endpoint::ExplainLime).is_empty());
    assert_eq!(form.panel().method(), ExplanationMethod::Shap);
}

#[tokio::test]
async fn reselecting_the_same_method_fetches_again() {
    let scoring = Arc::new(
        ScriptedScoring::replying(Endpoint::ImporterRisk, json!({ "risk_category": "Risky" }))
            .with(Endpoint::ExplainShap, Scripted::Body(shap_reply())),
    );
    let controller = SubmissionController::new(Arc::clone(&scoring), AbortSignal::never());
    let mut form = ImporterAssessment::new(ExplanationMethod::Shap);
    form.form_mut()
        .apply_json(&importer_fields())
        .expect("fields apply");
    controller.submit(&mut form).await.expect("prediction succeeds");
    assert!(form.panel().data().is_none());

    for _ in 0..2 {
        form.explain(&controller, ExplanationMethod::Shap, 3)
            .await
            .expect("shap explanation");
    }
    assert_eq!(scoring.calls_to(Endpoint::ExplainShap).len(), 2);
}

#[tokio::test]
async fn explanation_needs_a_prediction_first() {
    let scoring = Arc::new(ScriptedScoring::default());
    let controller = SubmissionController::new(Arc::clone(&scoring), AbortSignal::never());
    let mut form = filled_importer();

    let outcome = form.explain(&controller, ExplanationMethod::Lime, 5).await;
    assert!(matches!(outcome, Err(ExplanationError::NoPrediction)));
    assert!(scoring.calls().is_empty());
}

#[tokio::test]
async fn failed_fetch_clears_the_previous_list() {
    let scoring = Arc::new(
        ScriptedScoring::replying(Endpoint::ImporterRisk, importer_reply())
            .with(Endpoint::ExplainShap, Scripted::Status(500)),
    );
    let controller = SubmissionController::new(Arc::clone(&scoring), AbortSignal::never());
    let mut form = filled_importer();
    controller.submit(&mut form).await.expect("prediction succeeds");
    assert!(form.panel().data().is_some());

    let outcome = form.explain(&controller, ExplanationMethod::Shap, 5).await;
    assert!(matches!(outcome, Err(ExplanationError::Scoring(_))));
    assert!(form.panel().data().is_none());
    assert!(form.panel().error().is_some());
    assert!(controller.view().result.is_some(), "prediction is independent");
}

#[tokio::test]
async fn unreadable_reply_leaves_no_explanation_behind() {
    let reply = json!({
        "xai_method": "lime",
        "xai_explanations": {
            "feature_importance": [{ "feature": "hsCode=280800", "importance": 0.4 }]
        }
    });
    let scoring = Arc::new(ScriptedScoring::replying(Endpoint::ImporterRisk, reply));
    let controller = SubmissionController::new(Arc::clone(&scoring), AbortSignal::never());
    let mut form = filled_importer();

    let err = controller.submit(&mut form).await.expect_err("no category");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(form.panel().data().is_none());

    let outcome = form.explain(&controller, ExplanationMethod::Lime, 5).await;
    assert!(matches!(outcome, Err(ExplanationError::NoPrediction)));
    assert!(scoring.calls_to(Endpoint::ExplainLime).is_empty());
}

#[tokio::test]
async fn failed_resubmission_forgets_the_previous_prediction() {
    let scoring = Arc::new(ScriptedScoring::replying(Endpoint::ImporterRisk, importer_reply()));
    let controller = SubmissionController::new(Arc::clone(&scoring), AbortSignal::never());
    let mut form = filled_importer();
    controller.submit(&mut form).await.expect("prediction succeeds");
    assert!(form.panel().data().is_some());

    scoring.set(Endpoint::ImporterRisk, Scripted::Status(500));
    let err = controller.submit(&mut form).await.expect_err("server error");
    assert_eq!(err.kind(), ErrorKind::RemoteError);
    assert!(form.panel().data().is_none());
    assert!(controller.view().result.is_none());

    let outcome = form.explain(&controller, ExplanationMethod::Lime, 5).await;
    assert!(matches!(outcome, Err(ExplanationError::NoPrediction)));
}
