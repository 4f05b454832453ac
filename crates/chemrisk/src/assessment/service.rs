use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::client::ScoringService;
use super::controller::{AssessmentForm, SubmissionController, SubmissionError};
use super::explanation::{ExplanationData, ExplanationError, ExplanationMethod, ExplanationPanel};
use super::form::{FormError, FormState};
use super::forms::end_user::END_USER_FORM;
use super::forms::future::FUTURE_FORM;
use super::forms::importer::{ImporterAssessment, IMPORTER_FORM};
use super::forms::recipe::{RecipeForm, RecipeSubmission};
use super::interpreter::RiskResult;
use super::lifetime::AbortSignal;
use super::payload;
use super::presentation::{self, RiskView};
use super::schema::{FormKind, FormSchema};

/// Outcome of one submitted form, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentReport {
    pub form: FormKind,
    pub result: RiskResult,
    pub view: RiskView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<ExplanationData>,
}

impl AssessmentReport {
    fn new(form: FormKind, result: RiskResult) -> Self {
        let view = presentation::render(form, &result);
        Self {
            form,
            result,
            view,
            explanation: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Explanation(#[from] ExplanationError),
}

/// Runs each submission on a fresh form instance against the shared scoring service.
pub struct AssessmentService<S: ?Sized> {
    scoring: Arc<S>,
    explanation_features: u8,
}

impl<S: ?Sized> Clone for AssessmentService<S> {
    fn clone(&self) -> Self {
        Self {
            scoring: Arc::clone(&self.scoring),
            explanation_features: self.explanation_features,
        }
    }
}

impl<S> AssessmentService<S>
where
    S: ScoringService + ?Sized,
{
    pub fn new(scoring: Arc<S>, explanation_features: u8) -> Self {
        Self {
            scoring,
            explanation_features,
        }
    }

    pub fn scoring(&self) -> &Arc<S> {
        &self.scoring
    }

    pub fn controller(&self, signal: AbortSignal) -> SubmissionController<S> {
        SubmissionController::new(Arc::clone(&self.scoring), signal)
    }

    /// Submit an already populated form.
    pub async fn submit<F>(
        &self,
        form: &mut F,
        signal: AbortSignal,
    ) -> Result<AssessmentReport, AssessmentError>
    where
        F: AssessmentForm + Send + ?Sized,
    {
        let controller = self.controller(signal);
        let result = controller.submit(form).await?;
        Ok(AssessmentReport::new(form.kind(), result))
    }

    /// Importer prediction. When `method` is given and the reply did not already carry
    /// that explanation, a second call fetches it; its failure leaves the prediction intact.
    pub async fn assess_importer(
        &self,
        fields: &Map<String, Value>,
        method: Option<ExplanationMethod>,
        signal: AbortSignal,
    ) -> Result<AssessmentReport, AssessmentError> {
        let mut form = ImporterAssessment::new(method.unwrap_or_default());
        form.form_mut().apply_json(fields)?;

        let controller = self.controller(signal);
        let result = controller.submit(&mut form).await?;
        let mut report = AssessmentReport::new(FormKind::Importer, result);

        let embedded = form
            .panel()
            .data()
            .filter(|data| method.map_or(true, |wanted| data.method == wanted))
            .cloned();
        report.explanation = match (embedded, method) {
            (Some(data), _) => Some(data),
            (None, Some(wanted)) => {
                match form
                    .explain(&controller, wanted, self.explanation_features)
                    .await
                {
                    Ok(data) => Some(data.clone()),
                    Err(err) => {
                        warn!(method = %wanted, error = %err, "prediction kept without explanation");
                        None
                    }
                }
            }
            (None, None) => None,
        };

        Ok(report)
    }

    /// Explanation of an importer submission without re-rendering the prediction.
    pub async fn explain_importer(
        &self,
        fields: &Map<String, Value>,
        method: ExplanationMethod,
        signal: AbortSignal,
    ) -> Result<ExplanationData, AssessmentError> {
        let mut form = FormState::new(&IMPORTER_FORM);
        form.apply_json(fields)?;
        let payload = payload::build(&IMPORTER_FORM, form.fields())
            .map_err(SubmissionError::ValidationFailed)?;

        let mut panel = ExplanationPanel::new(method);
        let data = panel
            .select_method(
                self.scoring.as_ref(),
                &payload,
                method,
                self.explanation_features,
                &signal,
            )
            .await?;
        info!(method = %method, features = data.feature_importances.len(), "explanation fetched");
        Ok(data.clone())
    }

    pub async fn assess_end_user(
        &self,
        fields: &Map<String, Value>,
        signal: AbortSignal,
    ) -> Result<AssessmentReport, AssessmentError> {
        self.assess_schema(&END_USER_FORM, fields, signal).await
    }

    pub async fn assess_future(
        &self,
        fields: &Map<String, Value>,
        signal: AbortSignal,
    ) -> Result<AssessmentReport, AssessmentError> {
        self.assess_schema(&FUTURE_FORM, fields, signal).await
    }

    pub async fn analyze_recipe(
        &self,
        submission: RecipeSubmission,
        signal: AbortSignal,
    ) -> Result<AssessmentReport, AssessmentError> {
        let mut form = RecipeForm::from_submission(submission);
        self.submit(&mut form, signal).await
    }

    async fn assess_schema(
        &self,
        schema: &'static FormSchema,
        fields: &Map<String, Value>,
        signal: AbortSignal,
    ) -> Result<AssessmentReport, AssessmentError> {
        let mut form = FormState::new(schema);
        form.apply_json(fields)?;
        self.submit(&mut form, signal).await
    }
}
