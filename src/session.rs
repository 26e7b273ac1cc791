// Booking session: the surrounding interactive context
// Captures reference data per booking and owns the caller-side retry policy

use crate::config::{BookingConfig, RetryConfig};
use crate::form::StayForm;
use crate::gateway::SubmissionGateway;
use crate::reference::{ReferenceDataProvider, ReferenceError, ReferenceSnapshot};
use crate::stay::StayRequest;
use crate::workflow::{BookingWorkflow, ConfirmOutcome, WorkflowError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Form(#[from] crate::form::FormError),
}

pub struct BookingSession {
    provider: Arc<dyn ReferenceDataProvider>,
    gateway: Arc<dyn SubmissionGateway>,
    config: BookingConfig,
}

impl BookingSession {
    pub fn new(
        provider: Arc<dyn ReferenceDataProvider>,
        gateway: Arc<dyn SubmissionGateway>,
        config: BookingConfig,
    ) -> Self {
        Self {
            provider,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Opens a workflow over a freshly captured snapshot of the reference data.
    pub async fn open(&self, request: StayRequest) -> Result<BookingWorkflow, SessionError> {
        let snapshot = ReferenceSnapshot::capture(self.provider.as_ref()).await?;

        Ok(BookingWorkflow::new(
            request,
            Arc::new(snapshot),
            self.gateway.clone(),
            self.config.workflow.clone(),
        ))
    }

    pub async fn open_form(&self, form: &StayForm) -> Result<BookingWorkflow, SessionError> {
        let request = StayRequest::try_from(form)?;
        self.open(request).await
    }

    /// Confirms, retrying retryable gateway failures with backoff.
    ///
    /// The workflow keeps its quote across attempts; only the last outcome is
    /// returned.
    pub async fn confirm_with_retry(
        &self,
        workflow: &BookingWorkflow,
    ) -> Result<ConfirmOutcome, WorkflowError> {
        confirm_with_retry(workflow, &self.config.retry).await
    }
}

pub async fn confirm_with_retry(
    workflow: &BookingWorkflow,
    retry: &RetryConfig,
) -> Result<ConfirmOutcome, WorkflowError> {
    let mut attempt = 0;
    loop {
        let outcome = workflow.confirm().await?;

        match &outcome {
            ConfirmOutcome::Failed(error) if error.is_retryable() && attempt < retry.max_retries => {
                let backoff = retry.backoff(attempt);
                tracing::info!(
                    workflow_id = workflow.id(),
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    %error,
                    "retrying booking submission"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            _ => return Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MemoryGateway};
    use crate::reference::fixtures::provider;
    use crate::reference::StaticReferenceData;
    use crate::workflow::PhaseKind;

    fn session(gateway: Arc<MemoryGateway>) -> BookingSession {
        let mut config = BookingConfig::default();
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 5;
        BookingSession::new(Arc::new(provider()), gateway, config)
    }

    fn form() -> StayForm {
        StayForm {
            start_date: "2025-06-01".to_string(),
            end_date: "2025-06-04".to_string(),
            num_guests: "2".to_string(),
            cabin_id: "1".to_string(),
            guest_id: "7".to_string(),
            wants_breakfast: true,
            observations: String::new(),
        }
    }

    #[tokio::test]
    async fn test_open_from_form_and_confirm() {
        let gateway = Arc::new(MemoryGateway::new());
        let session = session(gateway.clone());

        let workflow = session.open_form(&form()).await.unwrap();
        let quote = workflow.calculate_quote().unwrap();
        assert_eq!(quote.total_charge, rust_decimal::Decimal::from(360));

        let outcome = session.confirm_with_retry(&workflow).await.unwrap();
        assert!(matches!(outcome, ConfirmOutcome::Confirmed(_)));
        assert_eq!(gateway.records().len(), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_bad_form() {
        let session = session(Arc::new(MemoryGateway::new()));
        let bad = StayForm {
            num_guests: "many".to_string(),
            ..form()
        };

        let result = session.open_form(&bad).await;
        assert!(matches!(result, Err(SessionError::Form(_))));
    }

    #[tokio::test]
    async fn test_open_surfaces_reference_errors() {
        let provider = StaticReferenceData::without_settings(vec![], vec![]);
        let session = BookingSession::new(
            Arc::new(provider),
            Arc::new(MemoryGateway::new()),
            BookingConfig::default(),
        );

        let result = session.open_form(&form()).await;
        assert!(matches!(
            result,
            Err(SessionError::Reference(ReferenceError::MissingSettings))
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.fail_next_requests(2, GatewayError::Network("reset".to_string()));
        let session = session(gateway.clone());
        let workflow = session.open_form(&form()).await.unwrap();
        workflow.calculate_quote().unwrap();

        let outcome = session.confirm_with_retry(&workflow).await.unwrap();

        assert!(matches!(outcome, ConfirmOutcome::Confirmed(_)));
        assert_eq!(gateway.request_count(), 3);
        assert_eq!(gateway.records().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_failure() {
        let gateway = Arc::new(MemoryGateway::new());
        let error = GatewayError::Rejected {
            status_code: 409,
            message: "cabin already booked".to_string(),
            is_retryable: false,
        };
        gateway.fail_next_requests(5, error.clone());
        let session = session(gateway.clone());
        let workflow = session.open_form(&form()).await.unwrap();
        workflow.calculate_quote().unwrap();

        let outcome = session.confirm_with_retry(&workflow).await.unwrap();

        assert_eq!(outcome, ConfirmOutcome::Failed(error));
        assert_eq!(gateway.request_count(), 1);
        assert_eq!(workflow.phase(), PhaseKind::Failed);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.fail_next_requests(10, GatewayError::Timeout(100));
        let session = session(gateway.clone());
        let workflow = session.open_form(&form()).await.unwrap();
        workflow.calculate_quote().unwrap();

        let outcome = session.confirm_with_retry(&workflow).await.unwrap();

        assert_eq!(outcome, ConfirmOutcome::Failed(GatewayError::Timeout(100)));
        assert_eq!(gateway.request_count(), 4);
    }
}
