// Submission gateway: the boundary that durably records a booking
// Also hosts the authorization capability checked before anything is sent

use crate::record::BookingRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("No authorized user for this session")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Submission timeout after {0}ms")]
    Timeout(u64),

    #[error("Booking rejected: {status_code} - {message}")]
    Rejected {
        status_code: u16,
        message: String,
        is_retryable: bool,
    },

    #[error("Other error: {0}")]
    Other(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) => true,
            GatewayError::Rejected { is_retryable, .. } => *is_retryable,
            GatewayError::Unauthorized | GatewayError::Other(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    // The store answers with its own row names
    #[serde(alias = "id")]
    pub booking_id: u64,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    // At-most-once from the caller's side; retries are the caller's policy
    async fn submit(&self, record: &BookingRecord) -> Result<Confirmation, GatewayError>;
}

/// Answers "who may submit right now" for the surrounding session.
pub trait SessionAuthority: Send + Sync {
    fn authorized_user(&self) -> Option<String>;
}

// Fixed answer, for sessions where login already happened elsewhere
#[derive(Debug, Clone, Default)]
pub struct StaticAuthority {
    user: Option<String>,
}

impl StaticAuthority {
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl SessionAuthority for StaticAuthority {
    fn authorized_user(&self) -> Option<String> {
        self.user.clone()
    }
}

// Wraps a gateway with the authorization check
pub struct AuthorizedGateway<G> {
    inner: G,
    authority: Arc<dyn SessionAuthority>,
}

impl<G: SubmissionGateway> AuthorizedGateway<G> {
    pub fn new(inner: G, authority: Arc<dyn SessionAuthority>) -> Self {
        Self { inner, authority }
    }
}

#[async_trait]
impl<G: SubmissionGateway> SubmissionGateway for AuthorizedGateway<G> {
    async fn submit(&self, record: &BookingRecord) -> Result<Confirmation, GatewayError> {
        let Some(user) = self.authority.authorized_user() else {
            tracing::warn!(cabin_id = %record.cabin_id, "submission refused, no authorized user");
            return Err(GatewayError::Unauthorized);
        };

        tracing::debug!(%user, cabin_id = %record.cabin_id, "submitting booking");
        self.inner.submit(record).await
    }
}

/// In-process gateway that keeps accepted records in memory.
///
/// Can be told to fail the next N submissions or to delay every response,
/// which makes it useful for exercising retries and cancellation.
#[derive(Default)]
pub struct MemoryGateway {
    records: Mutex<Vec<(Confirmation, BookingRecord)>>,
    next_id: AtomicU64,
    request_count: AtomicUsize,
    fail_next_requests: AtomicUsize,
    delay_ms: AtomicU64,
    failure: Mutex<Option<GatewayError>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_requests(&self, count: usize, error: GatewayError) {
        *self.failure.lock() = Some(error);
        self.fail_next_requests.store(count, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<BookingRecord> {
        self.records
            .lock()
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }
}

#[async_trait]
impl SubmissionGateway for MemoryGateway {
    async fn submit(&self, record: &BookingRecord) -> Result<Confirmation, GatewayError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let should_fail = self
            .fail_next_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            let error = self
                .failure
                .lock()
                .clone()
                .unwrap_or_else(|| GatewayError::Other("simulated failure".to_string()));
            return Err(error);
        }

        let confirmation = Confirmation {
            booking_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            created_at: Utc::now(),
        };
        self.records
            .lock()
            .push((confirmation.clone(), record.clone()));

        Ok(confirmation)
    }
}

#[async_trait]
impl<G: SubmissionGateway + ?Sized> SubmissionGateway for Arc<G> {
    async fn submit(&self, record: &BookingRecord) -> Result<Confirmation, GatewayError> {
        (**self).submit(record).await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::quote::compute_quote;
    use crate::record::{BookingRecord, BookingStatus};
    use crate::reference::fixtures::snapshot;
    use crate::reference::{CabinId, GuestId};
    use crate::stay::{date, StayRequest};

    pub fn record() -> BookingRecord {
        let request = StayRequest::new(
            date("2025-06-01"),
            date("2025-06-04"),
            2,
            CabinId(1),
            GuestId(7),
        );
        let quote = compute_quote(&request, &snapshot()).unwrap();
        BookingRecord::assemble(&request, &quote, false, BookingStatus::Unconfirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[tokio::test]
    async fn test_memory_gateway_assigns_ids() {
        let gateway = MemoryGateway::new();

        let first = gateway.submit(&record()).await.unwrap();
        let second = gateway.submit(&record()).await.unwrap();

        assert_eq!(first.booking_id, 1);
        assert_eq!(second.booking_id, 2);
        assert_eq!(gateway.records().len(), 2);
        assert_eq!(gateway.request_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_gateway_fails_next_requests() {
        let gateway = MemoryGateway::new();
        gateway.fail_next_requests(2, GatewayError::Network("connection reset".to_string()));

        for _ in 0..2 {
            let result = gateway.submit(&record()).await;
            assert_eq!(
                result,
                Err(GatewayError::Network("connection reset".to_string()))
            );
        }
        tokio_test::assert_ok!(gateway.submit(&record()).await);
        assert_eq!(gateway.records().len(), 1);
        assert_eq!(gateway.request_count(), 3);
    }

    #[tokio::test]
    async fn test_authorized_gateway_requires_user() {
        let inner = Arc::new(MemoryGateway::new());
        let gateway = AuthorizedGateway::new(inner.clone(), Arc::new(StaticAuthority::anonymous()));

        let result = gateway.submit(&record()).await;
        assert_eq!(result, Err(GatewayError::Unauthorized));
        assert_eq!(inner.request_count(), 0);
    }

    #[tokio::test]
    async fn test_authorized_gateway_delegates() {
        let inner = Arc::new(MemoryGateway::new());
        let gateway = AuthorizedGateway::new(
            inner.clone(),
            Arc::new(StaticAuthority::signed_in("staff@wildoasis.test")),
        );

        tokio_test::assert_ok!(gateway.submit(&record()).await);
        assert_eq!(inner.records(), vec![record()]);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(GatewayError::Network("down".to_string()).is_retryable());
        assert!(GatewayError::Timeout(5000).is_retryable());
        assert!(GatewayError::Rejected {
            status_code: 503,
            message: "unavailable".to_string(),
            is_retryable: true,
        }
        .is_retryable());
        assert!(!GatewayError::Rejected {
            status_code: 409,
            message: "conflict".to_string(),
            is_retryable: false,
        }
        .is_retryable());
        assert!(!GatewayError::Unauthorized.is_retryable());
    }
}
