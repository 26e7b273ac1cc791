// REST adapter for the hosted data store (PostgREST-style tables)
// Implements both external interfaces: reference reads and booking submission

use crate::config::StoreConfig;
use crate::gateway::{Confirmation, GatewayError, SubmissionGateway};
use crate::record::BookingRecord;
use crate::reference::{CabinRef, GuestRef, ReferenceDataProvider, ReferenceError, Settings};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REST_PREFIX: &str = "rest/v1";

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .context("store api key is not a valid header value")?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .context("store api key is not a valid header value")?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client for the store")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PREFIX, table)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, ReferenceError> {
        let url = self.table_url(table);
        tracing::debug!(%url, "fetching reference table");

        let response = self
            .client
            .get(&url)
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(|e| ReferenceError::Unavailable(format!("{}: {}", table, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReferenceError::Unavailable(format!(
                "{} returned {}: {}",
                table, status, body
            )));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| ReferenceError::Malformed(format!("{}: {}", table, e)))
    }

    fn transport_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout(self.timeout_ms)
        } else {
            GatewayError::Network(error.to_string())
        }
    }
}

pub fn rejection(status: StatusCode, body: String) -> GatewayError {
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        body
    };

    GatewayError::Rejected {
        status_code: status.as_u16(),
        message,
        is_retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
    }
}

#[async_trait]
impl ReferenceDataProvider for RestStore {
    async fn fetch_cabins(&self) -> Result<Vec<CabinRef>, ReferenceError> {
        self.select("cabins").await
    }

    async fn fetch_guests(&self) -> Result<Vec<GuestRef>, ReferenceError> {
        self.select("guests").await
    }

    async fn fetch_settings(&self) -> Result<Settings, ReferenceError> {
        self.select::<Settings>("settings")
            .await?
            .into_iter()
            .next()
            .ok_or(ReferenceError::MissingSettings)
    }
}

#[async_trait]
impl SubmissionGateway for RestStore {
    async fn submit(&self, record: &BookingRecord) -> Result<Confirmation, GatewayError> {
        let url = self.table_url("bookings");

        let response = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(&[record])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status, body));
        }

        let created: Vec<Confirmation> = response
            .json()
            .await
            .map_err(|e| GatewayError::Other(format!("unreadable confirmation: {}", e)))?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Other("store returned no booking row".to_string()))
    }
}
