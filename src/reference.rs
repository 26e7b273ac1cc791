// Reference data: cabins, guests and global booking settings
// Read-only from the booking core's point of view; fetched from the data store once per workflow

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("Reference data unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed reference data: {0}")]
    Malformed(String),

    #[error("Settings not configured")]
    MissingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CabinId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(pub u64);

impl fmt::Display for CabinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CabinRef {
    pub id: CabinId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "regularPrice")]
    pub nightly_rate: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

impl CabinRef {
    /// Nightly rate after discount, never below zero.
    pub fn discounted_rate(&self) -> Decimal {
        self.nightly_rate
            .saturating_sub(self.discount)
            .max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRef {
    pub id: GuestId,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "minBookingLength")]
    pub min_nights: u32,
    #[serde(rename = "maxBookingLength")]
    pub max_nights: u32,
    #[serde(rename = "maxGuestsPerBooking")]
    pub max_guests: u32,
    #[serde(rename = "breakfastPrice")]
    pub breakfast_price: Decimal,
}

impl Settings {
    // Catches rows that would make every request fail validation
    pub fn check(&self) -> Result<(), ReferenceError> {
        if self.min_nights == 0 || self.max_nights < self.min_nights {
            return Err(ReferenceError::Malformed(format!(
                "stay length bounds {}..={} are invalid",
                self.min_nights, self.max_nights
            )));
        }
        if self.max_guests == 0 {
            return Err(ReferenceError::Malformed(
                "max guests per booking must be at least 1".to_string(),
            ));
        }
        if self.breakfast_price.is_sign_negative() {
            return Err(ReferenceError::Malformed(
                "breakfast price must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// Provider of reference data (the remote data store in production)
#[async_trait]
pub trait ReferenceDataProvider: Send + Sync {
    async fn fetch_cabins(&self) -> Result<Vec<CabinRef>, ReferenceError>;

    async fn fetch_guests(&self) -> Result<Vec<GuestRef>, ReferenceError>;

    async fn fetch_settings(&self) -> Result<Settings, ReferenceError>;
}

/// Immutable view of the reference data captured for one workflow instance.
///
/// Later changes in the store are not reconciled; the next workflow captures
/// a fresh snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSnapshot {
    pub cabins: Vec<CabinRef>,
    pub guests: Vec<GuestRef>,
    pub settings: Settings,
    pub captured_at: DateTime<Utc>,
}

impl ReferenceSnapshot {
    pub fn new(cabins: Vec<CabinRef>, guests: Vec<GuestRef>, settings: Settings) -> Self {
        Self {
            cabins,
            guests,
            settings,
            captured_at: Utc::now(),
        }
    }

    pub async fn capture<P>(provider: &P) -> Result<Self, ReferenceError>
    where
        P: ReferenceDataProvider + ?Sized,
    {
        let (cabins, guests, settings) = futures::try_join!(
            provider.fetch_cabins(),
            provider.fetch_guests(),
            provider.fetch_settings()
        )?;
        settings.check()?;

        tracing::debug!(
            cabins = cabins.len(),
            guests = guests.len(),
            "captured reference snapshot"
        );

        Ok(Self::new(cabins, guests, settings))
    }

    pub fn cabin(&self, id: CabinId) -> Option<&CabinRef> {
        self.cabins.iter().find(|cabin| cabin.id == id)
    }

    pub fn guest(&self, id: GuestId) -> Option<&GuestRef> {
        self.guests.iter().find(|guest| guest.id == id)
    }
}

// In-memory provider, handy for tests and offline sessions
#[derive(Debug, Clone)]
pub struct StaticReferenceData {
    cabins: Vec<CabinRef>,
    guests: Vec<GuestRef>,
    settings: Option<Settings>,
}

impl StaticReferenceData {
    pub fn new(cabins: Vec<CabinRef>, guests: Vec<GuestRef>, settings: Settings) -> Self {
        Self {
            cabins,
            guests,
            settings: Some(settings),
        }
    }

    pub fn without_settings(cabins: Vec<CabinRef>, guests: Vec<GuestRef>) -> Self {
        Self {
            cabins,
            guests,
            settings: None,
        }
    }
}

#[async_trait]
impl ReferenceDataProvider for StaticReferenceData {
    async fn fetch_cabins(&self) -> Result<Vec<CabinRef>, ReferenceError> {
        Ok(self.cabins.clone())
    }

    async fn fetch_guests(&self) -> Result<Vec<GuestRef>, ReferenceError> {
        Ok(self.guests.clone())
    }

    async fn fetch_settings(&self) -> Result<Settings, ReferenceError> {
        self.settings.clone().ok_or(ReferenceError::MissingSettings)
    }
}
