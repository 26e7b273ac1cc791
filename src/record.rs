// Finalized booking record handed to the submission gateway

use crate::quote::Quote;
use crate::reference::{CabinId, GuestId};
use crate::stay::StayRequest;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Occupancy status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    #[default]
    Unconfirmed,
    CheckedIn,
    CheckedOut,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Unconfirmed => "unconfirmed",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::CheckedOut => "checked-out",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unconfirmed" => Ok(BookingStatus::Unconfirmed),
            "checked-in" => Ok(BookingStatus::CheckedIn),
            "checked-out" => Ok(BookingStatus::CheckedOut),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub num_nights: u32,
    pub num_guests: u32,
    pub cabin_id: CabinId,
    pub guest_id: GuestId,
    pub has_breakfast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    // The store keeps prices in numeric columns
    #[serde(with = "rust_decimal::serde::float")]
    pub cabin_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub extras_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub is_paid: bool,
    pub status: BookingStatus,
}

impl BookingRecord {
    // Only the workflow builds records, and only from a validated request
    pub(crate) fn assemble(
        request: &StayRequest,
        quote: &Quote,
        is_paid: bool,
        status: BookingStatus,
    ) -> Self {
        Self {
            start_date: canonical_timestamp(request.start_date),
            end_date: canonical_timestamp(request.end_date),
            num_nights: quote.num_nights,
            num_guests: request.num_guests,
            cabin_id: request.cabin_id,
            guest_id: request.guest_id,
            has_breakfast: request.wants_breakfast,
            observations: request.observations.clone(),
            cabin_price: quote.cabin_charge,
            extras_price: quote.extras_charge,
            total_price: quote.total_charge,
            is_paid,
            status,
        }
    }
}

/// Midnight UTC of the given calendar day.
pub fn canonical_timestamp(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::default()).and_utc()
}
