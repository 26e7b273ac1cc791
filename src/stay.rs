// Stay request as entered by staff for a new reservation

use crate::reference::{CabinId, GuestId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_guests: u32,
    pub cabin_id: CabinId,
    pub guest_id: GuestId,
    pub wants_breakfast: bool,
    pub observations: Option<String>,
}

impl StayRequest {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        num_guests: u32,
        cabin_id: CabinId,
        guest_id: GuestId,
    ) -> Self {
        Self {
            start_date,
            end_date,
            num_guests,
            cabin_id,
            guest_id,
            wants_breakfast: false,
            observations: None,
        }
    }

    pub fn with_breakfast(mut self, wants_breakfast: bool) -> Self {
        self.wants_breakfast = wants_breakfast;
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    // Whole days between the dates; negative when the range is inverted
    pub fn num_nights(&self) -> i64 {
        nights_between(self.start_date, self.end_date)
    }
}

pub fn nights_between(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days()
}

#[cfg(test)]
pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}
