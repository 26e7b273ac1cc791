// Boundary adapter for string-typed form input
// Coerces ids, guest counts and HTML date values into a StayRequest

use crate::reference::{CabinId, GuestId};
use crate::stay::StayRequest;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("This field is required: {0}")]
    MissingField(&'static str),

    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid date for {field}: '{value}'")]
    InvalidDate { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StayForm {
    pub start_date: String,
    pub end_date: String,
    pub num_guests: String,
    pub cabin_id: String,
    pub guest_id: String,
    pub wants_breakfast: bool,
    pub observations: String,
}

impl TryFrom<&StayForm> for StayRequest {
    type Error = FormError;

    fn try_from(form: &StayForm) -> Result<Self, Self::Error> {
        let observations = form.observations.trim();

        Ok(StayRequest {
            start_date: parse_date("startDate", &form.start_date)?,
            end_date: parse_date("endDate", &form.end_date)?,
            num_guests: parse_number("numGuests", &form.num_guests)?,
            cabin_id: CabinId(parse_number("cabinId", &form.cabin_id)?),
            guest_id: GuestId(parse_number("guestId", &form.guest_id)?),
            wants_breakfast: form.wants_breakfast,
            observations: (!observations.is_empty()).then(|| observations.to_string()),
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::MissingField(field));
    }
    Ok(value)
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, FormError> {
    let value = required(field, value)?;
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| FormError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, FormError> {
    let value = required(field, value)?;
    value.parse().map_err(|_| FormError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
