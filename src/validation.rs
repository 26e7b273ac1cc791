// Business rules a stay must satisfy before it can be quoted
// Checks run in a fixed order and the first failure wins

use crate::reference::Settings;
use crate::stay::StayRequest;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Start date can not be before end date")]
    InvalidDateRange,

    #[error("Minimum nights per booking are {0}")]
    StayTooShort(u32),

    #[error("Maximum nights per booking are {0}")]
    StayTooLong(u32),

    #[error("{}", guest_limit_message(.0))]
    TooManyGuests(u32),

    #[error("A booking needs at least one guest")]
    NoGuests,
}

fn guest_limit_message(max_guests: &u32) -> String {
    if *max_guests == 1 {
        "Maximum guests is 1".to_string()
    } else {
        format!("Maximum guests are {}", max_guests)
    }
}

pub fn validate(request: &StayRequest, settings: &Settings) -> Result<(), ValidationError> {
    let num_nights = request.num_nights();

    if num_nights <= 0 {
        return Err(ValidationError::InvalidDateRange);
    }

    if num_nights < i64::from(settings.min_nights) {
        return Err(ValidationError::StayTooShort(settings.min_nights));
    }

    if num_nights > i64::from(settings.max_nights) {
        return Err(ValidationError::StayTooLong(settings.max_nights));
    }

    if request.num_guests > settings.max_guests {
        return Err(ValidationError::TooManyGuests(settings.max_guests));
    }

    if request.num_guests == 0 {
        return Err(ValidationError::NoGuests);
    }

    Ok(())
}
