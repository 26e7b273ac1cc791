// Quote engine: prices a stay from cabin rates, guest count and settings
// Pure and side-effect free, so it can be re-run on every draft edit

use crate::reference::{CabinId, CabinRef, GuestId, ReferenceSnapshot, Settings};
use crate::stay::StayRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Cabin {0} does not exist")]
    UnknownCabin(CabinId),

    #[error("Guest {0} does not exist")]
    UnknownGuest(GuestId),

    #[error("Charge for {0} nights exceeds the representable amount")]
    ChargeOverflow(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub num_nights: u32,
    pub cabin_charge: Decimal,
    pub extras_charge: Decimal,
    pub total_charge: Decimal,
}

impl Quote {
    fn new(
        num_nights: u32,
        cabin_charge: Decimal,
        extras_charge: Decimal,
    ) -> Result<Self, ResolutionError> {
        let total_charge = cabin_charge
            .checked_add(extras_charge)
            .ok_or(ResolutionError::ChargeOverflow(num_nights))?;

        Ok(Self {
            num_nights,
            cabin_charge,
            extras_charge,
            total_charge,
        })
    }

    /// Same stay without breakfast. Nights and cabin charge are kept as-is.
    pub fn without_extras(&self) -> Self {
        Self {
            num_nights: self.num_nights,
            cabin_charge: self.cabin_charge,
            extras_charge: Decimal::ZERO,
            total_charge: self.cabin_charge,
        }
    }

    pub fn has_extras(&self) -> bool {
        !self.extras_charge.is_zero()
    }
}

/// Resolves the cabin from the snapshot and prices the stay.
pub fn compute_quote(
    request: &StayRequest,
    snapshot: &ReferenceSnapshot,
) -> Result<Quote, ResolutionError> {
    let cabin = snapshot
        .cabin(request.cabin_id)
        .ok_or(ResolutionError::UnknownCabin(request.cabin_id))?;

    price_stay(request, cabin, &snapshot.settings)
}

/// Prices a stay against an already resolved cabin.
///
/// Inverted ranges price as zero nights; callers validate before quoting.
/// Charges beyond the decimal range come back as `ChargeOverflow`.
pub fn price_stay(
    request: &StayRequest,
    cabin: &CabinRef,
    settings: &Settings,
) -> Result<Quote, ResolutionError> {
    let num_nights = u32::try_from(request.num_nights().max(0)).unwrap_or(u32::MAX);
    let nights = Decimal::from(num_nights);
    let overflow = ResolutionError::ChargeOverflow(num_nights);

    let cabin_charge = cabin
        .discounted_rate()
        .checked_mul(nights)
        .ok_or_else(|| overflow.clone())?;

    let extras_charge = if request.wants_breakfast {
        nights
            .checked_mul(Decimal::from(request.num_guests))
            .and_then(|guest_nights| guest_nights.checked_mul(settings.breakfast_price))
            .ok_or(overflow)?
    } else {
        Decimal::ZERO
    };

    Quote::new(num_nights, cabin_charge, extras_charge)
}
