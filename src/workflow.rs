// Booking workflow: Draft -> Quoted -> Submitting -> Confirmed | Failed
//
// One instance per booking being created. The phase decides which fields may
// change; the stay-defining ones are frozen as soon as a quote exists so the
// record that reaches the gateway always matches the quote shown to staff.

use crate::config::WorkflowConfig;
use crate::gateway::{Confirmation, GatewayError, SubmissionGateway};
use crate::quote::{compute_quote, Quote, ResolutionError};
use crate::record::{BookingRecord, BookingStatus};
use crate::reference::{CabinId, GuestId, ReferenceSnapshot};
use crate::stay::StayRequest;
use crate::validation::{validate, ValidationError};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Draft,
    Quoted,
    Submitting,
    Confirmed,
    Failed,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Draft => "draft",
            PhaseKind::Quoted => "quoted",
            PhaseKind::Submitting => "submitting",
            PhaseKind::Confirmed => "confirmed",
            PhaseKind::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{field} can not be changed while the booking is {phase}")]
    FieldLocked {
        field: &'static str,
        phase: PhaseKind,
    },

    #[error("Can not {action} while the booking is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: PhaseKind,
    },
}

impl WorkflowError {
    /// Message suitable for showing to staff.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

// A single field change requested by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StayEdit {
    Dates { start: NaiveDate, end: NaiveDate },
    Guests(u32),
    Cabin(CabinId),
    Guest(GuestId),
    Breakfast(bool),
    Observations(Option<String>),
    Paid(bool),
    Status(BookingStatus),
}

impl StayEdit {
    pub fn field(&self) -> &'static str {
        match self {
            StayEdit::Dates { .. } => "dates",
            StayEdit::Guests(_) => "numGuests",
            StayEdit::Cabin(_) => "cabinId",
            StayEdit::Guest(_) => "guestId",
            StayEdit::Breakfast(_) => "hasBreakfast",
            StayEdit::Observations(_) => "observations",
            StayEdit::Paid(_) => "isPaid",
            StayEdit::Status(_) => "status",
        }
    }

    // Fields that feed the quote; frozen outside Draft
    pub fn is_stay_defining(&self) -> bool {
        matches!(
            self,
            StayEdit::Dates { .. }
                | StayEdit::Guests(_)
                | StayEdit::Cabin(_)
                | StayEdit::Guest(_)
                | StayEdit::Breakfast(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed(Confirmation),
    Failed(GatewayError),
    // Another confirm is already waiting on the gateway
    InFlight,
}

#[derive(Debug, Clone)]
enum Phase {
    Draft {
        preview: Option<Quote>,
    },
    Quoted {
        quote: Quote,
    },
    Submitting {
        quote: Quote,
    },
    Confirmed {
        quote: Quote,
        record: BookingRecord,
        confirmation: Confirmation,
    },
    Failed {
        quote: Quote,
        error: GatewayError,
    },
}

impl Phase {
    fn kind(&self) -> PhaseKind {
        match self {
            Phase::Draft { .. } => PhaseKind::Draft,
            Phase::Quoted { .. } => PhaseKind::Quoted,
            Phase::Submitting { .. } => PhaseKind::Submitting,
            Phase::Confirmed { .. } => PhaseKind::Confirmed,
            Phase::Failed { .. } => PhaseKind::Failed,
        }
    }

    fn quote(&self) -> Option<&Quote> {
        match self {
            Phase::Draft { .. } => None,
            Phase::Quoted { quote }
            | Phase::Submitting { quote }
            | Phase::Confirmed { quote, .. }
            | Phase::Failed { quote, .. } => Some(quote),
        }
    }
}

#[derive(Debug)]
struct State {
    request: StayRequest,
    is_paid: bool,
    status: BookingStatus,
    phase: Phase,
}

// Process-wide so log lines from concurrent workflows stay distinguishable
static NEXT_WORKFLOW_ID: AtomicU32 = AtomicU32::new(1);

pub struct BookingWorkflow {
    id: u32,
    snapshot: Arc<ReferenceSnapshot>,
    gateway: Arc<dyn SubmissionGateway>,
    config: WorkflowConfig,
    state: Mutex<State>,
}

impl BookingWorkflow {
    pub fn new(
        request: StayRequest,
        snapshot: Arc<ReferenceSnapshot>,
        gateway: Arc<dyn SubmissionGateway>,
        config: WorkflowConfig,
    ) -> Self {
        let preview = preview_quote(&request, &snapshot);
        let id = NEXT_WORKFLOW_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(workflow_id = id, "booking workflow opened");

        Self {
            id,
            snapshot,
            gateway,
            config,
            state: Mutex::new(State {
                request,
                is_paid: false,
                status: BookingStatus::default(),
                phase: Phase::Draft { preview },
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn phase(&self) -> PhaseKind {
        self.state.lock().phase.kind()
    }

    pub fn request(&self) -> StayRequest {
        self.state.lock().request.clone()
    }

    pub fn snapshot(&self) -> &ReferenceSnapshot {
        &self.snapshot
    }

    pub fn is_paid(&self) -> bool {
        self.state.lock().is_paid
    }

    pub fn status(&self) -> BookingStatus {
        self.state.lock().status
    }

    /// Quote fixed by the last successful `calculate_quote`, if still valid.
    pub fn quote(&self) -> Option<Quote> {
        self.state.lock().phase.quote().cloned()
    }

    /// Live price preview while in Draft. `None` while the draft is not quotable.
    pub fn preview(&self) -> Option<Quote> {
        match &self.state.lock().phase {
            Phase::Draft { preview } => preview.clone(),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<GatewayError> {
        match &self.state.lock().phase {
            Phase::Failed { error, .. } => Some(error.clone()),
            _ => None,
        }
    }

    pub fn confirmation(&self) -> Option<(Confirmation, BookingRecord)> {
        match &self.state.lock().phase {
            Phase::Confirmed {
                record,
                confirmation,
                ..
            } => Some((confirmation.clone(), record.clone())),
            _ => None,
        }
    }

    pub fn apply(&self, edit: StayEdit) -> Result<(), WorkflowError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let phase = state.phase.kind();

        let allowed = match phase {
            PhaseKind::Draft => true,
            PhaseKind::Quoted => !edit.is_stay_defining(),
            PhaseKind::Submitting | PhaseKind::Confirmed | PhaseKind::Failed => false,
        };
        if !allowed {
            return Err(WorkflowError::FieldLocked {
                field: edit.field(),
                phase,
            });
        }

        let breakfast_dropped = edit == StayEdit::Breakfast(false);
        match edit {
            StayEdit::Dates { start, end } => {
                state.request.start_date = start;
                state.request.end_date = end;
            }
            StayEdit::Guests(num_guests) => state.request.num_guests = num_guests,
            StayEdit::Cabin(cabin_id) => state.request.cabin_id = cabin_id,
            StayEdit::Guest(guest_id) => state.request.guest_id = guest_id,
            StayEdit::Breakfast(wants) => state.request.wants_breakfast = wants,
            StayEdit::Observations(observations) => state.request.observations = observations,
            StayEdit::Paid(is_paid) => state.is_paid = is_paid,
            StayEdit::Status(status) => state.status = status,
        }

        if let Phase::Draft { preview } = &mut state.phase {
            *preview = if breakfast_dropped {
                preview.as_ref().map(Quote::without_extras)
            } else {
                preview_quote(&state.request, &self.snapshot)
            };
        }

        Ok(())
    }

    /// Validates the draft and fixes its quote. Moves Draft -> Quoted.
    ///
    /// A rejected draft stays in Draft and the reason is returned.
    pub fn calculate_quote(&self) -> Result<Quote, WorkflowError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !matches!(state.phase, Phase::Draft { .. }) {
            return Err(WorkflowError::InvalidTransition {
                action: "calculate a quote",
                phase: state.phase.kind(),
            });
        }

        let quote = match quote_request(&state.request, &self.snapshot) {
            Ok(quote) => quote,
            Err(error) => {
                tracing::debug!(workflow_id = self.id, %error, "draft rejected");
                return Err(error);
            }
        };

        tracing::info!(
            workflow_id = self.id,
            cabin_id = %state.request.cabin_id,
            num_nights = quote.num_nights,
            total = %quote.total_charge,
            "booking quoted"
        );
        state.phase = Phase::Quoted {
            quote: quote.clone(),
        };
        Ok(quote)
    }

    /// Unlocks the stay fields again. The fixed quote is discarded.
    pub fn edit_entries(&self) -> Result<(), WorkflowError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.phase {
            Phase::Quoted { .. } | Phase::Failed { .. } => {
                state.phase = Phase::Draft {
                    preview: preview_quote(&state.request, &self.snapshot),
                };
                tracing::debug!(workflow_id = self.id, "back to draft");
                Ok(())
            }
            ref other => Err(WorkflowError::InvalidTransition {
                action: "edit entries",
                phase: other.kind(),
            }),
        }
    }

    /// Failed -> Quoted, keeping the quote, so payment and status can be edited.
    pub fn dismiss_failure(&self) -> Result<(), WorkflowError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match &state.phase {
            Phase::Failed { quote, .. } => {
                state.phase = Phase::Quoted {
                    quote: quote.clone(),
                };
                Ok(())
            }
            other => Err(WorkflowError::InvalidTransition {
                action: "dismiss a failure",
                phase: other.kind(),
            }),
        }
    }

    /// Builds the booking record and hands it to the gateway.
    ///
    /// Accepted from Quoted and from Failed (retry with the same quote). While
    /// a submission is pending, further calls return `InFlight` without
    /// touching the gateway. Dropping the returned future before it resolves
    /// puts the workflow back in Quoted.
    pub async fn confirm(&self) -> Result<ConfirmOutcome, WorkflowError> {
        let (record, quote) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let quote = match &state.phase {
                Phase::Quoted { quote } | Phase::Failed { quote, .. } => quote.clone(),
                Phase::Submitting { .. } => {
                    tracing::debug!(workflow_id = self.id, "confirm ignored, submission in flight");
                    return Ok(ConfirmOutcome::InFlight);
                }
                other => {
                    return Err(WorkflowError::InvalidTransition {
                        action: "confirm",
                        phase: other.kind(),
                    })
                }
            };

            let record = BookingRecord::assemble(&state.request, &quote, state.is_paid, state.status);
            state.phase = Phase::Submitting {
                quote: quote.clone(),
            };
            (record, quote)
        };

        let mut in_flight = InFlight {
            workflow_id: self.id,
            state: &self.state,
            armed: true,
        };

        let result = match tokio::time::timeout(
            self.config.submit_timeout(),
            self.gateway.submit(&record),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.config.submit_timeout_ms)),
        };
        in_flight.armed = false;

        let mut state = self.state.lock();
        match result {
            Ok(confirmation) => {
                tracing::info!(
                    workflow_id = self.id,
                    booking_id = confirmation.booking_id,
                    "booking confirmed"
                );
                state.phase = Phase::Confirmed {
                    quote,
                    record,
                    confirmation: confirmation.clone(),
                };
                Ok(ConfirmOutcome::Confirmed(confirmation))
            }
            Err(error) => {
                tracing::warn!(workflow_id = self.id, %error, "booking submission failed");
                state.phase = Phase::Failed {
                    quote,
                    error: error.clone(),
                };
                Ok(ConfirmOutcome::Failed(error))
            }
        }
    }
}

// Reverts Submitting -> Quoted if the confirm future is dropped mid-flight
struct InFlight<'a> {
    workflow_id: u32,
    state: &'a Mutex<State>,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Phase::Submitting { quote } = &state.phase {
            tracing::warn!(workflow_id = self.workflow_id, "submission cancelled");
            state.phase = Phase::Quoted {
                quote: quote.clone(),
            };
        }
    }
}

fn quote_request(
    request: &StayRequest,
    snapshot: &ReferenceSnapshot,
) -> Result<Quote, WorkflowError> {
    validate(request, &snapshot.settings)?;
    if snapshot.guest(request.guest_id).is_none() {
        return Err(ResolutionError::UnknownGuest(request.guest_id).into());
    }
    Ok(compute_quote(request, snapshot)?)
}

fn preview_quote(request: &StayRequest, snapshot: &ReferenceSnapshot) -> Option<Quote> {
    quote_request(request, snapshot).ok()
}
