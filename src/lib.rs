// Cabin booking core: quote-and-confirm workflow for new reservations

pub mod cache;
pub mod config;
pub mod form;
pub mod gateway;
pub mod quote;
pub mod record;
pub mod reference;
pub mod remote;
pub mod session;
pub mod stay;
pub mod validation;
pub mod workflow;

// Re-export key types for convenience
pub use cache::{CacheStatsReport, CachedReferenceData, ReferenceKind};
pub use config::{BookingConfig, CacheConfig, RetryConfig, StoreConfig, WorkflowConfig};
pub use form::{FormError, StayForm};
pub use gateway::{
    AuthorizedGateway, Confirmation, GatewayError, MemoryGateway, SessionAuthority,
    StaticAuthority, SubmissionGateway,
};
pub use quote::{compute_quote, price_stay, Quote, ResolutionError};
pub use record::{BookingRecord, BookingStatus};
pub use reference::{
    CabinId, CabinRef, GuestId, GuestRef, ReferenceDataProvider, ReferenceError,
    ReferenceSnapshot, Settings, StaticReferenceData,
};
pub use remote::RestStore;
pub use session::{BookingSession, SessionError};
pub use stay::StayRequest;
pub use validation::{validate, ValidationError};
pub use workflow::{BookingWorkflow, ConfirmOutcome, PhaseKind, StayEdit, WorkflowError};
