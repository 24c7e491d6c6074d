//! Rally Core: record families, request outcomes, caller context, and the
//! monotonic clock shared by the Rally services.

pub mod clock;
pub mod context;
pub mod outcome;
pub mod records;
pub mod traits;
pub mod types;
pub mod validation;

pub use clock::{ClockSource, MonotonicClock, SystemClock};
pub use context::RequestContext;
pub use outcome::{ErrorKind, Outcome, Rejection, INTERNAL_MESSAGE};
pub use traits::{Entity, RecordKey};
pub use types::Principal;
pub use validation::{Checks, Validate, ValidationResult};
