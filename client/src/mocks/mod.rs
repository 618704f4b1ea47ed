//! Mock implementations for testing.
//!
//! In-memory stand-ins for the credential store and the clock, for use in
//! unit and integration tests.

pub mod clock;
pub mod credentials;

pub use clock::{FixedClock, test_clock};
pub use credentials::{MockCredentialStore, StoreOp};
