//! # Admin Console Session Client
//!
//! Authenticated HTTP session layer for the admin console REST API.
//!
//! ## Overview
//!
//! - **Session client**: attaches the stored bearer token to every request,
//!   refreshes it once when the API answers 401 (concurrent failures share
//!   that refresh) and replays the failed requests with the new token.
//! - **Credential store**: one token string under a storage key, persisted
//!   in a JSON file.
//! - **Session state**: explicit phase machine
//!   (`Anonymous → Authenticating → PendingTwoFactor | Authenticated`).
//! - **Resources**: typed people, world lookup and dashboard calls.
//!
//! ## Example
//!
//! ```no_run
//! use admin_console_client::{ClientConfig, LoginOutcome, SessionClient};
//! use admin_console_client::people::PeopleQuery;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SessionClient::from_config(ClientConfig::from_env()?)?;
//!
//!     match client.login("admin@example.com", "secret").await? {
//!         LoginOutcome::Authenticated(user) => println!("Welcome {}", user.name),
//!         LoginOutcome::TwoFactorRequired(_) => {
//!             client.verify_two_factor("123456").await?;
//!         }
//!     }
//!
//!     let page = client.list_people(&PeopleQuery::default()).await?;
//!     println!("{} people", page.data.len());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod auth;
pub mod client;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dashboard;
mod de;
pub mod environment;
pub mod error;
pub mod people;
pub mod session;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use auth::{LoginOutcome, MessageResponse, TokenResponse};
pub use client::{ApiRequest, SessionClient};
pub use config::{ClientConfig, ConfigError};
pub use credentials::{CredentialStore, FileCredentialStore};
pub use error::{ClientError, ErrorPayload, Result};
pub use session::{AuthPhase, Credentials, ExpiresIn, SessionState, TwoFactorChallenge, UserProfile};
