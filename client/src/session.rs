//! In-memory session state.
//!
//! The session is an explicit state machine:
//!
//! ```text
//! Anonymous ──login──▶ Authenticating ──token──────▶ Authenticated
//!     ▲                     │                             │
//!     │                     └──pending_2fa──▶ PendingTwoFactor ──verify──▶ Authenticated
//!     │                                               │
//!     └─────── logout / refresh failure / abandon ────┘
//! ```
//!
//! The access token value never lives here. It is kept by the
//! [`CredentialStore`](crate::credentials::CredentialStore); this state only
//! records that a token exists, when it expires, and who it belongs to.

use crate::de::{one_or_many, string_or_number};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// User Profile
// ═══════════════════════════════════════════════════════════════════════

/// Authenticated user, as returned by `/v1/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Email address.
    pub email: String,

    /// Role names. The API sends either a single string or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub roles: Vec<String>,

    /// Permission names. The API sends either a single string or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub permissions: Vec<String>,
}

impl UserProfile {
    /// Returns `true` if the user holds any of `required`.
    ///
    /// An empty `required` list always passes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use admin_console_client::UserProfile;
    /// let user = UserProfile {
    ///     id: "1".into(),
    ///     name: "Ada".into(),
    ///     email: "ada@example.com".into(),
    ///     roles: vec!["editor".into()],
    ///     permissions: vec![],
    /// };
    /// assert!(user.has_any_role(&[]));
    /// assert!(user.has_any_role(&["admin", "editor"]));
    /// assert!(!user.has_any_role(&["admin"]));
    /// ```
    #[must_use]
    pub fn has_any_role(&self, required: &[&str]) -> bool {
        required.is_empty() || required.iter().any(|r| self.roles.iter().any(|own| own == r))
    }

    /// Returns `true` if the user holds `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Two-Factor Challenge
// ═══════════════════════════════════════════════════════════════════════

/// Step-up challenge issued by the server during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoFactorChallenge {
    /// Challenge identifier sent back with the verification code.
    pub challenge_id: String,

    /// Advertised time-to-live in seconds.
    pub ttl_seconds: u64,

    /// When the challenge was received.
    pub issued_at: DateTime<Utc>,
}

impl TwoFactorChallenge {
    /// Create a challenge received at `issued_at`.
    #[must_use]
    pub fn new(
        challenge_id: impl Into<String>,
        ttl_seconds: u64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            challenge_id: challenge_id.into(),
            ttl_seconds,
            issued_at,
        }
    }

    /// Seconds left on the advertised countdown, floored at zero.
    ///
    /// Display only: the server decides when a challenge has expired.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.issued_at).num_seconds().max(0) as u64;
        self.ttl_seconds.saturating_sub(elapsed)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session State
// ═══════════════════════════════════════════════════════════════════════

/// Token lifetime as sent by the API: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpiresIn {
    /// Seconds as a number.
    Seconds(f64),
    /// Seconds as a string, e.g. `"3600"`.
    Text(String),
}

/// Longest lifetime taken at face value (ten years).
const MAX_LIFETIME_SECONDS: f64 = 315_360_000.0;

impl ExpiresIn {
    /// Lifetime as a duration. Unparsable or negative values count as zero,
    /// longer ones are capped at ten years.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_duration(&self) -> Duration {
        let seconds = match self {
            Self::Seconds(value) => *value,
            Self::Text(value) => value.trim().parse::<f64>().unwrap_or(0.0),
        };
        if seconds.is_finite() && seconds > 0.0 {
            let millis = (seconds.min(MAX_LIFETIME_SECONDS) * 1000.0) as i64;
            Duration::try_milliseconds(millis).unwrap_or_else(Duration::zero)
        } else {
            Duration::zero()
        }
    }
}

/// Details of an authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Absolute expiry of the access token (informational only).
    pub expires_at: Option<DateTime<Utc>>,

    /// Profile loaded from `/v1/auth/me`.
    pub user: Option<UserProfile>,
}

/// Authentication phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthPhase {
    /// No token stored.
    #[default]
    Anonymous,

    /// Login request in flight.
    Authenticating,

    /// Login asked for a second factor.
    PendingTwoFactor(TwoFactorChallenge),

    /// Token stored.
    Authenticated(Credentials),
}

/// In-memory session state.
///
/// Mutations are crate-private: only the session client and the
/// authentication flow move the state machine, always right after the
/// matching credential store write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    phase: AuthPhase,
}

impl SessionState {
    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    /// Returns `true` when a token is stored.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.phase, AuthPhase::Authenticated(_))
    }

    /// Token expiry, when known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        match &self.phase {
            AuthPhase::Authenticated(credentials) => credentials.expires_at,
            _ => None,
        }
    }

    /// Authenticated user, once loaded.
    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        match &self.phase {
            AuthPhase::Authenticated(credentials) => credentials.user.as_ref(),
            _ => None,
        }
    }

    /// Pending two-factor challenge.
    #[must_use]
    pub const fn two_factor(&self) -> Option<&TwoFactorChallenge> {
        match &self.phase {
            AuthPhase::PendingTwoFactor(challenge) => Some(challenge),
            _ => None,
        }
    }

    /// Login request started.
    pub(crate) fn begin_login(&mut self) {
        self.phase = AuthPhase::Authenticating;
    }

    /// Login request failed.
    pub(crate) fn fail_login(&mut self) {
        if matches!(self.phase, AuthPhase::Authenticating) {
            self.phase = AuthPhase::Anonymous;
        }
    }

    /// A token was stored (login, refresh, 2FA verification or restore).
    ///
    /// Without `expires_in` the previous expiry is kept. The user profile of
    /// an already authenticated session survives a refresh. An expiry past
    /// the representable range is dropped.
    pub(crate) fn set_credentials(&mut self, expires_in: Option<&ExpiresIn>, now: DateTime<Utc>) {
        let previous = match std::mem::take(&mut self.phase) {
            AuthPhase::Authenticated(credentials) => credentials,
            _ => Credentials::default(),
        };

        let expires_at = expires_in.map_or(previous.expires_at, |lifetime| {
            now.checked_add_signed(lifetime.as_duration())
        });

        self.phase = AuthPhase::Authenticated(Credentials {
            expires_at,
            user: previous.user,
        });
    }

    /// The stored token was removed.
    pub(crate) fn clear_credentials(&mut self) {
        self.phase = AuthPhase::Anonymous;
    }

    /// Record the authenticated user. Ignored unless authenticated.
    pub(crate) fn set_user(&mut self, profile: UserProfile) -> bool {
        match &mut self.phase {
            AuthPhase::Authenticated(credentials) => {
                credentials.user = Some(profile);
                true
            }
            _ => false,
        }
    }

    /// Login answered with a step-up challenge.
    pub(crate) fn set_two_factor(&mut self, challenge: TwoFactorChallenge) {
        self.phase = AuthPhase::PendingTwoFactor(challenge);
    }

    /// Drop a pending challenge without completing it.
    pub(crate) fn abandon_two_factor(&mut self) -> bool {
        if matches!(self.phase, AuthPhase::PendingTwoFactor(_)) {
            self.phase = AuthPhase::Anonymous;
            true
        } else {
            false
        }
    }
}
