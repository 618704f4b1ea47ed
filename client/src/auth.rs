//! Authentication flow.
//!
//! Login, two-factor verification, who-am-I, refresh, logout and
//! registration. Each call moves the [`SessionState`] machine right after
//! the matching credential store write.

use crate::client::{ApiRequest, SessionClient};
use crate::constants::{TWO_FACTOR_CODE_LENGTH, auth_paths};
use crate::credentials::CredentialStore;
use crate::error::{ClientError, Result};
use crate::session::{ExpiresIn, SessionState, TwoFactorChallenge, UserProfile};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

/// Token issued by login, refresh or two-factor verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,

    /// Token type, `"bearer"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Lifetime in seconds (number or numeric string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<ExpiresIn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum PendingStatus {
    #[serde(rename = "pending_2fa")]
    PendingTwoFactor,
}

/// Step-up answer to a login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingTwoFactorResponse {
    #[serde(rename = "status")]
    _status: PendingStatus,

    /// Challenge to answer with a verification code.
    pub challenge_id: String,

    /// Advertised challenge lifetime in seconds.
    #[serde(default)]
    pub ttl: u64,
}

/// Answer to a login request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    /// A second factor is required.
    PendingTwoFactor(PendingTwoFactorResponse),
    /// Login completed.
    Token(TokenResponse),
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: UserProfile,
}

/// Message-only answer (logout, registration).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Server message.
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    challenge_id: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Logged in; the profile was loaded.
    Authenticated(UserProfile),
    /// A verification code is required; see
    /// [`SessionClient::verify_two_factor`].
    TwoFactorRequired(TwoFactorChallenge),
}

/// Check a two-factor code before sending it.
///
/// # Errors
///
/// Returns `ClientError::Validation` unless `code` is exactly six characters.
///
/// # Examples
///
/// ```
/// # use admin_console_client::auth::validate_two_factor_code;
/// assert!(validate_two_factor_code("123456").is_ok());
/// assert!(validate_two_factor_code("123").is_err());
/// ```
pub fn validate_two_factor_code(code: &str) -> Result<()> {
    let length = code.chars().count();
    if length == 0 {
        return Err(ClientError::Validation("Verification code is required".to_string()));
    }
    if length != TWO_FACTOR_CODE_LENGTH {
        return Err(ClientError::Validation(format!(
            "Verification code must be {TWO_FACTOR_CODE_LENGTH} characters"
        )));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Flow
// ═══════════════════════════════════════════════════════════════════════

impl<S: CredentialStore> SessionClient<S> {
    /// Resume a session from the credential store.
    ///
    /// Returns `true` when a stored token moved the session to
    /// authenticated. The token is not validated; call [`me`](Self::me) for
    /// that.
    pub async fn restore(&self) -> bool {
        let Some(_token) = self.stored_token().await else {
            return false;
        };
        let now = self.now();
        self.update_session(|session| {
            if !session.is_authenticated() {
                session.set_credentials(None, now);
            }
        })
        .await;
        tracing::debug!("Session restored from credential store");
        true
    }

    /// Log in with email and password.
    ///
    /// Any previous session is discarded first. On a token answer the token
    /// is stored and the profile loaded; on a step-up answer the session
    /// waits for [`verify_two_factor`](Self::verify_two_factor).
    ///
    /// # Errors
    ///
    /// Returns the login failure (the session is then anonymous), or the
    /// profile failure after a successful login (the session is then torn
    /// down).
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        self.store().clear().await?;
        self.update_session(SessionState::begin_login).await;

        let request =
            ApiRequest::post(auth_paths::LOGIN).with_json(&LoginBody { email, password })?;
        let response = match self.send_json::<LoginResponse>(request).await {
            Ok(response) => response,
            Err(err) => {
                self.update_session(SessionState::fail_login).await;
                tracing::info!(error = %err, "Login failed");
                return Err(err);
            }
        };

        match response {
            LoginResponse::PendingTwoFactor(pending) => {
                let challenge =
                    TwoFactorChallenge::new(pending.challenge_id, pending.ttl, self.now());
                self.update_session(|session| session.set_two_factor(challenge.clone()))
                    .await;
                tracing::info!(
                    challenge_id = %challenge.challenge_id,
                    "Two-factor verification required"
                );
                Ok(LoginOutcome::TwoFactorRequired(challenge))
            }
            LoginResponse::Token(token) => {
                let profile = self.complete_login(token).await?;
                Ok(LoginOutcome::Authenticated(profile))
            }
        }
    }

    /// Answer the pending two-factor challenge.
    ///
    /// The code is validated locally before any network call. A rejected
    /// code keeps the challenge so the user can try again.
    ///
    /// # Errors
    ///
    /// - `ClientError::Validation` for a code that is not six characters
    /// - `ClientError::NoPendingChallenge` when no challenge is pending; an
    ///   unauthenticated session falls back to anonymous
    /// - the server rejection otherwise
    pub async fn verify_two_factor(&self, code: &str) -> Result<UserProfile> {
        validate_two_factor_code(code)?;

        let Some(challenge) = self.session().await.two_factor().cloned() else {
            // A stored token means the user is already in; leave that session alone.
            self.update_session(|session| {
                if !session.is_authenticated() {
                    session.clear_credentials();
                }
            })
            .await;
            return Err(ClientError::NoPendingChallenge);
        };

        let request = ApiRequest::post(auth_paths::VERIFY_TWO_FACTOR).with_json(&VerifyBody {
            challenge_id: &challenge.challenge_id,
            code,
        })?;
        let token = self.send_json::<TokenResponse>(request).await?;

        self.complete_login(token).await
    }

    /// Drop a pending two-factor challenge (the user left the verification
    /// step). Returns `true` if a challenge was pending.
    pub async fn abandon_two_factor(&self) -> bool {
        self.update_session(SessionState::abandon_two_factor).await
    }

    /// Load the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns the failure after tearing the session down: a session whose
    /// profile cannot be loaded is treated as invalid. Returns
    /// [`ClientError::Storage`] instead when the teardown itself fails.
    pub async fn me(&self) -> Result<UserProfile> {
        match self
            .send_json::<MeResponse>(ApiRequest::get(auth_paths::ME))
            .await
        {
            Ok(MeResponse { user }) => {
                self.update_session(|session| session.set_user(user.clone()))
                    .await;
                Ok(user)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session could not be validated");
                self.teardown().await?;
                Err(err)
            }
        }
    }

    /// Log out. The stored token and session are cleared whatever the
    /// server answers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] when the stored token could not be
    /// removed (the session then stays authenticated), otherwise the logout
    /// call failure (the session is cleared anyway).
    pub async fn logout(&self) -> Result<MessageResponse> {
        let result = self
            .send_json::<MessageResponse>(ApiRequest::post(auth_paths::LOGOUT))
            .await;
        self.teardown().await?;
        tracing::info!("Logged out");
        result
    }

    /// Register a new account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns the server rejection (e.g. validation errors).
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<MessageResponse> {
        let request = ApiRequest::post(auth_paths::REGISTER).with_json(&RegisterBody {
            name,
            email,
            password,
        })?;
        self.send_json(request).await
    }

    async fn complete_login(&self, token: TokenResponse) -> Result<UserProfile> {
        if token.access_token.is_empty() {
            self.update_session(SessionState::fail_login).await;
            return Err(ClientError::Decode(
                "login response did not include an access token".to_string(),
            ));
        }

        self.persist_token(&token.access_token, token.expires_in.as_ref())
            .await?;
        tracing::info!("Logged in");

        self.me().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_token_shape() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"bearer","expires_in":"3600"}"#,
        )
        .unwrap();
        let LoginResponse::Token(token) = response else {
            unreachable!("expected token response");
        };
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type.as_deref(), Some("bearer"));
        assert_eq!(token.expires_in, Some(ExpiresIn::Text("3600".to_string())));
    }

    #[test]
    fn test_login_response_pending_shape() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"status":"pending_2fa","challenge_id":"ch1","ttl":120}"#)
                .unwrap();
        let LoginResponse::PendingTwoFactor(pending) = response else {
            unreachable!("expected pending response");
        };
        assert_eq!(pending.challenge_id, "ch1");
        assert_eq!(pending.ttl, 120);
    }

    #[test]
    fn test_unknown_status_is_not_pending() {
        let response = serde_json::from_str::<LoginResponse>(
            r#"{"status":"locked","challenge_id":"ch1","ttl":120}"#,
        );
        assert!(response.is_err());
    }

    #[test]
    fn test_two_factor_code_validation() {
        assert!(validate_two_factor_code("123456").is_ok());
        assert!(validate_two_factor_code("abcdef").is_ok());
        assert!(matches!(
            validate_two_factor_code("123"),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            validate_two_factor_code("1234567"),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            validate_two_factor_code(""),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn test_two_factor_code_checks_length_only() {
        assert!(validate_two_factor_code("      ").is_ok());
        assert!(matches!(
            validate_two_factor_code("   "),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn test_message_response_defaults() {
        let response: MessageResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.message, "");
    }
}
