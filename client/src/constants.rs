//! Client constants.
//!
//! API paths and fallback values used throughout the session client.

/// Message shown when the server does not provide one.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Required length of a two-factor verification code.
pub const TWO_FACTOR_CODE_LENGTH: usize = 6;

/// Authentication endpoint paths (relative to the API base path).
pub mod auth_paths {
    /// Password login.
    pub const LOGIN: &str = "/v1/auth/login";

    /// Account registration.
    pub const REGISTER: &str = "/v1/auth/register";

    /// Two-factor verification.
    pub const VERIFY_TWO_FACTOR: &str = "/v1/auth/2fa/verify";

    /// Access token refresh.
    pub const REFRESH: &str = "/v1/auth/refresh";

    /// Logout.
    pub const LOGOUT: &str = "/v1/auth/logout";

    /// Current user.
    pub const ME: &str = "/v1/auth/me";

    /// Paths that are never intercepted by refresh-and-retry.
    pub const NON_INTERCEPTED: [&str; 3] = [LOGIN, REFRESH, LOGOUT];
}
