//! Dashboard endpoint.

use crate::client::{ApiRequest, SessionClient};
use crate::credentials::CredentialStore;
use crate::error::Result;
use serde_json::Value;

/// Path of the dashboard overview.
pub const OVERVIEW_PATH: &str = "/v1/dashboard/overview";

impl<S: CredentialStore> SessionClient<S> {
    /// Fetch the dashboard overview.
    ///
    /// The payload is free-form widget data and is returned as is.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn dashboard_overview(&self) -> Result<Value> {
        self.send(ApiRequest::get(OVERVIEW_PATH)).await
    }
}
