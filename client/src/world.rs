//! Geographic and currency lookups.
//!
//! Read-only reference data used to fill the person form selectors.

use crate::client::{ApiRequest, SessionClient};
use crate::credentials::CredentialStore;
use crate::de::{opt_string_or_number, string_or_number};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// ISO 3166-1 alpha-2 code.
    #[serde(default)]
    pub iso2: Option<String>,
    /// ISO 3166-1 alpha-3 code.
    #[serde(default)]
    pub iso3: Option<String>,
}

/// State or province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning country.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub country_id: Option<String>,
}

/// City.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning state.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub state_id: Option<String>,
}

/// Currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// ISO 4217 code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Symbol, e.g. `₺`.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Country using the currency.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub country_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

impl<S: CredentialStore> SessionClient<S> {
    /// List all countries.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn countries(&self) -> Result<Vec<Country>> {
        self.list(ApiRequest::get("/v1/world/countries")).await
    }

    /// List the states of a country.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn states(&self, country_id: u64) -> Result<Vec<Region>> {
        self.list(ApiRequest::get(format!("/v1/world/countries/{country_id}/states")))
            .await
    }

    /// List the cities of a state.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn cities(&self, state_id: u64) -> Result<Vec<City>> {
        self.list(ApiRequest::get(format!("/v1/world/states/{state_id}/cities")))
            .await
    }

    /// List currencies, optionally only those used by a country.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn currencies(&self, country_id: Option<u64>) -> Result<Vec<Currency>> {
        let mut request = ApiRequest::get("/v1/world/currencies");
        if let Some(country_id) = country_id {
            request = request.with_query("country_id", country_id.to_string());
        }
        self.list(request).await
    }

    async fn list<T: serde::de::DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<T>> {
        let list: DataList<T> = self.send_json(request).await?;
        Ok(list.data)
    }
}
