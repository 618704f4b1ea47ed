//! People resource endpoints.

use crate::client::{ApiRequest, SessionClient};
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::world::{City, Country, Currency, Region};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Identifier.
    pub id: u64,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Full name as formatted by the server.
    #[serde(default)]
    pub full_name: String,
    /// Email address.
    pub email: String,
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Citizenship number.
    pub citizenship_no: String,
    /// Country of residence.
    #[serde(default)]
    pub country: Option<Country>,
    /// State or province.
    #[serde(default)]
    pub state: Option<Region>,
    /// City.
    #[serde(default)]
    pub city: Option<City>,
    /// Preferred currency.
    #[serde(default)]
    pub currency: Option<Currency>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Body of `POST /v1/people`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Email address.
    pub email: String,
    /// Age in years.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Citizenship number.
    pub citizenship_no: String,
    /// Country identifier.
    pub country_id: u64,
    /// State identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<u64>,
    /// City identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_id: Option<u64>,
    /// Currency identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_id: Option<u64>,
}

/// Body of `PUT /v1/people/{id}`. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonUpdate {
    /// First name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Age in years.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Citizenship number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citizenship_no: Option<String>,
    /// Country identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_id: Option<u64>,
    /// State identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<u64>,
    /// City identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_id: Option<u64>,
    /// Currency identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_id: Option<u64>,
}

/// Sort order of the people list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeopleSort {
    /// By identifier.
    Id,
    /// By creation time.
    CreatedAt,
    /// By last name.
    LastName,
    /// By age.
    Age,
}

impl PeopleSort {
    /// Field name used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CreatedAt => "created_at",
            Self::LastName => "last_name",
            Self::Age => "age",
        }
    }

    /// Parse a field name such as `"last_name"`.
    #[must_use]
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "id" => Some(Self::Id),
            "created_at" => Some(Self::CreatedAt),
            "last_name" => Some(Self::LastName),
            "age" => Some(Self::Age),
            _ => None,
        }
    }
}

/// Sort field with direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortOrder {
    /// Field.
    pub field: PeopleSort,
    /// Descending when `true`.
    pub descending: bool,
}

impl SortOrder {
    /// Parse `"age"` or `"-age"`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (descending, field) = value
            .strip_prefix('-')
            .map_or((false, value), |field| (true, field));
        PeopleSort::parse(field).map(|field| Self { field, descending })
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field.as_str())
        } else {
            f.write_str(self.field.as_str())
        }
    }
}

/// Filters for the people list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleQuery {
    /// Free-text search.
    pub q: Option<String>,
    /// First name filter.
    pub first_name: Option<String>,
    /// Last name filter.
    pub last_name: Option<String>,
    /// Email filter.
    pub email: Option<String>,
    /// Citizenship number filter.
    pub citizenship_no: Option<String>,
    /// Country filter.
    pub country_id: Option<u64>,
    /// State filter.
    pub state_id: Option<u64>,
    /// City filter.
    pub city_id: Option<u64>,
    /// Currency filter.
    pub currency_id: Option<u64>,
    /// Minimum age.
    pub age_min: Option<u32>,
    /// Maximum age.
    pub age_max: Option<u32>,
    /// Sort order.
    pub sort: Option<SortOrder>,
    /// Page size.
    pub per_page: Option<u32>,
    /// Page number (1-based).
    pub page: Option<u32>,
}

impl PeopleQuery {
    /// Query pairs in the API's `filter[field]=value` convention.
    ///
    /// Empty strings are omitted.
    ///
    /// # Examples
    ///
    /// ```
    /// # use admin_console_client::people::PeopleQuery;
    /// let query = PeopleQuery {
    ///     last_name: Some("Lovelace".into()),
    ///     page: Some(2),
    ///     ..PeopleQuery::default()
    /// };
    /// assert_eq!(
    ///     query.to_pairs(),
    ///     vec![
    ///         ("filter[last_name]".to_string(), "Lovelace".to_string()),
    ///         ("page".to_string(), "2".to_string()),
    ///     ]
    /// );
    /// ```
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        let text_filters = [
            ("q", &self.q),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("citizenship_no", &self.citizenship_no),
        ];
        for (field, value) in text_filters {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((format!("filter[{field}]"), value.to_string()));
            }
        }

        let id_filters = [
            ("country_id", self.country_id),
            ("state_id", self.state_id),
            ("city_id", self.city_id),
            ("currency_id", self.currency_id),
            ("age_min", self.age_min.map(u64::from)),
            ("age_max", self.age_max.map(u64::from)),
        ];
        for (field, value) in id_filters {
            if let Some(value) = value {
                pairs.push((format!("filter[{field}]"), value.to_string()));
            }
        }

        if let Some(sort) = self.sort {
            pairs.push(("sort".to_string(), sort.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page".to_string(), per_page.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }

        pairs
    }
}

/// Pagination links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationLinks {
    /// First page URL.
    pub first: Option<String>,
    /// Last page URL.
    pub last: Option<String>,
    /// Previous page URL.
    pub prev: Option<String>,
    /// Next page URL.
    pub next: Option<String>,
}

/// One entry of the pager rendered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Target URL.
    pub url: Option<String>,
    /// Label ("1", "Next &raquo;", ...).
    pub label: String,
    /// Page number, when the link targets a page.
    #[serde(default)]
    pub page: Option<u32>,
    /// Current page marker.
    #[serde(default)]
    pub active: bool,
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Current page.
    pub current_page: u32,
    /// Index of the first item on the page.
    pub from: Option<u64>,
    /// Last page.
    pub last_page: u32,
    /// Pager links.
    #[serde(default)]
    pub links: Vec<PageLink>,
    /// Base path of the listing.
    #[serde(default)]
    pub path: String,
    /// Page size.
    pub per_page: u32,
    /// Index of the last item on the page.
    pub to: Option<u64>,
    /// Total item count.
    pub total: u64,
}

/// Paginated list answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Pagination links.
    #[serde(default)]
    pub links: Option<PaginationLinks>,
    /// Pagination metadata.
    #[serde(default)]
    pub meta: Option<PaginationMeta>,
}

#[derive(Debug, Deserialize)]
struct Item<T> {
    data: T,
}

/// Answer to `DELETE /v1/people/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Whether the record was deleted.
    #[serde(default)]
    pub success: bool,
}

fn person_path(id: u64) -> String {
    format!("/v1/people/{id}")
}

impl<S: CredentialStore> SessionClient<S> {
    /// List people.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn list_people(&self, query: &PeopleQuery) -> Result<Page<Person>> {
        let request = ApiRequest::get("/v1/people").with_query_pairs(query.to_pairs());
        self.send_json(request).await
    }

    /// Fetch one person.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn get_person(&self, id: u64) -> Result<Person> {
        let item: Item<Person> = self.send_json(ApiRequest::get(person_path(id))).await?;
        Ok(item.data)
    }

    /// Create a person.
    ///
    /// # Errors
    ///
    /// Returns the request failure; validation errors are available through
    /// [`ErrorPayload::field_errors`](crate::ErrorPayload::field_errors).
    pub async fn create_person(&self, person: &NewPerson) -> Result<Person> {
        let request = ApiRequest::post("/v1/people").with_json(person)?;
        let item: Item<Person> = self.send_json(request).await?;
        Ok(item.data)
    }

    /// Update a person.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn update_person(&self, id: u64, update: &PersonUpdate) -> Result<Person> {
        let request = ApiRequest::put(person_path(id)).with_json(update)?;
        let item: Item<Person> = self.send_json(request).await?;
        Ok(item.data)
    }

    /// Delete a person.
    ///
    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn delete_person(&self, id: u64) -> Result<DeleteResponse> {
        let value = self.send(ApiRequest::delete(person_path(id))).await?;
        // 204 No Content counts as success.
        if value.is_null() {
            return Ok(DeleteResponse { success: true });
        }
        serde_json::from_value(value).map_err(|e| crate::ClientError::Decode(e.to_string()))
    }
}
