//! API models for clients.

use crate::api::models::pagination::Pagination;
use crate::db::models::clients::{ClientCreateDBRequest, ClientDBResponse};
use crate::types::{ClientId, Gender};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing clients
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListClientsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on the client name
    pub search: Option<String>,
}

/// Query parameters for the trends view
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct TrendsQuery {
    /// Number of biomarkers to display; defaults to the user's `trend_biomarker_count`
    #[param(minimum = 1, maximum = 24)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub display: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientCreate {
    #[schema(example = "Jane Doe")]
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Partial client update. `null` clears the date of birth or gender.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ClientUpdate {
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<Gender>)]
    pub gender: Option<Option<Gender>>,
}

impl From<ClientCreate> for ClientCreateDBRequest {
    fn from(create: ClientCreate) -> Self {
        Self {
            name: create.name,
            date_of_birth: create.date_of_birth,
            gender: create.gender,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ClientId,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientDBResponse> for ClientResponse {
    fn from(db: ClientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            date_of_birth: db.date_of_birth,
            gender: db.gender,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
