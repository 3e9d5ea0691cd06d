//! API models for analyses and the confirmation step of an upload.

use crate::api::models::clients::{ClientCreate, ClientResponse};
use crate::api::models::pagination::Pagination;
use crate::db::models::analyses::AnalysisDBResponse;
use crate::types::{AnalysisId, Biomarker, ClientId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Query parameters for listing analyses
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAnalysesQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only analyses of this client
    #[param(value_type = Option<String>, format = "uuid")]
    pub client_id: Option<ClientId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AnalysisId,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    pub lab_test_date: Option<NaiveDate>,
    pub source_filename: Option<String>,
    pub biomarkers: Vec<Biomarker>,
    pub created_at: DateTime<Utc>,
}

impl From<AnalysisDBResponse> for AnalysisResponse {
    fn from(db: AnalysisDBResponse) -> Self {
        Self {
            id: db.id,
            client_id: db.client_id,
            lab_test_date: db.lab_test_date,
            source_filename: db.source_filename,
            biomarkers: db.biomarkers,
            created_at: db.created_at,
        }
    }
}

/// Which client a confirmed analysis belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClientSelection {
    /// Id of one of the user's existing clients
    Existing(Uuid),
    /// Create the client as part of the confirmation
    New(ClientCreate),
}

/// Body of `POST /api/v1/analyses`: the (possibly edited) extraction and the user's decision
/// about the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisConfirm {
    pub client: ClientSelection,
    pub lab_test_date: Option<NaiveDate>,
    pub source_filename: Option<String>,
    pub biomarkers: Vec<Biomarker>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmedAnalysisResponse {
    pub analysis: AnalysisResponse,
    pub client: ClientResponse,
    /// Whether the client was created by this confirmation
    pub client_created: bool,
}
