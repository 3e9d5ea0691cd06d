//! Database models for clients.

use crate::types::{ClientId, Gender, UserId};
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for creating a new client
#[derive(Debug, Clone)]
pub struct ClientCreateDBRequest {
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Database request for updating a client. The nested options distinguish "leave alone" from
/// "clear".
#[derive(Debug, Clone, Default)]
pub struct ClientUpdateDBRequest {
    pub name: Option<String>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub gender: Option<Option<Gender>>,
}

/// Database response for a client
#[derive(Debug, Clone)]
pub struct ClientDBResponse {
    pub id: ClientId,
    pub user_id: UserId,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
