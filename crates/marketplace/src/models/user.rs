//! Marketplace user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmstand_core::{Location, UserId};

/// A consumer or producer account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    /// Default origin for radius searches.
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub location: Option<Location>,
}
