use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One row per email address. Every booking attempt upserts the
/// contact details, so the latest name/phone wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub created_at: NaiveDateTime,
}
