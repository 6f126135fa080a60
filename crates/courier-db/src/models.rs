//! Database row types. These map directly to SQLite rows and stay distinct
//! from the courier-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct UserSummaryRow {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub is_edited: bool,
    pub created_at: String,
    pub updated_at: String,
}
