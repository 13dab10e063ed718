//! Wire types for client requests/responses and the durable record shapes
//! that back `commits`, `users`, and `messages`.

use serde::{Deserialize, Serialize};

/// A client-originated command. `id` is the sole idempotency key: it is
/// persisted in the commit log and checked on every incoming request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(flatten)]
    pub body: RequestBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "request_type")]
pub enum RequestBody {
    #[serde(rename = "CREATE_USER")]
    CreateUser { username: String, password_hash: String },

    #[serde(rename = "LOGIN")]
    Login { username: String, password_hash: String },

    #[serde(rename = "GET_MESSAGES")]
    GetMessages { username: String },

    #[serde(rename = "LIST_USERS")]
    ListUsers { pattern: String },

    #[serde(rename = "SEND_MESSAGE")]
    SendMessage { message: MessageInput },

    #[serde(rename = "READ_MESSAGES")]
    ReadMessages { message_ids: Vec<String> },

    #[serde(rename = "DELETE_MESSAGES")]
    DeleteMessages { message_ids: Vec<String> },

    #[serde(rename = "DELETE_USER")]
    DeleteUser { username: String },
}

impl RequestBody {
    /// Whether applying this request mutates `users`/`messages` and therefore
    /// needs a `commits` append. LOGIN, GET_MESSAGES, and LIST_USERS are
    /// read-only and never reach the commit log.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            RequestBody::CreateUser { .. }
                | RequestBody::SendMessage { .. }
                | RequestBody::ReadMessages { .. }
                | RequestBody::DeleteMessages { .. }
                | RequestBody::DeleteUser { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInput {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub timestamp: f64,
    #[serde(default)]
    pub read: bool,
}

/// A stored message row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub timestamp: f64,
    #[serde(rename = "read")]
    #[sqlx(rename = "read_flag")]
    pub read_flag: bool,
}

/// A stored user row. `password_hash` is opaque to the core — hashing
/// happens client-side.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

/// A durably stored `(seq, request_blob)` pair — the unit of replication.
/// `seq` is local to the node that assigned it; only `request_id` carries
/// cross-node meaning (see `SPEC_FULL.md` §4.4a).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commit {
    pub seq: i64,
    pub request_id: String,
    pub request_blob: String,
}

/// Response envelope returned by the Request Applier. Mirrors the donor
/// pattern of one flat struct with request-type-specific optional fields
/// rather than a tagged enum, so handlers only populate what they produce.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Response {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usernames: Option<Vec<String>>,
    /// Set on a deduplicated (already-seen) request: distinguishes a no-op
    /// retry response from the original OK, per P1.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub duplicate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

impl Response {
    pub fn ok() -> Self {
        Response { status: Status::Ok, ..Default::default() }
    }

    pub fn duplicate() -> Self {
        Response { status: Status::Ok, duplicate: true, ..Default::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response {
            status: Status::Error,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Response { status: Status::Ok, messages: Some(messages), ..Default::default() }
    }

    pub fn with_usernames(usernames: Vec<String>) -> Self {
        Response { status: Status::Ok, usernames: Some(usernames), ..Default::default() }
    }
}
