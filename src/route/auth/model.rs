use chrono::{DateTime, Utc};
use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A single user.
#[model]
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
pub struct User {
	/// The unique identifier of the user.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The name that is displayed next to the user's posts and comments.
	#[validate(length(min = 1, max = 100))]
	pub name: String,
	/// The user's email address, used for logging in, password resets and notifications.
	#[validate(email)]
	pub email: String,
	/// The hashed password.
	#[serde(skip)]
	pub password: Vec<u8>,
	/// Whether the user may manage posts and delete any comment.
	/// Only the first registered user is an admin.
	#[serde(skip_deserializing)]
	pub is_admin: bool,
	/// Whether the user receives emails about new posts and replies.
	pub notify_by_email: bool,
	/// The creation time of the user.
	#[serde(skip_deserializing)]
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Session {
	/// The session id.
	#[serde(rename = "session_id")]
	pub id: Uuid,
	/// The user that owns the session.
	pub user_id: Uuid,
	/// The creation time of the session.
	pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 1, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	/// The name that is displayed to the public.
	#[validate(length(min = 1, max = 100))]
	pub name: String,
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// Whether the site rules were accepted. Recorded by the client, not enforced.
	#[serde(default)]
	#[allow(dead_code)]
	pub accept_rules: bool,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct ResetRequestInput {
	#[validate(email)]
	pub email: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct ResetCompleteInput {
	/// The token from the password reset email.
	#[validate(length(min = 1))]
	pub token: String,
	/// The new password.
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// The new password, repeated.
	pub confirm: String,
}
