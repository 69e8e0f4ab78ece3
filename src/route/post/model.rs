pub use crate::route::model::PaginateInput;

use chrono::{DateTime, Utc};
use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A single blog post, written by an admin.
#[model]
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
pub struct Post {
	/// The unique identifier of the post.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The user that last wrote the post, or `null` if their account was deleted.
	#[serde(skip_deserializing)]
	pub author_id: Option<Uuid>,
	/// The title of the post. Titles are unique.
	#[validate(length(min = 1, max = 250))]
	pub title: String,
	/// A short line shown below the title.
	#[validate(length(min = 1, max = 250))]
	pub subtitle: String,
	/// The content of the post.
	#[validate(length(min = 1))]
	pub body: String,
	/// The URL of the header image.
	#[validate(url)]
	pub img_url: String,
	/// The publish time of the post.
	#[serde(skip_deserializing)]
	pub created_at: DateTime<Utc>,
}
