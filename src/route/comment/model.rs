use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A single comment on a post.
#[derive(Clone, Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Comment {
	/// The unique identifier of the comment.
	pub id: Uuid,
	/// The post the comment belongs to.
	pub post_id: Uuid,
	/// The comment this is a reply to, or `null` for root comments.
	pub parent_id: Option<Uuid>,
	/// The user that wrote the comment, or `null` if their account was deleted.
	pub author_id: Option<Uuid>,
	/// The content of the comment.
	pub content: String,
	/// The creation time of the comment.
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateCommentInput {
	/// The content of the comment.
	#[validate(length(min = 1, max = 10000))]
	pub content: String,
	/// The comment to reply to. It must belong to the same post.
	#[serde(default)]
	pub parent_id: Option<Uuid>,
}

/// A root comment together with all replies below it.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Thread {
	#[serde(flatten)]
	pub comment: Comment,
	/// Every reply in the thread, depth first with siblings oldest first.
	/// Replies always follow their parent, so they can be nested using `parent_id`.
	pub replies: Vec<Comment>,
}
