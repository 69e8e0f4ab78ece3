use aide::axum::{
	routing::{delete_with, get_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{
	error::{self, ErrorShape},
	route::auth,
	AppState,
};

pub mod model;
pub mod route;
pub mod tree;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown_post")]
	UnknownPost(Uuid),
	#[error("unknown_comment")]
	UnknownComment(Uuid),
	#[error("parent_on_other_post")]
	ParentOnOtherPost,
	#[error(transparent)]
	Auth(#[from] auth::Error),
}

pub type RouteError = error::RouteError<Error>;

/// Routes that address a comment directly. Listing and creating comments
/// lives under the post they belong to.
pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/:id", delete_with(delete_comment, delete_comment_docs))
		.api_route("/:id/replies", get_with(get_replies, get_replies_docs))
}

impl ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) | Self::UnknownComment(..) => StatusCode::NOT_FOUND,
			Self::ParentOnOtherPost => StatusCode::BAD_REQUEST,
			Self::Auth(error) => error.status(),
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		match self {
			Self::UnknownPost(post) => error::Message::new("unknown_post")
				.detail("post", post.to_string())
				.into_vec(),
			Self::UnknownComment(comment) => error::Message::new("unknown_comment")
				.detail("comment", comment.to_string())
				.into_vec(),
			Self::ParentOnOtherPost => error::Message::new("parent_on_other_post")
				.field("parent_id")
				.into_vec(),
			Self::Auth(error) => error.into_errors(),
		}
	}
}
