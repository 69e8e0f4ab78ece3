use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection::{PathRejection, QueryRejection},
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use axum_jsonschema::JsonSchemaRejection;
use schemars::JsonSchema;
use serde::Serialize;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A single error message that is sent to the client.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message {
	/// A short, machine-readable identifier of the error.
	pub content: Cow<'static, str>,
	/// The input field that caused the error, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'static, str>>,
	/// Additional structured information about the error.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Map>,
}

impl Message {
	pub fn new(content: impl Into<Cow<'static, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	#[must_use]
	pub fn field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	#[must_use]
	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(Map::new)
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

/// The body of every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
	pub success: bool,
	pub errors: Vec<Message>,
}

impl ErrorResponse {
	pub fn new(errors: Vec<Message>) -> Self {
		Self {
			success: false,
			errors,
		}
	}
}

/// Describes how a route-specific error is presented to the client.
pub trait ErrorShape: std::error::Error {
	fn status(&self) -> StatusCode;

	/// The messages sent to the client. Defaults to the [`std::fmt::Display`]
	/// implementation, so it must not contain sensitive information.
	fn into_errors(self) -> Vec<Message>
	where
		Self: Sized,
	{
		Message::new(self.to_string()).into_vec()
	}
}

/// Errors that can occur in any route.
///
/// The Display trait is not sent to the client, so it can show
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("invalid json body")]
	Json(JsonSchemaRejection),
	#[error("query error: {0}")]
	Query(#[from] QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] PathRejection),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

impl From<JsonSchemaRejection> for AppError {
	fn from(rejection: JsonSchemaRejection) -> Self {
		Self::Json(rejection)
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let (status, errors) = match self {
			Self::Validation(errors) => (
				StatusCode::BAD_REQUEST,
				errors
					.field_errors()
					.into_iter()
					.flat_map(|(field, errors)| {
						let field = field.to_string();

						errors
							.iter()
							.map(move |error| Message::new(error.code.clone()).field(field.clone()))
					})
					.collect(),
			),
			Self::Json(rejection) => return rejection.into_response(),
			Self::Query(rejection) => (
				rejection.status(),
				Message::new(rejection.body_text()).into_vec(),
			),
			Self::Path(rejection) => (
				rejection.status(),
				Message::new(rejection.body_text()).into_vec(),
			),
			Self::Database(error) => {
				tracing::error!(%error, "database error");

				(StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
			}
		};

		(status, Json(ErrorResponse::new(errors))).into_response()
	}
}

/// The error type returned by route handlers, wrapping either an
/// application-wide error or one specific to the route module.
#[derive(Debug)]
pub enum RouteError<E> {
	App(AppError),
	Route(E),
}

impl<E: ErrorShape> From<E> for RouteError<E> {
	fn from(error: E) -> Self {
		Self::Route(error)
	}
}

impl<E> From<AppError> for RouteError<E> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<E> From<sqlx::Error> for RouteError<E> {
	fn from(error: sqlx::Error) -> Self {
		Self::App(AppError::Database(error))
	}
}

impl<E: ErrorShape> IntoResponse for RouteError<E> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => {
				let status = error.status();

				if status.is_server_error() {
					tracing::error!(%error, "route error");
				} else {
					tracing::debug!(%error, "route error");
				}

				(status, Json(ErrorResponse::new(error.into_errors()))).into_response()
			}
		}
	}
}

impl<E> OperationOutput for RouteError<E> {
	type Inner = ErrorResponse;
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_message_details() {
		let message = Message::new("unknown_post")
			.field("id")
			.detail("post", "abc")
			.detail("count", 2);

		let value = serde_json::to_value(&message).unwrap();

		assert_eq!(value["content"], "unknown_post");
		assert_eq!(value["field"], "id");
		assert_eq!(value["details"]["post"], "abc");
		assert_eq!(value["details"]["count"], 2);
	}

	#[test]
	fn test_message_skips_empty_fields() {
		let value = serde_json::to_value(Message::new("forbidden")).unwrap();

		assert!(value.get("field").is_none());
		assert!(value.get("details").is_none());
	}
}
