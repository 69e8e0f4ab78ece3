use std::sync::Arc;

use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use macros::route;

use crate::{
	config::Config,
	extract::{Json, Session},
	notify::push::{self, Subscription},
	openapi::tag,
	Database,
};

use super::{model, Error, RouteError};

/// Get push key
/// Returns the VAPID public key browsers need to subscribe to push messages.
#[route(tag = tag::PUSH, response(status = 200, description = "The public key of the server.", shape = "Json<model::VapidKey>"))]
pub async fn get_key(State(config): State<Arc<Config>>) -> Result<impl IntoApiResponse, RouteError> {
	let private_key = config.vapid_key().ok_or(Error::Disabled)?;
	let vapid = push::vapid_key(private_key).map_err(Error::Key)?;

	Ok(Json(model::VapidKey {
		public_key: push::public_key(&vapid),
	}))
}

/// Subscribe to push notifications
/// Stores the browser push subscription of the authenticated user, replacing any previous one.
#[route(tag = tag::PUSH, response(status = 204, description = "The subscription was stored."))]
pub async fn subscribe(
	State(database): State<Database>,
	session: Session,
	Json(subscription): Json<Subscription>,
) -> Result<impl IntoApiResponse, RouteError> {
	let payload = serde_json::to_string(&subscription).map_err(Error::Encode)?;

	sqlx::query(
		r#"
			INSERT INTO push_subscription (user_id, payload, created_at)
			VALUES ($1, $2, $3)
			ON CONFLICT (user_id) DO UPDATE
			SET payload = excluded.payload, created_at = excluded.created_at
		"#,
	)
	.bind(session.user.id)
	.bind(payload)
	.bind(Utc::now())
	.execute(&database)
	.await?;

	tracing::debug!(user = %session.user.id, "stored push subscription");

	Ok(StatusCode::NO_CONTENT)
}

/// Unsubscribe from push notifications
/// Removes the push subscription of the authenticated user, if there is one.
#[route(tag = tag::PUSH, response(status = 204, description = "The subscription was removed."))]
pub async fn unsubscribe(
	State(database): State<Database>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	sqlx::query("DELETE FROM push_subscription WHERE user_id = $1")
		.bind(session.user.id)
		.execute(&database)
		.await?;

	Ok(StatusCode::NO_CONTENT)
}
