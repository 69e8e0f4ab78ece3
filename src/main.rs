#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod notify;
mod openapi;
mod route;
mod session;
mod token;
mod trace;

#[cfg(test)]
mod test;

use std::{net::SocketAddr, sync::Arc};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{body::Body, extract::FromRef, http::Request, Extension};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

use config::Config;

pub type Database = sqlx::Pool<sqlx::Sqlite>;
pub type AppState = State;

/// The shared application state.
///
/// This should contain all shared dependencies that handlers need to access,
/// such as a database connection pool, a hash configuration (if it's expensive to create),
/// or the sending half of the notification outbox.
#[derive(Clone, FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub signer: token::Signer,
	pub notifier: notify::Notifier,
	pub config: Arc<Config>,
}

#[derive(Debug, thiserror::Error)]
enum InitError {
	#[error("{0}")]
	Config(#[from] config::Error),
	#[error("failed to initialize tracing: {0}")]
	Trace(#[from] trace::Error),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("failed to run migrations: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	#[error("failed to set up mail transport: {0}")]
	Mail(#[from] notify::mail::Error),
	#[error("failed to set up push client: {0}")]
	Push(#[from] notify::push::Error),
	#[error("invalid secret key: {0}")]
	SecretKey(hmac::digest::InvalidLength),
	#[error("error binding tcp listener: {0}")]
	TcpBind(std::io::Error),
	#[error("error serving server: {0}")]
	TcpServe(std::io::Error),
}

/// Builds the application router, including the `OpenAPI` documentation.
pub fn app(state: State) -> axum::Router {
	let mut api = OpenApi::default();

	let router = ApiRouter::new()
		.nest("/auth", route::auth::routes())
		.nest("/posts", route::post::routes())
		.nest("/comments", route::comment::routes())
		.nest("/push", route::push::routes())
		.nest("/contact", route::contact::routes())
		.nest_api_service("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs);

	router
		.layer(Extension(Arc::new(api)))
		.layer(
			ServiceBuilder::new()
				.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
				.layer(
					TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
						let request_id = request
							.headers()
							.get("x-request-id")
							.and_then(|value| value.to_str().ok())
							.unwrap_or_default();

						tracing::info_span!(
							"request",
							method = %request.method(),
							uri = %request.uri(),
							request_id
						)
					}),
				)
				.layer(PropagateRequestIdLayer::x_request_id())
				.layer(CompressionLayer::new()),
		)
		.with_state(state)
}

async fn shutdown_signal() {
	if let Err(error) = tokio::signal::ctrl_c().await {
		tracing::error!(%error, "failed to listen for shutdown signal");
	}
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
	let config = Config::from_env()?;
	let _guard = trace::init_tracing_subscriber(config.otlp_enabled)?;

	let options = config
		.database_url
		.parse::<SqliteConnectOptions>()?
		.create_if_missing(true)
		.foreign_keys(true);

	let database = SqlitePoolOptions::new().connect_with(options).await?;

	sqlx::migrate!().run(&database).await?;

	let mailer = notify::mail::from_config(&config)?;
	let push = notify::push::from_config(&config)?;
	let (notifier, outbox) = notify::Notifier::new();

	let worker = tokio::spawn(notify::worker::run(
		outbox,
		Arc::from(mailer),
		Arc::from(push),
	));

	let address = SocketAddr::new(config.host, config.port);
	let state = State {
		database,
		hasher: Argon2::default(),
		signer: token::Signer::new(&config.secret_key).map_err(InitError::SecretKey)?,
		notifier,
		config: Arc::new(config),
	};

	let listener = tokio::net::TcpListener::bind(address)
		.await
		.map_err(InitError::TcpBind)?;

	tracing::info!(%address, "listening");

	axum::serve(listener, app(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(InitError::TcpServe)?;

	// The router held the last notifier, so the worker finishes once the outbox is drained
	if let Err(error) = worker.await {
		tracing::error!(%error, "notification worker panicked");
	}

	Ok(())
}
