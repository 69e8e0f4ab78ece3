//! Helpers shared by the route tests.

use std::{collections::HashMap, str::FromStr, sync::Arc};

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{Duration, Utc};
use axum_test::TestServer;
use cookie::Cookie;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub use serde_json::json;

use crate::{
	config::Config,
	notify::{self, Delivery, Notifier},
	session, token, Database, State,
};

pub const PASSWORD: &str = "hunter2hunter";

/// A cheap hasher, so that tests do not spend most of their time in Argon2.
pub fn hasher() -> Argon2<'static> {
	Argon2::new(
		Algorithm::Argon2id,
		Version::V0x13,
		Params::new(1024, 1, 1, Some(32)).unwrap(),
	)
}

/// A fresh application with its own in-memory database.
pub struct TestApp {
	pub server: TestServer,
	pub database: Database,
	outbox: UnboundedReceiver<Delivery>,
}

/// Signing key for push messages in tests.
pub const VAPID_PRIVATE_KEY: &str = "IQ9Ur0ykXoHS9gzfYX0aBjy9lvdrjx_PFUXmie9YRcY";

pub const CONTACT_ADDRESS: &str = "owner@example.com";

pub async fn app() -> TestApp {
	app_with(&[], hasher()).await
}

/// Like [`app`], with extra environment variables and a custom hasher.
pub async fn app_with(env: &[(&str, &str)], hasher: Argon2<'static>) -> TestApp {
	// Every in-memory connection is its own database, so there must be exactly one
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.unwrap()
		.foreign_keys(true);

	let database = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await
		.unwrap();

	sqlx::migrate!().run(&database).await.unwrap();

	let defaults = [
		("SECRET_KEY", "test"),
		("CONTACT_ADDRESS", CONTACT_ADDRESS),
		("VAPID_PRIVATE_KEY", VAPID_PRIVATE_KEY),
	];

	// Later values win, so `env` overrides the defaults
	let config: Config = envy::from_iter(
		defaults
			.iter()
			.chain(env)
			.map(|(key, value)| (key.to_string(), value.to_string()))
			.collect::<HashMap<_, _>>(),
	)
	.unwrap();
	let (notifier, outbox) = Notifier::new();

	let state = State {
		database: database.clone(),
		hasher,
		signer: token::Signer::new(&config.secret_key).unwrap(),
		notifier,
		config: Arc::new(config),
	};

	TestApp {
		server: TestServer::new(crate::app(state)).unwrap(),
		database,
		outbox,
	}
}

pub fn post_body(title: &str) -> Value {
	json!({
		"title": title,
		"subtitle": "A subtitle",
		"body": "Some body text",
		"img_url": "https://example.com/image.png",
	})
}

pub fn subscription(endpoint: &str) -> Value {
	json!({
		"endpoint": endpoint,
		"keys": {
			"p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM",
			"auth": "tBHItJI5svbpez7KI4CCXg",
		},
	})
}

impl TestApp {
	/// Registers a user with [`PASSWORD`] and returns their session cookie.
	pub async fn register(&self, name: &str, email: &str) -> Cookie<'static> {
		let response = self
			.server
			.post("/auth/register")
			.json(&json!({
				"name": name,
				"email": email,
				"password": PASSWORD,
				"accept_rules": true,
			}))
			.await;

		assert_eq!(response.status_code(), 200, "{}", response.text());

		response.cookie(session::COOKIE_NAME)
	}

	pub async fn me(&self, cookie: Cookie<'static>) -> Value {
		let response = self.server.get("/auth/me").add_cookie(cookie).await;

		assert_eq!(response.status_code(), 200, "{}", response.text());

		response.json()
	}

	/// Creates a post as the given user and returns its id.
	pub async fn create_post(&self, cookie: Cookie<'static>, title: &str) -> String {
		let response = self
			.server
			.post("/posts")
			.add_cookie(cookie)
			.json(&post_body(title))
			.await;

		assert_eq!(response.status_code(), 200, "{}", response.text());

		id(&response.json())
	}

	/// Comments on a post as the given user and returns the id of the comment.
	pub async fn comment(
		&self,
		cookie: Cookie<'static>,
		post: &str,
		content: &str,
		parent: Option<&str>,
	) -> String {
		let response = self
			.server
			.post(&format!("/posts/{post}/comments"))
			.add_cookie(cookie)
			.json(&json!({ "content": content, "parent_id": parent }))
			.await;

		assert_eq!(response.status_code(), 200, "{}", response.text());

		id(&response.json())
	}

	/// Inserts a chain of `depth` comments on a post, each replying to the one
	/// before, and returns the id of the first.
	pub async fn reply_chain(&self, post: &str, depth: usize) -> String {
		let post_id = Uuid::parse_str(post).unwrap();
		let root = Uuid::new_v4();
		let start = Utc::now();
		let mut transaction = self.database.begin().await.unwrap();
		let mut parent = None;

		for (index, id) in std::iter::once(root)
			.chain(std::iter::repeat_with(Uuid::new_v4))
			.take(depth)
			.enumerate()
		{
			sqlx::query(
				r#"
					INSERT INTO comment (id, post_id, parent_id, author_id, content, created_at)
					VALUES ($1, $2, $3, NULL, $4, $5)
				"#,
			)
			.bind(id)
			.bind(post_id)
			.bind(parent)
			.bind(format!("Reply {index}"))
			.bind(start + Duration::milliseconds(i64::try_from(index).unwrap()))
			.execute(&mut *transaction)
			.await
			.unwrap();

			parent = Some(id);
		}

		transaction.commit().await.unwrap();

		root.to_string()
	}

	/// Requests a password reset and returns the token from the email that was sent.
	pub async fn request_reset(&mut self, email: &str) -> String {
		let response = self
			.server
			.post("/auth/reset")
			.json(&json!({ "email": email }))
			.await;

		assert_eq!(response.status_code(), 202);

		self.drain_outbox()
			.into_iter()
			.find_map(|delivery| match delivery {
				Delivery::Email { subject, body, .. } if subject == notify::PASSWORD_RESET_SUBJECT => {
					let (_, token) = body.split_once("token=")?;

					token.split_whitespace().next().map(str::to_string)
				}
				_ => None,
			})
			.expect("no password reset email was sent")
	}

	/// Returns every delivery queued since the last call.
	pub fn drain_outbox(&mut self) -> Vec<Delivery> {
		let mut deliveries = Vec::new();

		while let Ok(delivery) = self.outbox.try_recv() {
			deliveries.push(delivery);
		}

		deliveries
	}
}

fn id(value: &Value) -> String {
	value["id"]
		.as_str()
		.expect("response has no id")
		.to_string()
}
