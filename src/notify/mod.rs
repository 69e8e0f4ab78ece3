//! Email and push notifications.
//!
//! Routes never talk to SMTP or push services themselves. They resolve the
//! recipients of a notification and put one [`Delivery`] per recipient on the
//! outbox through a [`Notifier`]. The [`worker`] drains the outbox in the
//! background, so slow or failing providers never hold up a response.

pub mod mail;
pub mod push;
pub mod worker;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::{
	config::Config,
	route::{comment::model::Comment, post::model::Post},
	Database,
};

use self::push::{PushMessage, Subscription};

pub const NEW_POST_SUBJECT: &str = "New Blog Post";
pub const NEW_COMMENT_SUBJECT: &str = "New Comment";
pub const PASSWORD_RESET_SUBJECT: &str = "Password Reset";

/// A single message waiting to be delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
	Email {
		to: String,
		subject: String,
		body: String,
	},
	Push {
		subscription: Subscription,
		message: PushMessage,
	},
}

/// The sending half of the outbox.
#[derive(Clone, Debug)]
pub struct Notifier {
	sender: UnboundedSender<Delivery>,
}

impl Notifier {
	pub fn new() -> (Self, UnboundedReceiver<Delivery>) {
		let (sender, receiver) = mpsc::unbounded_channel();

		(Self { sender }, receiver)
	}

	pub fn email(&self, to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) {
		self.enqueue(Delivery::Email {
			to: to.into(),
			subject: subject.into(),
			body: body.into(),
		});
	}

	pub fn push(&self, subscription: Subscription, message: PushMessage) {
		self.enqueue(Delivery::Push {
			subscription,
			message,
		});
	}

	fn enqueue(&self, delivery: Delivery) {
		if self.sender.send(delivery).is_err() {
			tracing::warn!("notification worker is gone, dropping delivery");
		}
	}
}

/// Which push subscriptions receive a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushFanout {
	AllSubscribers,
	User(Uuid),
}

/// Notifies every user that opted in to emails, except the author, about a new post,
/// and pushes it to all subscribers.
pub async fn on_new_post(database: &Database, notifier: &Notifier, config: &Config, post: &Post) {
	if let Err(error) = fanout_new_post(database, notifier, config, post).await {
		tracing::error!(%error, post = %post.id, "failed to notify about new post");
	}
}

async fn fanout_new_post(
	database: &Database,
	notifier: &Notifier,
	config: &Config,
	post: &Post,
) -> Result<(), sqlx::Error> {
	let recipients = sqlx::query_scalar::<_, String>(
		r#"
			SELECT email FROM "user"
			WHERE notify_by_email AND id IS NOT $1
		"#,
	)
	.bind(post.author_id)
	.fetch_all(database)
	.await?;

	let link = config.link(&format!("/posts/{}", post.id));
	let body = format!("A new post '{}' has been published.\n\n{link}", post.title);

	tracing::debug!(post = %post.id, recipients = recipients.len(), "notifying about new post");

	for email in recipients {
		notifier.email(email, NEW_POST_SUBJECT, body.clone());
	}

	push_to(
		database,
		notifier,
		PushFanout::AllSubscribers,
		PushMessage {
			title: NEW_POST_SUBJECT.into(),
			body: post.title.clone(),
			url: link,
		},
	)
	.await
}

/// The user who is told about a new comment.
#[derive(Debug, sqlx::FromRow)]
struct Recipient {
	id: Uuid,
	email: String,
	notify_by_email: bool,
	post_title: String,
}

impl Recipient {
	fn wants_notification(&self, commenter: Option<Uuid>) -> bool {
		self.notify_by_email && commenter != Some(self.id)
	}
}

/// Notifies the author of the post (for root comments) or of the parent comment
/// (for replies), unless they opted out or wrote the comment themselves.
pub async fn on_new_comment(
	database: &Database,
	notifier: &Notifier,
	config: &Config,
	comment: &Comment,
) {
	if let Err(error) = fanout_new_comment(database, notifier, config, comment).await {
		tracing::error!(%error, comment = %comment.id, "failed to notify about new comment");
	}
}

async fn fanout_new_comment(
	database: &Database,
	notifier: &Notifier,
	config: &Config,
	comment: &Comment,
) -> Result<(), sqlx::Error> {
	let recipient = match comment.parent_id {
		None => sqlx::query_as::<_, Recipient>(
			r#"
				SELECT "user".id, "user".email, "user".notify_by_email, post.title AS post_title
				FROM post
				JOIN "user" ON "user".id = post.author_id
				WHERE post.id = $1
			"#,
		)
		.bind(comment.post_id),
		Some(parent_id) => sqlx::query_as::<_, Recipient>(
			r#"
				SELECT "user".id, "user".email, "user".notify_by_email, post.title AS post_title
				FROM comment AS parent
				JOIN "user" ON "user".id = parent.author_id
				JOIN post ON post.id = parent.post_id
				WHERE parent.id = $1
			"#,
		)
		.bind(parent_id),
	}
	.fetch_optional(database)
	.await?;

	// Deleted accounts leave comments and posts without an author
	let Some(recipient) = recipient else {
		return Ok(());
	};

	if !recipient.wants_notification(comment.author_id) {
		tracing::debug!(comment = %comment.id, "skipping comment notification");
		return Ok(());
	}

	let link = config.link(&format!("/posts/{}", comment.post_id));

	notifier.email(
		recipient.email,
		NEW_COMMENT_SUBJECT,
		format!("New comment on '{}'.\n\n{link}", recipient.post_title),
	);

	push_to(
		database,
		notifier,
		PushFanout::User(recipient.id),
		PushMessage {
			title: NEW_COMMENT_SUBJECT.into(),
			body: recipient.post_title,
			url: link,
		},
	)
	.await
}

/// Queues `message` for every subscription selected by `fanout`.
///
/// Stored subscriptions that can no longer be parsed are skipped.
pub async fn push_to(
	database: &Database,
	notifier: &Notifier,
	fanout: PushFanout,
	message: PushMessage,
) -> Result<(), sqlx::Error> {
	let payloads = match fanout {
		PushFanout::AllSubscribers => {
			sqlx::query_scalar::<_, String>("SELECT payload FROM push_subscription")
				.fetch_all(database)
				.await?
		}
		PushFanout::User(user_id) => {
			sqlx::query_scalar::<_, String>(
				"SELECT payload FROM push_subscription WHERE user_id = $1",
			)
			.bind(user_id)
			.fetch_all(database)
			.await?
		}
	};

	for payload in payloads {
		match serde_json::from_str::<Subscription>(&payload) {
			Ok(subscription) => notifier.push(subscription, message.clone()),
			Err(error) => tracing::warn!(%error, "skipping unreadable push subscription"),
		}
	}

	Ok(())
}
