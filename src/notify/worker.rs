use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use super::{mail::Mailer, push::PushSender, Delivery};

/// Drains the outbox until every [`super::Notifier`] has been dropped.
///
/// Failed deliveries are logged and dropped. They never reach the request
/// that caused them.
pub async fn run(
	mut outbox: UnboundedReceiver<Delivery>,
	mailer: Arc<dyn Mailer>,
	push: Arc<dyn PushSender>,
) {
	while let Some(delivery) = outbox.recv().await {
		deliver(delivery, mailer.as_ref(), push.as_ref()).await;
	}

	tracing::info!("outbox closed, notification worker stopped");
}

#[tracing::instrument(skip_all)]
async fn deliver(delivery: Delivery, mailer: &dyn Mailer, push: &dyn PushSender) {
	match delivery {
		Delivery::Email { to, subject, body } => match mailer.send(&to, &subject, &body).await {
			Ok(()) => tracing::info!(monotonic_counter.emails_delivered = 1_u64),
			Err(error) => tracing::warn!(
				monotonic_counter.emails_failed = 1_u64,
				%error,
				%subject,
				"failed to send email"
			),
		},
		Delivery::Push {
			subscription,
			message,
		} => match push.send(&subscription, &message).await {
			Ok(()) => tracing::info!(monotonic_counter.pushes_delivered = 1_u64),
			Err(error) => tracing::warn!(
				monotonic_counter.pushes_failed = 1_u64,
				%error,
				endpoint = %subscription.endpoint,
				"failed to send push message"
			),
		},
	}
}

#[cfg(test)]
mod test {
	use std::sync::{Arc, Mutex};

	use async_trait::async_trait;

	use super::*;
	use crate::notify::{
		mail,
		push::{self, PushMessage, Subscription, SubscriptionKeys},
		Notifier,
	};

	#[derive(Default)]
	struct RecordingMailer {
		sent: Mutex<Vec<String>>,
		fail: bool,
	}

	#[async_trait]
	impl Mailer for RecordingMailer {
		async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), mail::Error> {
			self.sent.lock().unwrap().push(to.to_string());

			if self.fail {
				return Err(mail::Error::Address(
					"not an address".parse::<lettre::Address>().unwrap_err(),
				));
			}

			Ok(())
		}
	}

	#[derive(Default)]
	struct RecordingPush {
		sent: Mutex<Vec<String>>,
	}

	#[async_trait]
	impl PushSender for RecordingPush {
		async fn send(
			&self,
			subscription: &Subscription,
			_message: &PushMessage,
		) -> Result<(), push::Error> {
			self.sent.lock().unwrap().push(subscription.endpoint.clone());

			Ok(())
		}
	}

	fn subscription(endpoint: &str) -> Subscription {
		Subscription {
			endpoint: endpoint.into(),
			keys: SubscriptionKeys {
				p256dh: "key".into(),
				auth: "auth".into(),
			},
		}
	}

	#[tokio::test]
	async fn test_failures_do_not_stop_the_worker() {
		let mailer = Arc::new(RecordingMailer {
			fail: true,
			..Default::default()
		});
		let push = Arc::new(RecordingPush::default());
		let (notifier, outbox) = Notifier::new();

		notifier.email("a@example.com", "New Blog Post", "first");
		notifier.push(
			subscription("https://push.example.com/1"),
			PushMessage {
				title: "New Blog Post".into(),
				body: "first".into(),
				url: "/posts/1".into(),
			},
		);
		notifier.email("b@example.com", "New Blog Post", "second");
		drop(notifier);

		run(outbox, mailer.clone(), push.clone()).await;

		assert_eq!(
			*mailer.sent.lock().unwrap(),
			vec!["a@example.com".to_string(), "b@example.com".to_string()]
		);
		assert_eq!(
			*push.sent.lock().unwrap(),
			vec!["https://push.example.com/1".to_string()]
		);
	}
}
