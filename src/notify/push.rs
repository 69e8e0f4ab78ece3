//! Web push delivery.
//!
//! Messages are encrypted for the subscription with `aes128gcm` and signed
//! with the server's VAPID key, so push services accept them and browsers can
//! read them.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;
use web_push::{
	ContentEncoding, PartialVapidSignatureBuilder, SubscriptionInfo, VapidSignatureBuilder,
	WebPushMessage, WebPushMessageBuilder,
};

use crate::config::Config;

/// How long a push service should keep an undelivered message, in seconds.
const TIME_TO_LIVE: u32 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("push request failed: {0}")]
	Request(#[from] reqwest::Error),
	#[error("failed to encrypt or sign push message: {0}")]
	WebPush(#[from] web_push::WebPushError),
	#[error("failed to encode push message: {0}")]
	Encode(#[from] serde_json::Error),
}

/// A browser push subscription, as produced by `PushManager.subscribe()`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Validate)]
pub struct Subscription {
	/// The push service endpoint messages are sent to.
	#[validate(url)]
	pub endpoint: String,
	/// Keys used to encrypt messages for the browser.
	pub keys: SubscriptionKeys,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct SubscriptionKeys {
	pub p256dh: String,
	pub auth: String,
}

impl Subscription {
	fn info(&self) -> SubscriptionInfo {
		SubscriptionInfo::new(&self.endpoint, &self.keys.p256dh, &self.keys.auth)
	}
}

/// The message shown by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PushMessage {
	pub title: String,
	pub body: String,
	pub url: String,
}

/// Delivers push messages to a single subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
	async fn send(&self, subscription: &Subscription, message: &PushMessage) -> Result<(), Error>;
}

/// Reads the VAPID key pair from its base64url encoded private key.
pub fn vapid_key(private_key: &str) -> Result<PartialVapidSignatureBuilder, Error> {
	Ok(VapidSignatureBuilder::from_base64_no_sub(private_key)?)
}

/// The base64url encoded public key browsers pass to `PushManager.subscribe()`.
pub fn public_key(vapid: &PartialVapidSignatureBuilder) -> String {
	URL_SAFE_NO_PAD.encode(vapid.get_public_key())
}

/// Encrypts and signs messages, then posts them to the push service.
pub struct VapidPushSender {
	client: reqwest::Client,
	vapid: PartialVapidSignatureBuilder,
	subject: Option<String>,
}

impl VapidPushSender {
	pub fn new(private_key: &str, subject: Option<String>, timeout: Duration) -> Result<Self, Error> {
		Ok(Self {
			client: reqwest::Client::builder().timeout(timeout).build()?,
			vapid: vapid_key(private_key)?,
			subject,
		})
	}

	fn build_message(
		&self,
		subscription: &Subscription,
		message: &PushMessage,
	) -> Result<WebPushMessage, Error> {
		let info = subscription.info();
		let mut signature = self.vapid.clone().add_sub_info(&info);

		if let Some(subject) = &self.subject {
			signature.add_claim("sub", subject.as_str());
		}

		let content = serde_json::to_vec(message)?;
		let mut builder = WebPushMessageBuilder::new(&info);

		builder.set_ttl(TIME_TO_LIVE);
		builder.set_payload(ContentEncoding::Aes128Gcm, &content);
		builder.set_vapid_signature(signature.build()?);

		Ok(builder.build()?)
	}
}

#[async_trait]
impl PushSender for VapidPushSender {
	async fn send(&self, subscription: &Subscription, message: &PushMessage) -> Result<(), Error> {
		let message = self.build_message(subscription, message)?;
		let mut request = self
			.client
			.post(message.endpoint.to_string())
			.header("TTL", message.ttl);

		if let Some(payload) = message.payload {
			for (name, value) in payload.crypto_headers {
				request = request.header(name, value);
			}

			request = request
				.header("Content-Encoding", payload.content_encoding.to_str())
				.header("Content-Type", "application/octet-stream")
				.body(payload.content);
		}

		request.send().await?.error_for_status()?;

		Ok(())
	}
}

/// Writes push messages to the log instead of sending them.
pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
	async fn send(&self, subscription: &Subscription, message: &PushMessage) -> Result<(), Error> {
		tracing::info!(
			endpoint = %subscription.endpoint,
			title = %message.title,
			"vapid is not configured, skipping push message"
		);

		Ok(())
	}
}

/// Picks the VAPID sender if a private key is configured, otherwise the logging one.
pub fn from_config(config: &Config) -> Result<Box<dyn PushSender>, Error> {
	let Some(private_key) = config.vapid_key() else {
		tracing::warn!("VAPID_PRIVATE_KEY is not set, push messages will only be logged");
		return Ok(Box::new(LogPushSender));
	};

	Ok(Box::new(VapidPushSender::new(
		private_key,
		config.vapid_subject.clone(),
		config.notify_timeout(),
	)?))
}

#[cfg(test)]
mod test {
	use std::time::Duration;

	use super::*;

	const PRIVATE_KEY: &str = "IQ9Ur0ykXoHS9gzfYX0aBjy9lvdrjx_PFUXmie9YRcY";

	fn subscription() -> Subscription {
		Subscription {
			endpoint: "https://push.example.com/send/abc".into(),
			keys: SubscriptionKeys {
				p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".into(),
				auth: "tBHItJI5svbpez7KI4CCXg".into(),
			},
		}
	}

	fn message() -> PushMessage {
		PushMessage {
			title: "New Post".into(),
			body: "Hello".into(),
			url: "http://localhost:3000/posts/1".into(),
		}
	}

	#[test]
	fn test_message_is_encrypted_and_signed() {
		let sender = VapidPushSender::new(
			PRIVATE_KEY,
			Some("mailto:admin@example.com".into()),
			Duration::from_secs(1),
		)
		.unwrap();

		let built = sender.build_message(&subscription(), &message()).unwrap();
		let payload = built.payload.unwrap();
		let plaintext = serde_json::to_vec(&message()).unwrap();

		assert_eq!(built.ttl, TIME_TO_LIVE);
		assert_eq!(built.endpoint.to_string(), "https://push.example.com/send/abc");
		assert_eq!(payload.content_encoding.to_str(), "aes128gcm");
		assert!(payload.content.len() > plaintext.len());
		assert!(!payload
			.content
			.windows(plaintext.len())
			.any(|window| window == plaintext.as_slice()));
		assert!(payload
			.crypto_headers
			.iter()
			.any(|(name, value)| name.eq_ignore_ascii_case("authorization") && value.starts_with("vapid ")));
	}

	#[test]
	fn test_public_key_is_uncompressed_point() {
		let key = public_key(&vapid_key(PRIVATE_KEY).unwrap());
		let bytes = URL_SAFE_NO_PAD.decode(&key).unwrap();

		assert_eq!(bytes.len(), 65);
		assert_eq!(bytes[0], 0x04);
	}

	#[test]
	fn test_invalid_private_key() {
		assert!(matches!(vapid_key("not a key"), Err(Error::WebPush(..))));
	}
}
