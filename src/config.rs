use std::{
	net::{IpAddr, Ipv4Addr},
	time::Duration,
};

use serde::Deserialize;

fn default_database_url() -> String {
	"sqlite://blog.db?mode=rwc".into()
}

fn default_host() -> IpAddr {
	IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
	3000
}

fn default_public_url() -> String {
	"http://localhost:3000".into()
}

fn default_smtp_port() -> u16 {
	587
}

fn default_mail_from() -> String {
	"Blog <no-reply@localhost>".into()
}

fn default_notify_timeout_secs() -> u64 {
	10
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("error parsing .env file: {0}")]
	Dotenv(#[from] dotenvy::Error),
	#[error("error parsing environment: {0}")]
	Envy(#[from] envy::Error),
}

/// Runtime configuration, read from the environment (and an optional `.env` file).
///
/// Every field maps to the upper-case environment variable of the same name,
/// e.g. `secret_key` is read from `SECRET_KEY`.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	#[serde(default = "default_database_url")]
	pub database_url: String,
	#[serde(default = "default_host")]
	pub host: IpAddr,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Key used to sign password reset tokens.
	pub secret_key: String,
	/// Base URL of the site, used to build links in emails.
	#[serde(default = "default_public_url")]
	pub public_url: String,
	/// Outgoing mail is only logged when this is unset.
	#[serde(default)]
	pub smtp_host: Option<String>,
	#[serde(default = "default_smtp_port")]
	pub smtp_port: u16,
	#[serde(default)]
	pub smtp_username: Option<String>,
	#[serde(default)]
	pub smtp_password: Option<String>,
	#[serde(default = "default_mail_from")]
	pub mail_from: String,
	/// Where messages from the contact form are sent. The form is disabled when unset.
	#[serde(default)]
	pub contact_address: Option<String>,
	/// Base64url encoded P-256 private key used to sign push messages.
	/// Push messages are only logged when this is unset.
	#[serde(default)]
	pub vapid_private_key: Option<String>,
	/// Contact URI sent to push services, e.g. `mailto:admin@example.com`.
	#[serde(default)]
	pub vapid_subject: Option<String>,
	/// Upper bound for a single SMTP or push delivery.
	#[serde(default = "default_notify_timeout_secs")]
	pub notify_timeout_secs: u64,
	/// Exports traces and metrics over OTLP when set.
	#[serde(default)]
	pub otlp_enabled: bool,
}

impl Config {
	pub fn from_env() -> Result<Self, Error> {
		if let Err(e) = dotenvy::dotenv() {
			if !e.not_found() {
				return Err(e.into());
			}
		}

		Ok(envy::from_env()?)
	}

	pub fn notify_timeout(&self) -> Duration {
		Duration::from_secs(self.notify_timeout_secs)
	}

	pub fn vapid_key(&self) -> Option<&str> {
		non_empty(self.vapid_private_key.as_deref())
	}

	pub fn contact_address(&self) -> Option<&str> {
		non_empty(self.contact_address.as_deref())
	}

	/// Builds a link to a page on the public site.
	pub fn link(&self, path: &str) -> String {
		format!("{}{path}", self.public_url.trim_end_matches('/'))
	}
}

#[cfg(test)]
mod test {
	#[test]
	fn test_defaults() {
		let config: super::Config =
			envy::from_iter([("SECRET_KEY".to_string(), "secret".to_string())]).unwrap();

		assert_eq!(config.port, 3000);
		assert_eq!(config.notify_timeout().as_secs(), 10);
		assert!(config.smtp_host.is_none());
		assert!(!config.otlp_enabled);
		assert!(config.vapid_key().is_none());
		assert!(config.contact_address().is_none());
	}

	#[test]
	fn test_blank_optional_values_are_unset() {
		let config: super::Config = envy::from_iter([
			("SECRET_KEY".to_string(), "secret".to_string()),
			("VAPID_PRIVATE_KEY".to_string(), " ".to_string()),
			("CONTACT_ADDRESS".to_string(), "owner@example.com".to_string()),
		])
		.unwrap();

		assert!(config.vapid_key().is_none());
		assert_eq!(config.contact_address(), Some("owner@example.com"));
	}

	#[test]
	fn test_overrides() {
		let config: super::Config = envy::from_iter([
			("SECRET_KEY".to_string(), "secret".to_string()),
			("PORT".to_string(), "8080".to_string()),
			("SMTP_HOST".to_string(), "smtp.example.com".to_string()),
			("OTLP_ENABLED".to_string(), "true".to_string()),
		])
		.unwrap();

		assert_eq!(config.port, 8080);
		assert_eq!(config.smtp_host.as_deref(), Some("smtp.example.com"));
		assert!(config.otlp_enabled);
	}

	#[test]
	fn test_missing_secret_key() {
		let config = envy::from_iter::<_, super::Config>(Vec::<(String, String)>::new());

		assert!(config.is_err());
	}

	#[test]
	fn test_link() {
		let mut config: super::Config =
			envy::from_iter([("SECRET_KEY".to_string(), "secret".to_string())]).unwrap();
		config.public_url = "https://blog.example.com/".into();

		assert_eq!(
			config.link("/posts/1"),
			"https://blog.example.com/posts/1"
		);
	}
}
