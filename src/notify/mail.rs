use std::time::Duration;

use async_trait::async_trait;
use lettre::{
	message::{header, Mailbox, Message},
	transport::smtp::authentication::Credentials,
	AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid address: {0}")]
	Address(#[from] lettre::address::AddressError),
	#[error("failed to build email: {0}")]
	Build(#[from] lettre::error::Error),
	#[error("smtp error: {0}")]
	Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends plain-text emails.
#[async_trait]
pub trait Mailer: Send + Sync {
	async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), Error>;
}

/// Sends emails through an SMTP relay using STARTTLS.
pub struct SmtpMailer {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	from: Mailbox,
}

impl SmtpMailer {
	pub fn new(
		host: &str,
		port: u16,
		credentials: Option<Credentials>,
		from: &str,
		timeout: Duration,
	) -> Result<Self, Error> {
		let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
			.port(port)
			.timeout(Some(timeout));

		let builder = match credentials {
			Some(credentials) => builder.credentials(credentials),
			None => builder,
		};

		Ok(Self {
			transport: builder.build(),
			from: from.parse()?,
		})
	}
}

#[async_trait]
impl Mailer for SmtpMailer {
	async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), Error> {
		let email = Message::builder()
			.from(self.from.clone())
			.to(to.parse()?)
			.subject(subject)
			.header(header::ContentType::TEXT_PLAIN)
			.body(body.to_string())?;

		self.transport.send(email).await?;
		tracing::info!(subject, "email sent");

		Ok(())
	}
}

/// Writes emails to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
	async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), Error> {
		tracing::info!(to, subject, body, "smtp is not configured, skipping email");

		Ok(())
	}
}

/// Picks the SMTP mailer if a host is configured, otherwise the logging one.
pub fn from_config(config: &Config) -> Result<Box<dyn Mailer>, Error> {
	let Some(host) = config.smtp_host.as_deref().filter(|host| !host.trim().is_empty()) else {
		tracing::warn!("SMTP_HOST is not set, emails will only be logged");
		return Ok(Box::new(LogMailer));
	};

	let credentials = match (&config.smtp_username, &config.smtp_password) {
		(Some(username), Some(password)) => {
			Some(Credentials::new(username.clone(), password.clone()))
		}
		_ => None,
	};

	Ok(Box::new(SmtpMailer::new(
		host,
		config.smtp_port,
		credentials,
		&config.mail_from,
		config.notify_timeout(),
	)?))
}
