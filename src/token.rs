//! Stateless, signed and time-limited tokens.
//!
//! A token has the form `{payload}.{issued_at}.{signature}`, where the payload
//! and signature are base64url encoded and `issued_at` is a unix timestamp.
//! The signature is an HMAC-SHA256 over the purpose, payload and timestamp,
//! so a token issued for one purpose never verifies for another.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("invalid_token")]
	Invalid,
	#[error("expired_token")]
	Expired,
}

#[derive(Clone)]
pub struct Signer {
	keyed: HmacSha256,
}

impl std::fmt::Debug for Signer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Signer").field("key", &"[redacted]").finish()
	}
}

impl Signer {
	pub fn new(secret: &str) -> Result<Self, hmac::digest::InvalidLength> {
		Ok(Self {
			keyed: HmacSha256::new_from_slice(secret.as_bytes())?,
		})
	}

	fn mac(&self, purpose: &str, payload: &str, issued_at: i64) -> HmacSha256 {
		let mut mac = self.keyed.clone();

		mac.update(purpose.as_bytes());
		mac.update(&[0]);
		mac.update(payload.as_bytes());
		mac.update(&[0]);
		mac.update(issued_at.to_string().as_bytes());
		mac
	}

	pub fn sign(&self, payload: &str, purpose: &str) -> String {
		self.sign_at(payload, purpose, Utc::now())
	}

	pub fn sign_at(&self, payload: &str, purpose: &str, issued_at: DateTime<Utc>) -> String {
		let issued_at = issued_at.timestamp();
		let signature = self.mac(purpose, payload, issued_at).finalize().into_bytes();

		format!(
			"{}.{issued_at}.{}",
			URL_SAFE_NO_PAD.encode(payload),
			URL_SAFE_NO_PAD.encode(signature)
		)
	}

	/// Verifies the token and returns its payload if it was signed for `purpose`
	/// no longer than `max_age` ago.
	pub fn verify(&self, token: &str, purpose: &str, max_age: Duration) -> Result<String, Error> {
		self.verify_at(token, purpose, max_age, Utc::now())
	}

	pub fn verify_at(
		&self,
		token: &str,
		purpose: &str,
		max_age: Duration,
		now: DateTime<Utc>,
	) -> Result<String, Error> {
		let parts = Parts::parse(token)?;

		self.mac(purpose, &parts.payload, parts.issued_at)
			.verify_slice(&parts.signature)
			.map_err(|_| Error::Invalid)?;

		if now.timestamp() - parts.issued_at > max_age.num_seconds() {
			return Err(Error::Expired);
		}

		Ok(parts.payload)
	}
}

/// Reads the payload of a token without checking its signature.
///
/// The result must not be trusted until the token has been passed to [`Signer::verify`].
pub fn unverified_payload(token: &str) -> Result<String, Error> {
	Parts::parse(token).map(|parts| parts.payload)
}

struct Parts {
	payload: String,
	issued_at: i64,
	signature: Vec<u8>,
}

impl Parts {
	fn parse(token: &str) -> Result<Self, Error> {
		let mut parts = token.splitn(3, '.');

		let (Some(payload), Some(issued_at), Some(signature)) =
			(parts.next(), parts.next(), parts.next())
		else {
			return Err(Error::Invalid);
		};

		let payload = URL_SAFE_NO_PAD
			.decode(payload)
			.ok()
			.and_then(|payload| String::from_utf8(payload).ok())
			.ok_or(Error::Invalid)?;
		let issued_at = issued_at.parse().map_err(|_| Error::Invalid)?;
		let signature = URL_SAFE_NO_PAD
			.decode(signature)
			.map_err(|_| Error::Invalid)?;

		Ok(Self {
			payload,
			issued_at,
			signature,
		})
	}
}

#[cfg(test)]
mod test {
	use chrono::{Duration, TimeZone, Utc};

	use super::{unverified_payload, Error, Signer};

	const PURPOSE: &str = "password-reset";

	fn signer() -> Signer {
		Signer::new("correct horse battery staple").unwrap()
	}

	#[test]
	fn test_any_key_length() {
		let long = "k".repeat(1024);

		for secret in ["", "short", long.as_str()] {
			let signer = Signer::new(secret).unwrap();
			let token = signer.sign("john@smith.com", PURPOSE);

			assert_eq!(
				signer.verify(&token, PURPOSE, Duration::hours(1)),
				Ok("john@smith.com".to_string())
			);
		}
	}

	#[test]
	fn test_valid_within_window() {
		let signer = signer();
		let issued_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
		let token = signer.sign_at("john@smith.com", PURPOSE, issued_at);

		assert_eq!(
			signer.verify_at(&token, PURPOSE, Duration::hours(1), issued_at),
			Ok("john@smith.com".to_string())
		);
		assert_eq!(
			signer.verify_at(
				&token,
				PURPOSE,
				Duration::hours(1),
				issued_at + Duration::seconds(3600)
			),
			Ok("john@smith.com".to_string())
		);
	}

	#[test]
	fn test_expired_after_window() {
		let signer = signer();
		let issued_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
		let token = signer.sign_at("john@smith.com", PURPOSE, issued_at);

		assert_eq!(
			signer.verify_at(
				&token,
				PURPOSE,
				Duration::hours(1),
				issued_at + Duration::seconds(3601)
			),
			Err(Error::Expired)
		);
	}

	#[test]
	fn test_bound_to_payload() {
		let signer = signer();
		let token = signer.sign("john@smith.com", PURPOSE);
		let (_, rest) = token.split_once('.').unwrap();

		let forged = format!(
			"{}.{rest}",
			base64::Engine::encode(
				&base64::engine::general_purpose::URL_SAFE_NO_PAD,
				"jane@smith.com"
			)
		);

		assert_eq!(unverified_payload(&forged), Ok("jane@smith.com".to_string()));
		assert_eq!(
			signer.verify(&forged, PURPOSE, Duration::hours(1)),
			Err(Error::Invalid)
		);
	}

	#[test]
	fn test_bound_to_purpose_and_key() {
		let token = signer().sign("john@smith.com", PURPOSE);

		assert_eq!(
			signer().verify(&token, "something-else", Duration::hours(1)),
			Err(Error::Invalid)
		);
		assert_eq!(
			Signer::new("another key").unwrap().verify(&token, PURPOSE, Duration::hours(1)),
			Err(Error::Invalid)
		);
	}

	#[test]
	fn test_malformed() {
		let signer = signer();

		for token in ["", "abc", "abc.def", "abc.notanumber.def", "!!.1.!!"] {
			assert_eq!(
				signer.verify(token, PURPOSE, Duration::hours(1)),
				Err(Error::Invalid)
			);
		}
	}
}
