use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// Creates a session cookie with no expiry
pub fn create_cookie(session_id: Uuid) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(!cfg!(debug_assertions))
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.path("/")
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie() -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}

/// Finds the session id in the `Cookie` headers of a request.
///
/// Returns `None` if there is no session cookie, and `Some(Err(..))`
/// if the cookie is present but malformed.
pub fn find_session_id<'a>(
	headers: impl IntoIterator<Item = &'a str>,
) -> Option<Result<Uuid, uuid::Error>> {
	headers
		.into_iter()
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == COOKIE_NAME)
		.map(|cookie| Uuid::parse_str(cookie.value()))
}
