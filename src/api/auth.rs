use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use sha2::{Digest, Sha256};

pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Check the bearer token when one is configured. Tokens are compared by
/// fingerprint so the comparison does not short-circuit on the raw secret.
pub fn ensure_authorized(
    headers: &HeaderMap,
    expected: Option<&str>,
) -> std::result::Result<(), (StatusCode, String)> {
    let Some(expected) = expected.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(());
    };

    match bearer_token(headers) {
        Some(given) if token_fingerprint(given) == token_fingerprint(expected) => Ok(()),
        Some(_) => Err((StatusCode::UNAUTHORIZED, "invalid bearer token".to_string())),
        None => Err((StatusCode::UNAUTHORIZED, "missing bearer token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn open_when_no_token_configured() {
        assert!(ensure_authorized(&HeaderMap::new(), None).is_ok());
        assert!(ensure_authorized(&HeaderMap::new(), Some("  ")).is_ok());
    }

    #[test]
    fn requires_matching_bearer() {
        assert!(ensure_authorized(&headers("Bearer s3cret"), Some("s3cret")).is_ok());
        let (status, _) = ensure_authorized(&headers("Bearer nope"), Some("s3cret")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, msg) = ensure_authorized(&HeaderMap::new(), Some("s3cret")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(msg.contains("missing"));
    }
}
