//! Tests for auth module
//!
//! These tests cover the request-facing pieces of authentication:
//! - Claims wire shape
//! - Cookie parsing and formatting
//! - Token pair serialization

#[cfg(test)]
mod tests {
    use super::super::extractors::cookie_value;
    use super::super::handlers::{access_cookie, refresh_cookie};
    use super::super::models::{Claims, TokenPair};
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    #[test]
    fn claims_serialize_with_standard_field_names() {
        let claims = Claims {
            user_id: 7,
            email: "alice@example.com".to_string(),
            jti: "jti-1".to_string(),
            iat: 100,
            nbf: 100,
            exp: 1000,
        };

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["user_id"], 7);
        assert_eq!(value["email"], "alice@example.com");
        assert_eq!(value["jti"], "jti-1");
        assert_eq!(value["exp"], 1000);

        let back: Claims = serde_json::from_value(value).unwrap();
        assert_eq!(back.user_id, 7);
        assert_eq!(back.jti, "jti-1");
    }

    #[test]
    fn token_pair_round_trips() {
        let pair = TokenPair {
            access_token: "a.b.c".to_string(),
            refresh_token: "opaque".to_string(),
            expires_in: 900,
        };
        let json = serde_json::to_string(&pair).unwrap();
        let back: TokenPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token, "a.b.c");
        assert_eq!(back.refresh_token, "opaque");
        assert_eq!(back.expires_in, 900);
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("session=x; token=abc123; theme=dark"),
        );

        assert_eq!(cookie_value(&headers, "token").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "theme").as_deref(), Some("dark"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn cookie_value_without_header_is_none() {
        let headers = HeaderMap::new();
        assert!(cookie_value(&headers, "token").is_none());
    }

    #[test]
    fn access_cookie_is_lax_and_http_only() {
        let cookie = access_cookie("tok", 900);
        assert!(cookie.starts_with("token=tok;"));
        assert!(cookie.contains("Max-Age=900"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn refresh_cookie_is_scoped_to_the_refresh_path() {
        let cookie = refresh_cookie("sec", 604800);
        assert!(cookie.starts_with("refresh_token=sec;"));
        assert!(cookie.contains("Path=/api/auth/refresh"));
        assert!(cookie.contains("SameSite=Strict"));
    }
}
