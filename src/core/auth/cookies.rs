//! Cookie transport for the token pair
//!
//! The cookie names and flags are part of the service contract:
//! `ACCESS_TOKEN` and `REFRESH_TOKEN`, both HttpOnly, Secure and
//! SameSite=Strict, with max-ages matching the token lifetimes.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Access token cookie name (contract)
pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";

/// Refresh token cookie name (contract)
pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";

fn auth_cookie(name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Add the freshly signed token pair to the jar.
pub fn set_auth_cookies(
    jar: CookieJar,
    access_token: String,
    refresh_token: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
) -> CookieJar {
    jar.add(auth_cookie(ACCESS_TOKEN, access_token, access_ttl_secs))
        .add(auth_cookie(REFRESH_TOKEN, refresh_token, refresh_ttl_secs))
}

/// Expire both cookies so clients stop presenting dead tokens.
pub fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN).path("/").build())
        .remove(Cookie::build(REFRESH_TOKEN).path("/").build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_flags() {
        let cookie = auth_cookie(ACCESS_TOKEN, "token123".to_string(), 86400);

        assert_eq!(cookie.name(), "ACCESS_TOKEN");
        assert_eq!(cookie.value(), "token123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(86400)));
    }

    #[test]
    fn test_set_auth_cookies_adds_both() {
        let jar = set_auth_cookies(
            CookieJar::new(),
            "access".to_string(),
            "refresh".to_string(),
            86400,
            31536000,
        );

        let access = jar.get(ACCESS_TOKEN).unwrap();
        let refresh = jar.get(REFRESH_TOKEN).unwrap();

        assert_eq!(access.value(), "access");
        assert_eq!(refresh.value(), "refresh");
        assert_eq!(refresh.max_age(), Some(time::Duration::seconds(31536000)));
    }

    #[test]
    fn test_clear_auth_cookies_expires_both() {
        let jar = set_auth_cookies(
            CookieJar::new(),
            "access".to_string(),
            "refresh".to_string(),
            86400,
            31536000,
        );

        let jar = clear_auth_cookies(jar);

        assert!(jar.get(ACCESS_TOKEN).is_none());
        assert!(jar.get(REFRESH_TOKEN).is_none());
    }
}
