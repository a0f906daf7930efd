//! Admin credentials, sessions, and the single authorization check every protected operation
//! goes through.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::AuthError;
use crate::model::{NewAuthSession, NewProfile, Profile, Role};
use crate::schema::{auth_sessions, profiles};

pub const SESSION_COOKIE: &str = "portal_session";

/// Hashes a password with argon2id into a PHC string carrying its own salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Checks a password against a stored PHC string. Unparseable records never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates the admin credential and its profile. Errors if the email is already registered.
pub fn provision_admin(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
) -> Result<Profile, AuthError> {
    let email = normalize_email(email);
    conn.transaction(|conn| {
        let existing: i64 = profiles::table
            .filter(profiles::email.eq(&email))
            .count()
            .get_result(conn)?;
        if existing > 0 {
            return Err(AuthError::AlreadyProvisioned(email.clone()));
        }

        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;
        diesel::insert_into(profiles::table)
            .values(&NewProfile {
                id: &id,
                email: &email,
                password_hash: &password_hash,
                role: Role::Admin.as_str(),
            })
            .execute(conn)?;

        Ok(profiles::table
            .filter(profiles::id.eq(&id))
            .select(Profile::as_select())
            .first(conn)?)
    })
}

/// Checks credentials and opens a session. Only admins may sign in; anyone else is refused
/// without a session being created.
/// Returns the session token.
pub fn sign_in(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    now: NaiveDateTime,
    ttl: Duration,
) -> Result<String, AuthError> {
    let profile: Option<Profile> = profiles::table
        .filter(profiles::email.eq(normalize_email(email)))
        .select(Profile::as_select())
        .first(conn)
        .optional()?;
    let profile = match profile {
        Some(p) if verify_password(password, &p.password_hash) => p,
        _ => return Err(AuthError::InvalidCredentials),
    };
    if profile.role() != Role::Admin {
        return Err(AuthError::NotAdmin);
    }

    purge_expired_sessions(conn, now)?;
    let token = Uuid::new_v4().to_string();
    diesel::insert_into(auth_sessions::table)
        .values(&NewAuthSession {
            user_id: &profile.id,
            token: &token,
            expires_at: now + ttl,
        })
        .execute(conn)?;
    Ok(token)
}

/// Resolves a session token to the caller's role, failing closed: anything other than a live
/// session belonging to an admin profile is an error.
pub fn authorize(
    conn: &mut SqliteConnection,
    token: Option<&str>,
    now: NaiveDateTime,
) -> Result<Role, AuthError> {
    let token = token.ok_or(AuthError::MissingSession)?;
    if Uuid::parse_str(token).is_err() {
        return Err(AuthError::InvalidSession);
    }

    let profile: Option<Profile> = auth_sessions::table
        .inner_join(profiles::table)
        .filter(auth_sessions::token.eq(token))
        .filter(auth_sessions::expires_at.gt(now))
        .select(Profile::as_select())
        .first(conn)
        .optional()?;

    match profile.map(|p| p.role()) {
        None => Err(AuthError::InvalidSession),
        Some(Role::Admin) => Ok(Role::Admin),
        Some(Role::Other) => Err(AuthError::NotAdmin),
    }
}

/// Ends a session. Returns whether a session was removed.
pub fn sign_out(conn: &mut SqliteConnection, token: &str) -> Result<bool, diesel::result::Error> {
    let removed =
        diesel::delete(auth_sessions::table.filter(auth_sessions::token.eq(token))).execute(conn)?;
    Ok(removed > 0)
}

/// Drops every expired session. Returns number of affected rows.
pub fn purge_expired_sessions(
    conn: &mut SqliteConnection,
    now: NaiveDateTime,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(auth_sessions::table.filter(auth_sessions::expires_at.le(now))).execute(conn)
}

/// Pulls the session token out of the request's cookies.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        ttl.num_seconds()
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}

/// `POST /setup`: provisions the configured admin credential. Bootstrap use only; answers 404
/// when disabled.
pub async fn setup_handler(State(backend): State<Backend>) -> Response {
    if !backend.config.enable_setup {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some((email, password)) = backend
        .config
        .admin_credential()
        .map(|(email, password)| (email.to_string(), password.to_string()))
    else {
        error!("Admin setup requested but ADMIN_EMAIL/ADMIN_PASSWORD are not set");
        return AuthError::NotConfigured.into_response();
    };

    match backend
        .run(move |conn, _| provision_admin(conn, &email, &password))
        .await
    {
        Ok(profile) => {
            info!(email = %profile.email, "Admin provisioned");
            (
                StatusCode::CREATED,
                format!("Admin user created: {}", profile.email),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Error provisioning admin: {e}");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::run_test_in_transaction;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    fn insert_profile(
        conn: &mut SqliteConnection,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<String, diesel::result::Error> {
        let id = Uuid::new_v4().to_string();
        diesel::insert_into(profiles::table)
            .values(&NewProfile {
                id: &id,
                email,
                password_hash: &hash_password(password).expect("hash"),
                role: role.as_str(),
            })
            .execute(conn)?;
        Ok(id)
    }

    #[test]
    fn test_password_hash_round_trip() {
        let stored = hash_password("Auth9898Sub").expect("hash");
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("Auth9898Sub", &stored));
        assert!(!verify_password("auth9898sub", &stored));
        assert!(!verify_password("Auth9898Sub", "not-a-hash"));
        // Salted: hashing twice never yields the same record.
        assert_ne!(stored, hash_password("Auth9898Sub").expect("hash"));
    }

    #[test]
    fn test_provision_admin() {
        run_test_in_transaction(|conn| {
            let profile = provision_admin(conn, " Admin@Example.com ", "secret").expect("provision");
            assert_eq!(profile.email, "admin@example.com");
            assert_eq!(profile.role(), Role::Admin);
            assert!(verify_password("secret", &profile.password_hash));

            let err = provision_admin(conn, "admin@example.com", "other")
                .expect_err("second provisioning must fail");
            assert!(matches!(err, AuthError::AlreadyProvisioned(_)));
            Ok(())
        });
    }

    #[test]
    fn test_sign_in_and_authorize_admin() {
        run_test_in_transaction(|conn| {
            provision_admin(conn, "admin@example.com", "secret").expect("provision");
            let token = sign_in(conn, "ADMIN@example.com", "secret", now(), Duration::hours(1))
                .expect("sign in");
            assert!(Uuid::parse_str(&token).is_ok());

            let role = authorize(conn, Some(&token), now()).expect("authorized");
            assert_eq!(role, Role::Admin);
            Ok(())
        });
    }

    #[test]
    fn test_sign_in_rejects_bad_credentials() {
        run_test_in_transaction(|conn| {
            provision_admin(conn, "admin@example.com", "secret").expect("provision");
            assert!(matches!(
                sign_in(conn, "admin@example.com", "wrong", now(), Duration::hours(1)),
                Err(AuthError::InvalidCredentials)
            ));
            assert!(matches!(
                sign_in(conn, "nobody@example.com", "secret", now(), Duration::hours(1)),
                Err(AuthError::InvalidCredentials)
            ));
            Ok(())
        });
    }

    #[test]
    fn test_password_is_compared_as_typed() {
        run_test_in_transaction(|conn| {
            provision_admin(conn, "admin@example.com", " pass ").expect("provision");
            assert!(sign_in(conn, "admin@example.com", " pass ", now(), Duration::hours(1)).is_ok());
            for typed in ["pass", " pass", "pass "] {
                assert!(
                    matches!(
                        sign_in(conn, "admin@example.com", typed, now(), Duration::hours(1)),
                        Err(AuthError::InvalidCredentials)
                    ),
                    "{typed:?}"
                );
            }
            Ok(())
        });
    }

    #[test]
    fn test_sign_in_refuses_non_admin_without_session() {
        run_test_in_transaction(|conn| {
            insert_profile(conn, "judge@example.com", "secret", Role::Other)?;
            let err = sign_in(conn, "judge@example.com", "secret", now(), Duration::hours(1))
                .expect_err("non-admin must be refused");
            assert!(matches!(err, AuthError::NotAdmin));

            let sessions: i64 = auth_sessions::table.count().get_result(conn)?;
            assert_eq!(sessions, 0);
            Ok(())
        });
    }

    #[test]
    fn test_authorize_fails_closed() {
        run_test_in_transaction(|conn| {
            assert!(matches!(
                authorize(conn, None, now()),
                Err(AuthError::MissingSession)
            ));
            assert!(matches!(
                authorize(conn, Some("not-a-uuid"), now()),
                Err(AuthError::InvalidSession)
            ));
            let unknown = Uuid::new_v4().to_string();
            assert!(matches!(
                authorize(conn, Some(&unknown), now()),
                Err(AuthError::InvalidSession)
            ));
            Ok(())
        });
    }

    #[test]
    fn test_authorize_rejects_demoted_profile() {
        run_test_in_transaction(|conn| {
            let id = insert_profile(conn, "former@example.com", "secret", Role::Other)?;
            let token = Uuid::new_v4().to_string();
            diesel::insert_into(auth_sessions::table)
                .values(&NewAuthSession {
                    user_id: &id,
                    token: &token,
                    expires_at: now() + Duration::hours(1),
                })
                .execute(conn)?;

            assert!(matches!(
                authorize(conn, Some(&token), now()),
                Err(AuthError::NotAdmin)
            ));
            Ok(())
        });
    }

    #[test]
    fn test_expired_session() {
        run_test_in_transaction(|conn| {
            provision_admin(conn, "admin@example.com", "secret").expect("provision");
            let issued = now() - Duration::hours(2);
            let token = sign_in(conn, "admin@example.com", "secret", issued, Duration::hours(1))
                .expect("sign in");

            assert!(matches!(
                authorize(conn, Some(&token), now()),
                Err(AuthError::InvalidSession)
            ));
            assert_eq!(purge_expired_sessions(conn, now())?, 1);
            Ok(())
        });
    }

    #[test]
    fn test_sign_out() {
        run_test_in_transaction(|conn| {
            provision_admin(conn, "admin@example.com", "secret").expect("provision");
            let token = sign_in(conn, "admin@example.com", "secret", now(), Duration::hours(1))
                .expect("sign in");

            assert!(sign_out(conn, &token)?);
            assert!(!sign_out(conn, &token)?);
            assert!(matches!(
                authorize(conn, Some(&token), now()),
                Err(AuthError::InvalidSession)
            ));
            Ok(())
        });
    }

    #[test]
    fn test_session_token_from_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; portal_session=abc-123; other=1"),
        );
        assert_eq!(session_token(&headers), Some("abc-123".to_string()));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("portal_session="));
        assert_eq!(session_token(&empty), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_strings() {
        assert_eq!(
            session_cookie("tok", Duration::hours(24)),
            "portal_session=tok; Max-Age=86400; Path=/; HttpOnly; SameSite=Lax"
        );
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
