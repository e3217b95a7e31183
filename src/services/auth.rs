//! Magic-link sign-in and sessions
//!
//! Staff sign in by requesting a one-time link at their company address.
//! Only the SHA-256 digest of the emailed token is stored; following the
//! link consumes it and opens a session carried in the `session` cookie.

use chrono::{Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository, VerificationRepository};
use crate::models::{new_id, Session, SessionUser, User, VerificationToken};
use crate::services::email::EmailService;
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::rate_limiter::MagicLinkRateLimiter;

/// Shown when a sign-in is attempted outside the allow-listed domains
pub const DOMAIN_DENIED: &str = "Access denied. Please use an authorized company email.";

const INVALID_LINK: &str = "Invalid or expired link";

/// Where a request came from
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Result of following a magic link
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    pub session_token: String,
    pub expires: chrono::DateTime<Utc>,
    pub user: SessionUser,
}

/// Whether `email` is a well-formed address at one of `domains`
pub fn is_allowed_email(email: &str, domains: &[String]) -> bool {
    let email = email.trim().to_lowercase();
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    domains.iter().any(|d| d.trim().eq_ignore_ascii_case(domain))
}

/// Hex SHA-256 of a token, as stored in `verification_tokens.value`
pub fn hash_token(token: &str) -> String {
    data_encoding::HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    tokens: Arc<dyn VerificationRepository>,
    email: Arc<EmailService>,
    limiter: MagicLinkRateLimiter,
    config: AuthConfig,
    base_url: String,
    trusted_origins: Vec<String>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        tokens: Arc<dyn VerificationRepository>,
        email: Arc<EmailService>,
        config: AuthConfig,
        base_url: &str,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let trusted_origins = std::iter::once(base_url.as_str())
            .chain(config.trusted_origins.iter().map(|o| o.trim_end_matches('/')))
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            users,
            sessions,
            tokens,
            email,
            limiter: MagicLinkRateLimiter::new(),
            config,
            base_url,
            trusted_origins,
        }
    }

    /// Session lifetime, for the cookie's `Max-Age`
    pub fn session_max_age_secs(&self) -> i64 {
        self.config.session_expires_days * 24 * 60 * 60
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.secure_cookies
    }

    /// A callback must be a same-site path or sit under the hub's own
    /// origin or one of the configured trusted origins
    pub fn is_trusted_callback(&self, url: &str) -> bool {
        if url.starts_with('/') {
            return !url.starts_with("//") && !url.starts_with("/\\");
        }
        self.trusted_origins.iter().any(|origin| {
            url.strip_prefix(origin.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
        })
    }

    /// Email a sign-in link to `email`
    pub async fn request_magic_link(
        &self,
        email: &str,
        callback_url: Option<&str>,
        client: &ClientInfo,
    ) -> ServiceResult<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ServiceError::invalid("Email is required"));
        }

        self.limiter
            .check(&email, client.ip)
            .await
            .map_err(|retry_after| ServiceError::RateLimited { retry_after })?;

        if !is_allowed_email(&email, &self.config.allowed_domains) {
            tracing::warn!("Sign-in refused for {}: domain not allowed", email);
            return Err(ServiceError::invalid(DOMAIN_DENIED));
        }

        let callback = callback_url.filter(|c| !c.is_empty()).unwrap_or("/");
        if !self.is_trusted_callback(callback) {
            return Err(ServiceError::invalid("Invalid callback URL"));
        }

        let token = generate_token();
        let now = Utc::now();
        let record = VerificationToken {
            id: new_id(),
            identifier: email.clone(),
            value: hash_token(&token),
            expires_at: now + Duration::seconds(self.config.magic_link_expires_seconds),
            created_at: now,
            updated_at: now,
        };
        self.tokens
            .replace(&record)
            .await
            .or_fail("Failed to send email. Please try again.")?;

        let url = format!(
            "{}/api/auth/magic-link/verify?token={}&callbackURL={}",
            self.base_url,
            token,
            urlencoding::encode(callback)
        );
        let minutes = (self.config.magic_link_expires_seconds / 60).max(1);
        self.email
            .send_magic_link(&email, &url, minutes)
            .await
            .map_err(|e| ServiceError::failed("Failed to send email. Please try again.", e))?;

        tracing::info!("Magic link sent to {}", email);
        Ok(())
    }

    /// Consume a magic-link token and open a session for its owner
    pub async fn verify_magic_link(&self, token: &str, client: &ClientInfo) -> ServiceResult<SignIn> {
        if token.trim().is_empty() {
            return Err(ServiceError::invalid(INVALID_LINK));
        }

        let record = self
            .tokens
            .take(&hash_token(token.trim()))
            .await
            .or_fail("Failed to sign in")?
            .ok_or_else(|| ServiceError::invalid(INVALID_LINK))?;
        if record.is_expired() {
            return Err(ServiceError::invalid(INVALID_LINK));
        }

        let user = self.find_or_create_user(&record.identifier).await?;

        let now = Utc::now();
        let session = Session {
            id: new_id(),
            session_token: generate_token(),
            user_id: user.id.clone(),
            expires: now + Duration::days(self.config.session_expires_days),
            ip_address: client.ip.map(|ip| ip.to_string()),
            user_agent: client.user_agent.clone(),
            created_at: now,
            updated_at: now,
        };
        let session = self
            .sessions
            .create(&session)
            .await
            .or_fail("Failed to sign in")?;

        self.limiter.clear_email(&user.email).await;
        tracing::info!("User {} signed in", user.email);

        Ok(SignIn {
            session_token: session.session_token,
            expires: session.expires,
            user: user.into(),
        })
    }

    async fn find_or_create_user(&self, email: &str) -> ServiceResult<User> {
        if let Some(user) = self.users.get_by_email(email).await.or_fail("Failed to sign in")? {
            return Ok(user);
        }

        match self.users.create(&User::new_staff(email)).await {
            Ok(user) => {
                tracing::info!("Created account for {}", user.email);
                Ok(user)
            }
            // Lost a race with a concurrent sign-in for the same address
            Err(e) => self
                .users
                .get_by_email(email)
                .await
                .or_fail("Failed to sign in")?
                .ok_or_else(|| ServiceError::failed("Failed to sign in", e)),
        }
    }

    /// The signed-in user behind a session token, if the session is live
    pub async fn resolve_session(&self, token: &str) -> ServiceResult<Option<SessionUser>> {
        let Some(session) = self
            .sessions
            .get_by_token(token)
            .await
            .or_fail("Failed to load session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            if let Err(e) = self.sessions.delete_by_token(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .users
            .get_by_id(&session.user_id)
            .await
            .or_fail("Failed to load session")?;
        Ok(user.map(SessionUser::from))
    }

    pub async fn sign_out(&self, token: &str) -> ServiceResult<()> {
        self.sessions
            .delete_by_token(token)
            .await
            .or_fail("Failed to sign out")
    }

    /// Drop expired sessions, tokens and rate-limit windows.
    ///
    /// Returns the number of sessions and tokens removed.
    pub async fn cleanup_expired(&self) -> ServiceResult<(u64, u64)> {
        let sessions = self
            .sessions
            .delete_expired()
            .await
            .or_fail("Failed to clean up sessions")?;
        let tokens = self
            .tokens
            .delete_expired()
            .await
            .or_fail("Failed to clean up verification tokens")?;
        self.limiter.cleanup().await;

        if sessions > 0 || tokens > 0 {
            tracing::debug!("Removed {} expired sessions and {} tokens", sessions, tokens);
        }
        Ok((sessions, tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{
        SqlxSessionRepository, SqlxUserRepository, SqlxVerificationRepository,
    };
    use crate::models::Role;
    use crate::services::email::MemoryMailer;
    use std::str::FromStr;

    struct Fixture {
        auth: AuthService,
        mailer: Arc<MemoryMailer>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        pool: crate::db::DynDatabasePool,
    }

    async fn fixture_with(mailer: Arc<MemoryMailer>) -> Fixture {
        let pool = setup_pool().await;
        let email = Arc::new(
            EmailService::new(mailer.clone(), "Wellbeing Hub", "http://hub.test", None).unwrap(),
        );
        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let config = AuthConfig {
            trusted_origins: vec!["https://intranet.test/".to_string()],
            ..AuthConfig::default()
        };
        let auth = AuthService::new(
            users.clone(),
            sessions.clone(),
            SqlxVerificationRepository::boxed(pool.clone()),
            email,
            config,
            "http://hub.test",
        );
        Fixture {
            auth,
            mailer,
            users,
            sessions,
            pool,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryMailer::new())).await
    }

    fn token_from(url_text: &str) -> String {
        let start = url_text.find("token=").unwrap() + "token=".len();
        url_text[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }

    async fn request_token(f: &Fixture, email: &str) -> String {
        f.auth
            .request_magic_link(email, Some("/news"), &ClientInfo::default())
            .await
            .unwrap();
        token_from(&f.mailer.sent().last().unwrap().text)
    }

    #[test]
    fn test_is_allowed_email() {
        let domains = vec!["4wdc.com.au".to_string(), "inghamtoyota.com.au".to_string()];
        assert!(is_allowed_email("jane@4wdc.com.au", &domains));
        assert!(is_allowed_email("  Jane@4WDC.com.AU ", &domains));
        assert!(!is_allowed_email("jane@gmail.com", &domains));
        assert!(!is_allowed_email("jane@sub.4wdc.com.au", &domains));
        assert!(!is_allowed_email("@4wdc.com.au", &domains));
        assert!(!is_allowed_email("a@b@4wdc.com.au", &domains));
        assert!(!is_allowed_email("4wdc.com.au", &domains));
    }

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_trusted_callbacks() {
        let f = fixture().await;
        assert!(f.auth.is_trusted_callback("/"));
        assert!(f.auth.is_trusted_callback("/dashboard?tab=1"));
        assert!(f.auth.is_trusted_callback("http://hub.test/news"));
        assert!(f.auth.is_trusted_callback("http://hub.test"));
        assert!(f.auth.is_trusted_callback("https://intranet.test/hub?x=1"));
        assert!(!f.auth.is_trusted_callback("http://localhost:3000/x"));
        assert!(!f.auth.is_trusted_callback("//evil.test"));
        assert!(!f.auth.is_trusted_callback("http://hub.test.evil.test/"));
        assert!(!f.auth.is_trusted_callback("https://evil.test/"));
    }

    #[tokio::test]
    async fn test_sign_in_creates_staff_user_and_session() {
        let f = fixture().await;
        let token = request_token(&f, "New.Person@4wdc.com.au").await;

        let sent = f.mailer.sent();
        assert_eq!(sent[0].to, "new.person@4wdc.com.au");
        assert!(sent[0].text.contains("callbackURL=%2Fnews"));

        let client = ClientInfo {
            ip: Some(IpAddr::from_str("10.0.0.7").unwrap()),
            user_agent: Some("test-agent".to_string()),
        };
        let sign_in = f.auth.verify_magic_link(&token, &client).await.unwrap();
        assert_eq!(sign_in.user.email, "new.person@4wdc.com.au");
        assert_eq!(sign_in.user.role, Role::Staff);
        assert!(sign_in.expires > Utc::now() + Duration::days(6));

        let user = f.users.get_by_email("new.person@4wdc.com.au").await.unwrap().unwrap();
        assert!(user.email_verified.is_some());

        let session = f.sessions.get_by_token(&sign_in.session_token).await.unwrap().unwrap();
        assert_eq!(session.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(session.user_agent.as_deref(), Some("test-agent"));

        let resolved = f.auth.resolve_session(&sign_in.session_token).await.unwrap();
        assert_eq!(resolved.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let f = fixture().await;
        let token = request_token(&f, "jane@4wdc.com.au").await;

        assert!(f.auth.verify_magic_link(&token, &ClientInfo::default()).await.is_ok());
        let err = f
            .auth
            .verify_magic_link(&token, &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::invalid(INVALID_LINK));
    }

    #[tokio::test]
    async fn test_new_request_replaces_previous_token() {
        let f = fixture().await;
        let first = request_token(&f, "jane@4wdc.com.au").await;
        let second = request_token(&f, "jane@4wdc.com.au").await;

        assert!(f.auth.verify_magic_link(&first, &ClientInfo::default()).await.is_err());
        assert!(f.auth.verify_magic_link(&second, &ClientInfo::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_existing_user_keeps_role() {
        let f = fixture().await;
        let mut user = User::new_staff("boss@4wdc.com.au");
        user.role = Role::Admin;
        f.users.create(&user).await.unwrap();

        let token = request_token(&f, "boss@4wdc.com.au").await;
        let sign_in = f.auth.verify_magic_link(&token, &ClientInfo::default()).await.unwrap();
        assert_eq!(sign_in.user.id, user.id);
        assert_eq!(sign_in.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_disallowed_domain_is_rejected() {
        let f = fixture().await;
        let err = f
            .auth
            .request_magic_link("someone@gmail.com", None, &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::invalid(DOMAIN_DENIED));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_untrusted_callback_is_rejected() {
        let f = fixture().await;
        let err = f
            .auth
            .request_magic_link("jane@4wdc.com.au", Some("https://evil.test"), &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_after_five_requests() {
        let f = fixture().await;
        for _ in 0..5 {
            request_token(&f, "jane@4wdc.com.au").await;
        }
        let err = f
            .auth
            .request_magic_link("jane@4wdc.com.au", None, &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_reported() {
        let f = fixture_with(Arc::new(MemoryMailer::failing())).await;
        let err = f
            .auth
            .request_magic_link("jane@4wdc.com.au", None, &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Failed("Failed to send email. Please try again.".to_string())
        );
    }

    #[tokio::test]
    async fn test_sign_out_and_expired_sessions() {
        let f = fixture().await;
        let token = request_token(&f, "jane@4wdc.com.au").await;
        let sign_in = f.auth.verify_magic_link(&token, &ClientInfo::default()).await.unwrap();

        f.auth.sign_out(&sign_in.session_token).await.unwrap();
        assert!(f.auth.resolve_session(&sign_in.session_token).await.unwrap().is_none());

        // An expired session resolves to nothing and is removed
        let user = f.users.get_by_email("jane@4wdc.com.au").await.unwrap().unwrap();
        let now = Utc::now();
        let stale = Session {
            id: new_id(),
            session_token: "stale".to_string(),
            user_id: user.id,
            expires: now - Duration::hours(1),
            ip_address: None,
            user_agent: None,
            created_at: now - Duration::days(8),
            updated_at: now - Duration::days(8),
        };
        f.sessions.create(&stale).await.unwrap();
        assert!(f.auth.resolve_session("stale").await.unwrap().is_none());
        assert!(f.sessions.get_by_token("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_change_visible_on_next_resolve() {
        let f = fixture().await;
        let token = request_token(&f, "jane@4wdc.com.au").await;
        let sign_in = f.auth.verify_magic_link(&token, &ClientInfo::default()).await.unwrap();

        f.users.update_role(&sign_in.user.id, Role::Editor).await.unwrap();
        let user = f.auth.resolve_session(&sign_in.session_token).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Editor);
    }

    #[tokio::test]
    async fn test_missing_stored_role_resolves_as_staff() {
        let f = fixture().await;
        let token = request_token(&f, "legacy@4wdc.com.au").await;
        let sign_in = f.auth.verify_magic_link(&token, &ClientInfo::default()).await.unwrap();

        for stored in ["", "superuser"] {
            f.pool
                .execute(&format!(
                    "UPDATE users SET role = '{}' WHERE id = '{}'",
                    stored, sign_in.user.id
                ))
                .await
                .unwrap();
            let user = f.auth.resolve_session(&sign_in.session_token).await.unwrap().unwrap();
            assert_eq!(user.role, Role::Staff);
        }
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let f = fixture().await;
        let (sessions, tokens) = f.auth.cleanup_expired().await.unwrap();
        assert_eq!((sessions, tokens), (0, 0));
    }
}
