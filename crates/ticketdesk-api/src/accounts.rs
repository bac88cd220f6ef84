use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use ticketdesk_db::UserRepository;
use ticketdesk_types::api::Claims;
use ticketdesk_types::error::{AuthFailure, DeskError, DeskResult};
use ticketdesk_types::models::{User, UserRecord};

pub const MIN_PASSWORD_LEN: usize = 6;

pub const DEMO_EMAIL: &str = "test@example.com";
pub const DEMO_PASSWORD: &str = "password123";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern is valid"));

/// Checked against when the email is unknown, so a miss costs the same Argon2
/// work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| hash_password("no-such-account").ok());

/// A signed bearer token and the moment it stops being accepted.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Owns the user collection and issues/validates bearer credentials.
#[derive(Clone)]
pub struct AccountStore {
    inner: Arc<AccountsInner>,
}

struct AccountsInner {
    users: Arc<dyn UserRepository>,
    jwt_secret: String,
    token_ttl: Duration,
    /// Revoked token ids -> their `exp`, kept until they would have expired anyway.
    revoked: Mutex<HashMap<String, usize>>,
}

impl AccountStore {
    pub fn new(users: Arc<dyn UserRepository>, jwt_secret: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(AccountsInner {
                users,
                jwt_secret: jwt_secret.into(),
                token_ttl,
                revoked: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn signup(
        &self,
        email: &str,
        password: &str,
        confirm: Option<&str>,
    ) -> DeskResult<(User, Credential)> {
        let user = self.register(email, password, confirm)?;
        let credential = self.issue(&user)?;
        Ok((user, credential))
    }

    /// Create an account without issuing a token (the cookie flow starts a
    /// session instead).
    pub fn register(&self, email: &str, password: &str, confirm: Option<&str>) -> DeskResult<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DeskError::validation("Email is required."));
        }
        if !EMAIL_RE.is_match(&email) {
            return Err(DeskError::validation("Email is invalid."));
        }
        if password.is_empty() {
            return Err(DeskError::validation("Password is required."));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DeskError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        if confirm.is_some_and(|c| c != password) {
            return Err(DeskError::validation("Passwords do not match."));
        }

        if self.inner.users.find_by_email(&email)?.is_some() {
            return Err(duplicate());
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: hash_password(password)?,
        };
        if !self.inner.users.insert(&record)? {
            return Err(duplicate());
        }

        info!("User {} signed up", record.id);
        Ok(record.to_user())
    }

    pub fn login(&self, email: &str, password: &str) -> DeskResult<(User, Credential)> {
        let user = self.verify(email, password)?;
        let credential = self.issue(&user)?;
        Ok((user, credential))
    }

    /// Check an email/password pair.
    pub fn verify(&self, email: &str, password: &str) -> DeskResult<User> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(DeskError::validation("Email and password are required."));
        }

        let Some(record) = self.inner.users.find_by_email(&email)? else {
            if let Some(hash) = DUMMY_HASH.as_deref() {
                let _ = password_matches(password, hash);
            }
            warn!("Login attempt for unknown account");
            return Err(DeskError::Auth(AuthFailure::InvalidCredentials));
        };

        let matched = password_matches(password, &record.password_hash)
            .map_err(|e| anyhow!("stored hash for user {} is unreadable: {}", record.id, e))?;
        if !matched {
            warn!("Wrong password for user {}", record.id);
            return Err(DeskError::Auth(AuthFailure::InvalidCredentials));
        }

        Ok(record.to_user())
    }

    /// Resolve a bearer token to its user. `None` for anything that is not a
    /// live token of an existing account.
    pub fn validate_credential(&self, token: &str) -> DeskResult<Option<User>> {
        let Some(claims) = self.decode(token) else {
            return Ok(None);
        };
        if self.is_revoked(&claims.jti)? {
            return Ok(None);
        }
        Ok(self.inner.users.find_by_id(&claims.sub)?.map(|r| r.to_user()))
    }

    /// Revoke a token so later validation fails.
    pub fn logout(&self, token: &str) -> DeskResult<()> {
        let claims = self
            .decode(token)
            .ok_or(DeskError::Auth(AuthFailure::Unauthenticated))?;
        let now = Utc::now().timestamp().max(0) as usize;
        let mut revoked = self.revoked()?;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti, claims.exp);
        info!("Token revoked for user {}", claims.sub);
        Ok(())
    }

    /// Create the demo account when no account exists yet.
    pub fn seed_demo_user(&self) -> DeskResult<Option<User>> {
        if self.inner.users.count()? > 0 {
            return Ok(None);
        }
        let user = self.register(DEMO_EMAIL, DEMO_PASSWORD, None)?;
        info!("Seeded demo account {}", DEMO_EMAIL);
        Ok(Some(user))
    }

    fn issue(&self, user: &User) -> DeskResult<Credential> {
        let now = Utc::now();
        let expires_at = now + self.inner.token_ttl;
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.inner.jwt_secret.as_bytes()),
        )
        .map_err(|e| anyhow!("signing token: {}", e))?;

        Ok(Credential { token, expires_at })
    }

    fn decode(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.inner.jwt_secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|data| data.claims)
    }

    fn is_revoked(&self, jti: &str) -> DeskResult<bool> {
        Ok(self.revoked()?.contains_key(jti))
    }

    fn revoked(&self) -> DeskResult<std::sync::MutexGuard<'_, HashMap<String, usize>>> {
        self.inner
            .revoked
            .lock()
            .map_err(|e| DeskError::Internal(anyhow!("revocation list lock poisoned: {}", e)))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn duplicate() -> DeskError {
    DeskError::Duplicate("User with this email already exists.".to_string())
}

fn hash_password(password: &str) -> DeskResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("hashing password: {}", e))?
        .to_string();
    Ok(hash)
}

fn password_matches(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketdesk_db::memory::MemoryUserRepository;

    fn accounts() -> AccountStore {
        AccountStore::new(
            Arc::new(MemoryUserRepository::default()),
            "test-secret",
            Duration::hours(1),
        )
    }

    #[test]
    fn signup_issues_working_credential_and_hashes_password() {
        let users = Arc::new(MemoryUserRepository::default());
        let store = AccountStore::new(users.clone(), "test-secret", Duration::hours(1));

        let (user, credential) = store.signup("Alice@Example.com ", "hunter22", None).unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert!(credential.expires_at > Utc::now());

        let record = users.find_by_email("alice@example.com").unwrap().unwrap();
        assert_ne!(record.password_hash, "hunter22");
        assert!(record.password_hash.starts_with("$argon2"));

        assert_eq!(store.validate_credential(&credential.token).unwrap(), Some(user));
    }

    #[test]
    fn signup_twice_with_same_email_is_duplicate() {
        let store = accounts();
        store.signup("bob@example.com", "secret1", None).unwrap();
        let err = store.signup("BOB@example.com", "secret2", None).unwrap_err();
        assert!(matches!(err, DeskError::Duplicate(_)));
    }

    #[test]
    fn signup_validates_input() {
        let store = accounts();
        for (email, password, confirm) in [
            ("", "secret1", None),
            ("not-an-email", "secret1", None),
            ("c@example.com", "", None),
            ("c@example.com", "short", None),
            ("c@example.com", "secret1", Some("secret2")),
        ] {
            let err = store.signup(email, password, confirm).unwrap_err();
            assert!(matches!(err, DeskError::Validation(_)), "{email:?}/{password:?}");
        }
    }

    #[test]
    fn login_with_wrong_password_fails_without_credential() {
        let store = accounts();
        store.signup("dana@example.com", "correct-horse", None).unwrap();

        let err = store.login("dana@example.com", "battery-staple").unwrap_err();
        assert!(matches!(err, DeskError::Auth(AuthFailure::InvalidCredentials)));

        let err = store.login("nobody@example.com", "correct-horse").unwrap_err();
        assert!(matches!(err, DeskError::Auth(AuthFailure::InvalidCredentials)));

        let (user, credential) = store.login("dana@example.com", "correct-horse").unwrap();
        assert_eq!(store.validate_credential(&credential.token).unwrap(), Some(user));
    }

    #[test]
    fn unknown_email_still_runs_a_password_check() {
        let hash = DUMMY_HASH.as_deref().expect("dummy hash is computed");
        assert!(hash.starts_with("$argon2"));
        assert!(!password_matches("anything", hash).unwrap());

        let store = accounts();
        let err = store.verify("ghost@example.com", "whatever1").unwrap_err();
        assert!(matches!(err, DeskError::Auth(AuthFailure::InvalidCredentials)));
    }

    #[test]
    fn logout_revokes_only_that_token() {
        let store = accounts();
        let (_, first) = store.signup("eve@example.com", "secret1", None).unwrap();
        let (_, second) = store.login("eve@example.com", "secret1").unwrap();

        store.logout(&first.token).unwrap();
        assert_eq!(store.validate_credential(&first.token).unwrap(), None);
        assert!(store.validate_credential(&second.token).unwrap().is_some());
    }

    #[test]
    fn expired_forged_or_garbage_tokens_are_rejected() {
        let users = Arc::new(MemoryUserRepository::default());
        let expired = AccountStore::new(users.clone(), "test-secret", Duration::seconds(-30));
        let (_, stale) = expired.signup("old@example.com", "secret1", None).unwrap();
        assert_eq!(expired.validate_credential(&stale.token).unwrap(), None);

        let other = AccountStore::new(users, "other-secret", Duration::hours(1));
        let (_, foreign) = other.login("old@example.com", "secret1").unwrap();
        assert_eq!(expired.validate_credential(&foreign.token).unwrap(), None);

        assert_eq!(expired.validate_credential("mock-token-for-user-id-1").unwrap(), None);
    }

    #[test]
    fn demo_user_is_seeded_only_into_an_empty_store() {
        let store = accounts();
        assert!(store.seed_demo_user().unwrap().is_some());
        assert!(store.seed_demo_user().unwrap().is_none());
        assert!(store.verify(DEMO_EMAIL, DEMO_PASSWORD).is_ok());
    }
}
