//! Authentication Service
//! Mission: Sign-up, login, logout and identity resolution on top of the stores

use crate::{
    auth::{
        middleware::AuthGate,
        models::{ClientMetadata, Identity, Session, SignUpRequest},
        password::PasswordHasher,
        session_store::SessionStore,
        user_store::{NewIdentity, UserStore},
    },
    error::{AppError, AppResult},
    ids::TypedId,
};
use axum::http::HeaderMap;
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;
// DoS guard: bcrypt work is bounded, but parsing huge bodies is not.
const MAX_PASSWORD_LEN: usize = 1000;
const MAX_EMAIL_LEN: usize = 254;
const MAX_USERNAME_LEN: usize = 64;

#[derive(Clone)]
pub struct AuthService {
    users: UserStore,
    sessions: SessionStore,
    passwords: PasswordHasher,
    gate: AuthGate,
}

impl AuthService {
    pub fn new(users: UserStore, sessions: SessionStore, passwords: PasswordHasher) -> Self {
        let gate = AuthGate::new(sessions.clone());
        Self {
            users,
            sessions,
            passwords,
            gate,
        }
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Create an active identity. The returned value never serializes its digest.
    pub fn sign_up(&self, req: &SignUpRequest) -> AppResult<Identity> {
        let email = req.email.trim();
        let username = req.username.trim();
        validate_email(email)?;
        validate_username(username)?;
        validate_password(&req.password)?;

        let password_hash = self.passwords.hash(&req.password)?;
        self.users.create(NewIdentity {
            email,
            username,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            password_hash,
        })
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown email and wrong password are both `InvalidCredentials`; the password is
    /// checked before the account status so suspension is only revealed to someone who
    /// knows the password.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
        client: ClientMetadata,
    ) -> AppResult<(Identity, Session)> {
        if email.len() > MAX_EMAIL_LEN || password.len() > MAX_PASSWORD_LEN {
            return Err(AppError::InvalidCredentials);
        }

        let Some(identity) = self.users.get_by_email(email.trim())? else {
            self.passwords.verify_dummy(password);
            return Err(AppError::InvalidCredentials);
        };

        if !self.passwords.verify(&identity.password_hash, password)? {
            warn!(user_id = %identity.id, "Failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        if identity.is_suspended() {
            warn!(user_id = %identity.id, "Login refused for suspended account");
            return Err(AppError::AccountSuspended);
        }

        let session = self.sessions.create(&identity.id, client, remember)?;

        if let Err(e) = self.users.touch_last_login(&identity.id) {
            // Not critical to the login itself.
            warn!(user_id = %identity.id, error = %e, "Failed to update last login");
        }

        info!(user_id = %identity.id, remember, "User logged in");
        Ok((identity, session))
    }

    /// Destroy the session named by `headers`.
    pub fn logout(&self, headers: &HeaderMap) -> AppResult<()> {
        let token = crate::auth::middleware::bearer_token(headers)?;
        self.logout_token(&token)
    }

    pub fn logout_token(&self, token: &TypedId) -> AppResult<()> {
        self.sessions.destroy(token)?;
        info!(session = %token.redacted(), "User logged out");
        Ok(())
    }

    /// Optional-mode resolution: any failure means "anonymous".
    pub fn resolve_identity(&self, headers: &HeaderMap) -> Option<Identity> {
        self.gate.authenticate(headers).ok()
    }
}

fn validate_email(email: &str) -> AppResult<()> {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(AppError::validation("email is required"));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(AppError::validation("email is invalid")),
    }
}

fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty()
        || username.len() > MAX_USERNAME_LEN
        || username.chars().any(char::is_whitespace)
    {
        return Err(AppError::validation("username is invalid"));
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < MIN_PASSWORD_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
