//! Authentication Models
//! Mission: Identity and session records, plus the request/response shapes around them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account status. Suspended identities never pass the auth gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "suspended")]
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(AccountStatus::Active),
            "suspended" => Some(AccountStatus::Suspended),
            _ => None,
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt digest - never serialize
    pub status: AccountStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_suspended(&self) -> bool {
        self.status == AccountStatus::Suspended
    }
}

/// Client details recorded alongside a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Server-side session record. The id is the bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

/// Fields required to create an identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: IdentityResponse,
}

/// Identity as returned to its owner (sanitized)
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub status: AccountStatus,
}

impl IdentityResponse {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            status: identity.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity() -> Identity {
        Identity {
            id: "usr_0123456789abcdef0123456789abcdef".to_string(),
            email: "a@x.com".to_string(),
            username: "ada".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            bio: None,
            password_hash: "$2b$04$secretdigest".to_string(),
            status: AccountStatus::Active,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_account_status_serialization() {
        let json = serde_json::to_string(&AccountStatus::Suspended).unwrap();
        assert_eq!(json, r#""suspended""#);
        assert_eq!(AccountStatus::parse("ACTIVE"), Some(AccountStatus::Active));
        assert_eq!(AccountStatus::parse("banned"), None);
    }

    #[test]
    fn test_identity_never_serializes_digest() {
        let json = serde_json::to_string(&sample_identity()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("secretdigest"));
    }

    #[test]
    fn test_identity_response_has_no_password_field() {
        let resp = IdentityResponse::from_identity(&sample_identity());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["username"], "ada");
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_login_request_remember_defaults_false() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"longenough1"}"#).unwrap();
        assert!(!req.remember);
    }
}
