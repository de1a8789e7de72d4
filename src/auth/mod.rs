/*!
 * # Authentication Module
 *
 * Admin accounts, password hashing and session tokens.
 *
 * - Passwords are stored as argon2 PHC strings
 * - Sessions are HS256 JWTs accepted from `Authorization: Bearer` or the
 *   `access_token` cookie
 * - [`AuthRouterExt::with_auth`] guards a router; handlers read the caller through the
 *   [`AuthUser`] extractor
 */

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    config::AppConfig,
    errors::ServiceError,
    services::audit::{AuditAction, AuditEntry},
    AppState,
};

pub mod user;

/// Name of the session cookie set on login.
pub const SESSION_COOKIE: &str = "access_token";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub email: String, // User's email
    pub name: String,  // User's name
    pub iss: String,   // Issuer
    pub iat: i64,      // Issued at time
    pub exp: i64,      // Expiration time
}

/// Authenticated caller, inserted into request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
    pub cookie_secure: bool,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        token_expiration: Duration,
        cookie_secure: bool,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            token_expiration,
            cookie_secure,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            cfg.cookie_secure,
        )
    }
}

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashError(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Authentication service that handles accounts, token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Creates an admin account. Emails are compared case-insensitively.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<user::Model, AuthError> {
        let email = normalize_email(&request.email);

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| match ServiceError::from_write(e, "") {
            ServiceError::Conflict(_) => AuthError::EmailTaken,
            ServiceError::DatabaseError(e) => AuthError::DatabaseError(e),
            other => AuthError::InternalError(other.to_string()),
        })?;

        info!(user_id = %created.id, "Admin account registered");
        Ok(created)
    }

    /// Verifies credentials and returns the matching active account.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<user::Model, AuthError> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&*self.db)
            .await?;

        let Some(account) = found else {
            debug!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash) {
            debug!(user_id = %account.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(account)
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, account: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            name: account.name.clone(),
            iss: self.config.jwt_issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolves a token into the caller it was issued for.
    pub fn authenticate_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            user_id,
            email: claims.email,
            name: claims.name,
        })
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.config.token_expiration.as_secs()
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that expires the session cookie.
    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Account is disabled")]
    InactiveUser,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    HashError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InactiveUser => ServiceError::Unauthorized(err.to_string()),
            AuthError::EmailTaken => ServiceError::Conflict(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
            AuthError::HashError(msg) => ServiceError::HashError(msg),
            AuthError::DatabaseError(e) => ServiceError::DatabaseError(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication middleware that extracts and validates session tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return ServiceError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    let Some(token) = extract_token(request.headers()) else {
        return AuthError::MissingAuth.into_response();
    };

    match auth_service.authenticate_token(&token) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "Rejected session token");
            e.into_response()
        }
    }
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if long_enough && has_lower && has_upper && has_digit && has_symbol {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message = Some(
            "Password must be at least 8 characters and include upper and lower case letters, a digit and a symbol"
                .into(),
        );
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginCredentials {
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: AuthUser,
}

/// Authentication routes
pub fn auth_routes() -> Router<AppState> {
    let protected = Router::new().route("/me", get(me_handler)).with_auth();

    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .merge(protected)
}

async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    request.validate()?;
    let account = state.auth.register(request).await?;

    state
        .services
        .audit
        .record(
            AuditEntry::new(
                AuditAction::Register,
                format!("Registered admin {}", account.email),
            )
            .by(Some(account.id))
            .with_metadata(json!({ "userId": account.id })),
        )
        .await;

    let body = AuthUser {
        user_id: account.id,
        email: account.email,
        name: account.name,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// Login handler
async fn login_handler(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Response, ServiceError> {
    credentials.validate()?;
    let account = state
        .auth
        .authenticate(&credentials.email, &credentials.password)
        .await
        .map_err(|e| {
            warn!(error = %e, "Login failed");
            e
        })?;
    let token = state.auth.generate_token(&account)?;

    state
        .services
        .audit
        .record(
            AuditEntry::new(AuditAction::Login, format!("{} logged in", account.email))
                .by(Some(account.id)),
        )
        .await;

    let cookie = HeaderValue::from_str(&state.auth.session_cookie(&token))
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;
    let body = LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.config.token_expiration.as_secs(),
        user: AuthUser {
            user_id: account.id,
            email: account.email,
            name: account.name,
        },
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn logout_handler(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let cookie = HeaderValue::from_str(&state.auth.clear_cookie())
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

async fn me_handler(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let db = DatabaseConnection::Disconnected;
        AuthService::new(
            AuthConfig::new(
                "unit_test_secret_with_plenty_of_entropy_123".into(),
                "retail-admin-api".into(),
                Duration::from_secs(3600),
                false,
            ),
            Arc::new(db),
        )
    }

    fn account() -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            name: "Ada Admin".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("S3cure!pass").unwrap();
        assert!(verify_password("S3cure!pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("S3cure!pass", "not-a-phc-string"));
    }

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("S3cure!pass").is_ok());
        assert!(validate_password_strength("Sh0rt!").is_err());
        assert!(validate_password_strength("alllower1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSymbol123").is_err());
    }

    #[test]
    fn issued_token_authenticates() {
        let auth = service();
        let account = account();
        let token = auth.generate_token(&account).unwrap();
        let user = auth.authenticate_token(&token).unwrap();
        assert_eq!(user.user_id, account.id);
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let auth = service();
        let mut other = service();
        other.config.jwt_secret = "a_completely_different_secret_value_987".into();
        let token = other.generate_token(&account()).unwrap();
        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn token_is_read_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def.ghi"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn secure_flag_follows_config() {
        let mut auth = service();
        assert!(!auth.session_cookie("t").contains("Secure"));
        auth.config.cookie_secure = true;
        let cookie = auth.session_cookie("t");
        assert!(cookie.starts_with("access_token=t;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
    }
}
