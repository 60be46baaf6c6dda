/// User accounts: registration, login, search and public summaries
///
/// The public `UserSummary` is an explicit read-model join of `user` with
/// `profile`, since the avatar lives on the profile.
use crate::{
    auth,
    config::ServerConfig,
    error::{AppError, AppResult},
    friends::FriendStatus,
    notifications::{NotificationManager, NotificationType},
    validation::{validate_input, FieldError},
};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_graphql::{InputObject, SimpleObject};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use validator::Validate;

/// Maximum number of users returned by a search
pub const SEARCH_LIMIT: i64 = 50;

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[graphql(name = "User")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl UserSummary {
    /// Select list for a summary joined as `{user_alias}` + `{profile_alias}`,
    /// with every column prefixed so several summaries fit in one row
    pub(crate) fn columns(user_alias: &str, profile_alias: &str, prefix: &str) -> String {
        format!(
            "{u}.id AS {p}id, {u}.name AS {p}name, {u}.email AS {p}email, {pr}.avatar AS {p}avatar",
            u = user_alias,
            pr = profile_alias,
            p = prefix
        )
    }

    /// Read a summary selected with [`UserSummary::columns`]
    pub(crate) fn from_row(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(UserSummary {
            id: row.try_get(format!("{}id", prefix).as_str())?,
            name: row.try_get(format!("{}name", prefix).as_str())?,
            email: row.try_get(format!("{}email", prefix).as_str())?,
            avatar: row.try_get(format!("{}avatar", prefix).as_str())?,
        })
    }
}

/// A search hit annotated with the viewer's relationship to it
#[derive(Debug, Clone, SimpleObject)]
pub struct UserSearchResult {
    #[graphql(flatten)]
    pub user: UserSummary,
    pub friend_status: FriendStatus,
}

/// Token plus the user it was issued for
#[derive(Debug, Clone, SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, InputObject, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, InputObject, Validate)]
pub struct LoginInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, InputObject, Validate)]
pub struct ForgotPasswordInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, InputObject, Validate)]
pub struct ResetPasswordInput {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct ResetTokenValidation {
    pub valid: bool,
    pub message: String,
}

const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists with that email, a password reset link has been sent";

/// User manager service
pub struct UserManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    notifications: Arc<NotificationManager>,
}

impl UserManager {
    /// Create a new user manager
    pub fn new(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            db,
            config,
            notifications,
        }
    }

    /// Create an account and its profile, returning a session token
    pub async fn register(&self, mut input: RegisterInput) -> AppResult<AuthPayload> {
        input.name = input.name.trim().to_string();
        input.email = input.email.trim().to_lowercase();
        validate_input(&input)?;

        let RegisterInput {
            name,
            email,
            password,
        } = input;

        if self.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&password)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let user_id: i64 = sqlx::query(
            "INSERT INTO user (name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
        )
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict("Email already registered".to_string())
            } else {
                AppError::Database(e)
            }
        })?
        .try_get("id")?;

        sqlx::query(
            "INSERT INTO profile (user_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(user_id)
        .bind(&name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id, "Registered user");

        let token = self.issue(user_id, &email)?;
        Ok(AuthPayload {
            token,
            user: UserSummary {
                id: user_id,
                name,
                email,
                avatar: None,
            },
        })
    }

    /// Verify credentials and issue a session token
    pub async fn login(&self, mut input: LoginInput) -> AppResult<AuthPayload> {
        input.email = input.email.trim().to_lowercase();
        validate_input(&input)?;

        let row = sqlx::query("SELECT id, password_hash FROM user WHERE email = ?1")
            .bind(&input.email)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            tracing::warn!("Login attempt for unknown email");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        };

        let user_id: i64 = row.try_get("id")?;
        let password_hash: String = row.try_get("password_hash")?;

        if !verify_password(&input.password, &password_hash)? {
            tracing::warn!(user_id, "Login attempt with wrong password");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let user = self.get_summary(user_id).await?;
        let token = self.issue(user_id, &user.email)?;

        Ok(AuthPayload { token, user })
    }

    /// Public summary of a user
    pub async fn get_summary(&self, user_id: i64) -> AppResult<UserSummary> {
        let sql = format!(
            "SELECT {} FROM user u LEFT JOIN profile p ON p.user_id = u.id WHERE u.id = ?1",
            UserSummary::columns("u", "p", "")
        );

        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(UserSummary::from_row(&row, "")?)
    }

    /// Start a password reset. The reply never reveals whether the email is
    /// registered; the token is written to the log in place of a mail.
    pub async fn forgot_password(&self, input: ForgotPasswordInput) -> AppResult<SuccessResponse> {
        if let Some((user_id, token)) = self.request_password_reset(input).await? {
            tracing::info!(user_id, reset_token = %token, "Password reset requested");
        }

        Ok(SuccessResponse {
            success: true,
            message: RESET_REQUESTED_MESSAGE.to_string(),
        })
    }

    /// Issue a reset token for the account behind an email, if any
    pub async fn request_password_reset(
        &self,
        mut input: ForgotPasswordInput,
    ) -> AppResult<Option<(i64, String)>> {
        input.email = input.email.trim().to_lowercase();
        validate_input(&input)?;

        let row = sqlx::query("SELECT id, password_hash FROM user WHERE email = ?1")
            .bind(&input.email)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let user_id: i64 = row.try_get("id")?;
        let password_hash: String = row.try_get("password_hash")?;

        let token = auth::issue_reset_token(
            user_id,
            &hash_fingerprint(&password_hash)?,
            &self.config.authentication.jwt_secret,
            self.config.authentication.reset_token_ttl_minutes,
        )?;

        Ok(Some((user_id, token)))
    }

    /// Check a reset token without consuming it
    pub async fn validate_reset_token(&self, token: &str) -> AppResult<ResetTokenValidation> {
        let valid = match self.reset_target(token).await {
            Ok(_) => true,
            Err(AppError::BadRequest(_)) => false,
            Err(e) => return Err(e),
        };

        Ok(ResetTokenValidation {
            valid,
            message: if valid {
                "Token is valid".to_string()
            } else {
                "Token is invalid or expired".to_string()
            },
        })
    }

    /// Replace the password of the account a reset token was issued for
    pub async fn reset_password(&self, mut input: ResetPasswordInput) -> AppResult<AuthPayload> {
        input.token = input.token.trim().to_string();
        validate_input(&input)?;

        let user_id = self.reset_target(&input.token).await?;
        let password_hash = hash_password(&input.password)?;

        sqlx::query("UPDATE user SET password_hash = ?1 WHERE id = ?2")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id, "Password reset");

        self.notifications
            .notify(
                user_id,
                NotificationType::System,
                "Password Changed",
                "Your password has been successfully reset.",
                Some(json!({ "userId": user_id })),
            )
            .await;

        let user = self.get_summary(user_id).await?;
        let token = self.issue(user_id, &user.email)?;

        Ok(AuthPayload { token, user })
    }

    /// User a reset token may act on. The token stops working once the
    /// password it was issued against has changed.
    async fn reset_target(&self, token: &str) -> AppResult<i64> {
        let invalid = || AppError::BadRequest("Invalid or expired token".to_string());

        let claims = auth::verify_reset_token(token, &self.config.authentication.jwt_secret)?;

        let password_hash: String = sqlx::query("SELECT password_hash FROM user WHERE id = ?1")
            .bind(claims.sub)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(invalid)?
            .try_get("password_hash")?;

        if hash_fingerprint(&password_hash)? != claims.fpr {
            tracing::warn!(user_id = claims.sub, "Reset token already used");
            return Err(invalid());
        }

        Ok(claims.sub)
    }

    /// Case-insensitive substring search on name or email.
    /// Excludes the viewer; each hit carries the viewer's friend status.
    pub async fn search(&self, viewer: Option<i64>, query: &str) -> AppResult<Vec<UserSearchResult>> {
        if query.trim().is_empty() {
            return Err(AppError::Validation(vec![FieldError {
                path: "query".to_string(),
                message: "Search query is required".to_string(),
            }]));
        }

        let pattern = format!("%{}%", escape_like(query.trim()));
        let sql = format!(
            "SELECT {}, f.status AS friend_status
             FROM user u
             LEFT JOIN profile p ON p.user_id = u.id
             LEFT JOIN friend f
               ON (f.sender_id = u.id AND f.receiver_id = ?2)
               OR (f.sender_id = ?2 AND f.receiver_id = u.id)
             WHERE (u.name LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\')
               AND (?2 IS NULL OR u.id <> ?2)
             ORDER BY u.name COLLATE NOCASE, u.id
             LIMIT ?3",
            UserSummary::columns("u", "p", "")
        );

        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(viewer)
            .bind(SEARCH_LIMIT)
            .fetch_all(&self.db)
            .await?;

        rows.iter()
            .map(|row| {
                let status: Option<String> = row.try_get("friend_status")?;
                Ok(UserSearchResult {
                    user: UserSummary::from_row(row, "")?,
                    friend_status: status
                        .as_deref()
                        .map(FriendStatus::from_str)
                        .unwrap_or(FriendStatus::None),
                })
            })
            .collect()
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM user WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    fn issue(&self, user_id: i64, email: &str) -> AppResult<String> {
        auth::issue_token(
            user_id,
            email,
            &self.config.authentication.jwt_secret,
            self.config.authentication.token_ttl_days,
        )
    }
}

/// Hash a password with Argon2id
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Salt of a stored hash; changes every time the password is set
fn hash_fingerprint(hash: &str) -> AppResult<String> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
    parsed
        .salt
        .map(|salt| salt.as_str().to_string())
        .ok_or_else(|| AppError::Internal("Stored password hash has no salt".to_string()))
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use crate::notifications::NotificationFilters;
    use crate::pubsub::InMemoryBroadcaster;

    pub(crate) fn manager(pool: &SqlitePool) -> UserManager {
        let bus = Arc::new(InMemoryBroadcaster::new(16));
        UserManager::new(
            pool.clone(),
            Arc::new(ServerConfig::for_testing()),
            Arc::new(NotificationManager::new(pool.clone(), bus)),
        )
    }

    /// Register a user and return its id
    pub(crate) async fn register(pool: &SqlitePool, name: &str) -> i64 {
        manager(pool)
            .register(RegisterInput {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password: "password123".to_string(),
            })
            .await
            .unwrap()
            .user
            .id
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let pool = db::test_pool().await;
        let users = manager(&pool);

        let registered = users
            .register(RegisterInput {
                name: "Alice".to_string(),
                email: "Alice@Example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(registered.user.email, "alice@example.com");
        assert!(!registered.token.is_empty());

        let logged_in = users
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let claims = auth::verify_token(
            &logged_in.token,
            &ServerConfig::for_testing().authentication.jwt_secret,
        )
        .unwrap();
        assert_eq!(claims.sub, registered.user.id);
    }

    #[tokio::test]
    async fn test_register_creates_profile() {
        let pool = db::test_pool().await;
        let id = register(&pool, "Alice").await;

        let row = sqlx::query("SELECT name FROM profile WHERE user_id = ?1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("name"), "Alice");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let pool = db::test_pool().await;
        register(&pool, "Alice").await;

        let err = manager(&pool)
            .register(RegisterInput {
                name: "Alice Again".to_string(),
                email: "ALICE@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_validation_details() {
        let pool = db::test_pool().await;
        let err = manager(&pool)
            .register(RegisterInput {
                name: "A".to_string(),
                email: "not-an-email".to_string(),
                password: "123".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            AppError::Validation(details) => {
                let paths: Vec<&str> = details.iter().map(|d| d.path.as_str()).collect();
                assert_eq!(paths, vec!["email", "name", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let pool = db::test_pool().await;
        register(&pool, "Alice").await;

        let err = manager(&pool)
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = manager(&pool)
            .login(LoginInput {
                email: "nobody@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_search_excludes_viewer_and_annotates_status() {
        let pool = db::test_pool().await;
        let alice = register(&pool, "Alice").await;
        let alicia = register(&pool, "Alicia").await;
        register(&pool, "Bob").await;

        sqlx::query(
            "INSERT INTO friend (sender_id, receiver_id, user_low, user_high, status, created_at, updated_at)
             VALUES (?1, ?2, ?1, ?2, 'PENDING', ?3, ?3)",
        )
        .bind(alice)
        .bind(alicia)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let users = manager(&pool);

        let hits = users.search(Some(alice), "ALI").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user.id, alicia);
        assert_eq!(hits[0].friend_status, FriendStatus::Pending);

        // Anonymous search sees everyone with no relationship
        let hits = users.search(None, "ali").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.friend_status == FriendStatus::None));
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let pool = db::test_pool().await;
        register(&pool, "Alice").await;

        let users = manager(&pool);
        assert!(users.search(None, "%").await.unwrap().is_empty());
        assert!(matches!(
            users.search(None, "   ").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_not_found() {
        let pool = db::test_pool().await;
        let users = manager(&pool);
        assert!(matches!(users.get_summary(999).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_register_trims_before_length_check() {
        let pool = db::test_pool().await;
        let users = manager(&pool);

        let err = users
            .register(RegisterInput {
                name: "  a  ".to_string(),
                email: "a@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        match err {
            AppError::Validation(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].path, "name");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let registered = users
            .register(RegisterInput {
                name: "  Al  ".to_string(),
                email: "  Al@Example.com ".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(registered.user.name, "Al");
        assert_eq!(registered.user.email, "al@example.com");
    }

    #[tokio::test]
    async fn test_forgot_password_does_not_reveal_accounts() {
        let pool = db::test_pool().await;
        register(&pool, "Alice").await;
        let users = manager(&pool);

        let known = users
            .forgot_password(ForgotPasswordInput {
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap();
        let unknown = users
            .forgot_password(ForgotPasswordInput {
                email: "nobody@example.com".to_string(),
            })
            .await
            .unwrap();
        assert!(known.success);
        assert_eq!(known, unknown);

        let none = users
            .request_password_reset(ForgotPasswordInput {
                email: "nobody@example.com".to_string(),
            })
            .await
            .unwrap();
        assert!(none.is_none());

        assert!(matches!(
            users
                .forgot_password(ForgotPasswordInput {
                    email: "not-an-email".to_string(),
                })
                .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let pool = db::test_pool().await;
        let alice = register(&pool, "Alice").await;
        let users = manager(&pool);

        let (user_id, token) = users
            .request_password_reset(ForgotPasswordInput {
                email: " ALICE@example.com".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user_id, alice);

        let check = users.validate_reset_token(&token).await.unwrap();
        assert_eq!(
            check,
            ResetTokenValidation {
                valid: true,
                message: "Token is valid".to_string(),
            }
        );

        let payload = users
            .reset_password(ResetPasswordInput {
                token: token.clone(),
                password: "new-password".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(payload.user.id, alice);
        let claims = auth::verify_token(
            &payload.token,
            &ServerConfig::for_testing().authentication.jwt_secret,
        )
        .unwrap();
        assert_eq!(claims.sub, alice);

        // Old password is gone, new one works
        assert!(users
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .is_err());
        users
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "new-password".to_string(),
            })
            .await
            .unwrap();

        let inbox = users
            .notifications
            .list(alice, &NotificationFilters::default())
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "Password Changed");
        assert_eq!(inbox[0].message, "Your password has been successfully reset.");
        assert_eq!(
            inbox[0].data.as_ref().map(|d| d.0.clone()),
            Some(json!({ "userId": alice }))
        );

        // A token works once
        let check = users.validate_reset_token(&token).await.unwrap();
        assert!(!check.valid);
        assert_eq!(check.message, "Token is invalid or expired");
        let err = users
            .reset_password(ResetPasswordInput {
                token,
                password: "another-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_reset_password_rejects_bad_tokens_and_short_passwords() {
        let pool = db::test_pool().await;
        register(&pool, "Alice").await;
        let users = manager(&pool);

        let session = users
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap()
            .token;
        assert!(!users.validate_reset_token(&session).await.unwrap().valid);
        assert!(!users.validate_reset_token("garbage").await.unwrap().valid);

        let err = users
            .reset_password(ResetPasswordInput {
                token: "garbage".to_string(),
                password: "new-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let (_, token) = users
            .request_password_reset(ForgotPasswordInput {
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        match users
            .reset_password(ResetPasswordInput {
                token,
                password: "123".to_string(),
            })
            .await
        {
            Err(AppError::Validation(details)) => assert_eq!(details[0].path, "password"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
