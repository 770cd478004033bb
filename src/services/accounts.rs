//! Account service: signup, login sessions, verification and passwords.
//!
//! Verification and reset tokens are random nanoids mailed to the user; only
//! their SHA-256 digests are stored.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::mailer::{Mail, Mailer};
use super::password::{check_strength, hash_password, verify_password};
use crate::db::{self, CreateSession, CreateUser, DbPool, Pcuser, PcuserProfile, Session, UpdateUser, User};
use crate::error::{Error, Result};

/// Length of session ids and mailed tokens.
const TOKEN_LEN: usize = 32;

/// Settings the account service needs from configuration.
#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub session_max_age: Duration,
    pub mail_from: String,
    pub public_url: String,
}

/// Signup form.
#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(flatten)]
    pub profile: PcuserProfile,
}

/// Editable profile fields across the user and pcuser rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub profile: PcuserProfile,
}

/// A user together with their profile row.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: User,
    pub pcuser: Pcuser,
}

/// Service for account lifecycle operations.
#[derive(Clone)]
pub struct AccountService {
    db: DbPool,
    mailer: Arc<dyn Mailer>,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(db: DbPool, mailer: Arc<dyn Mailer>, settings: AccountSettings) -> Self {
        Self {
            db,
            mailer,
            settings,
        }
    }

    /// How long a session lasts after it is opened or extended.
    pub fn session_max_age(&self) -> Duration {
        self.settings.session_max_age
    }

    /// Register a user and profile, then mail a verification link.
    ///
    /// The rows are committed only once the mail went out, so a failed
    /// signup leaves the username free.
    pub async fn signup(&self, form: Signup) -> Result<Profile> {
        let username = form.username.trim();
        db::require_text("username", username)?;
        check_email(&form.email)?;
        check_strength(&form.password)?;
        let password_hash = hash_password(&form.password)?;
        let token = nanoid::nanoid!(TOKEN_LEN);

        let mut tx = self.db.begin().await?;
        let user = db::create_user(
            &mut *tx,
            CreateUser {
                username: username.to_string(),
                email: form.email.trim().to_string(),
                first_name: form.first_name,
                last_name: form.last_name,
                password_hash,
                is_staff: false,
                is_superuser: false,
            },
        )
        .await?;
        let pcuser = db::create_pcuser(&mut *tx, user.id, form.profile).await?;
        db::set_verify_token(&mut *tx, pcuser.id, Some(&digest(&token))).await?;

        self.mailer.send(self.verification_mail(&user, &token)).await?;
        tx.commit().await?;
        info!(user_id = user.id, username = %user.username, "User signed up");

        let pcuser = self.pcuser_of(user.id).await?;
        Ok(Profile { user, pcuser })
    }

    /// Re-issue the verification mail for a user.
    pub async fn send_verification_email(&self, user_id: i64) -> Result<()> {
        let profile = self.profile(user_id).await?;
        if profile.pcuser.verified {
            return Err(Error::InvalidInput("Account is already verified".to_string()));
        }
        self.issue_verification(&profile.user, &profile.pcuser).await
    }

    /// Consume a verification token.
    pub async fn verify(&self, token: &str) -> Result<Pcuser> {
        let pcuser = db::get_pcuser_by_verify_token(&self.db, &digest(token))
            .await?
            .ok_or(Error::InvalidToken)?;
        db::mark_verified(&self.db, pcuser.id).await?;
        info!(pcuser_id = pcuser.id, "Account verified");
        self.pcuser_of(pcuser.user_id).await
    }

    /// Check credentials and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, Session)> {
        let user = db::get_user_by_username(&self.db, username.trim())
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !user.is_active || !verify_password(password, &user.password_hash)? {
            warn!(username = %username, "Failed login");
            return Err(Error::InvalidCredentials);
        }

        db::update_last_login(&self.db, user.id).await?;
        let session = self.open_session(user.id).await?;
        info!(user_id = user.id, "User logged in");

        Ok((user, session))
    }

    /// Open a new session for a user.
    pub async fn open_session(&self, user_id: i64) -> Result<Session> {
        db::create_session(
            &self.db,
            CreateSession {
                id: nanoid::nanoid!(TOKEN_LEN),
                user_id,
                expires_at: Utc::now() + self.settings.session_max_age,
            },
        )
        .await
    }

    /// End a session.
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        db::delete_session(&self.db, session_id).await
    }

    /// Current user and profile.
    pub async fn profile(&self, user_id: i64) -> Result<Profile> {
        let user = db::get_user(&self.db, user_id).await?;
        let pcuser = self.pcuser_of(user_id).await?;
        Ok(Profile { user, pcuser })
    }

    /// Update contact and profile fields.
    pub async fn edit_profile(&self, user_id: i64, update: ProfileUpdate) -> Result<Profile> {
        if let Some(ref email) = update.email {
            check_email(email)?;
        }

        let user = db::update_user(
            &self.db,
            user_id,
            UpdateUser {
                email: update.email.map(|e| e.trim().to_string()),
                first_name: update.first_name,
                last_name: update.last_name,
            },
        )
        .await?;

        let pcuser = self.pcuser_of(user_id).await?;
        let pcuser = db::update_pcuser_profile(&self.db, pcuser.id, update.profile)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Pcuser {}", pcuser.id)))?;

        Ok(Profile { user, pcuser })
    }

    /// Mail a password reset token. Unknown addresses are ignored so the
    /// response does not reveal which emails are registered.
    pub async fn forgot_pass(&self, email: &str) -> Result<()> {
        let Some(user) = db::get_user_by_email(&self.db, email.trim()).await? else {
            info!("Password reset requested for unknown address");
            return Ok(());
        };
        let pcuser = self.pcuser_of(user.id).await?;

        let token = nanoid::nanoid!(TOKEN_LEN);
        db::set_reset_token(&self.db, pcuser.id, Some(&digest(&token))).await?;

        self.mailer
            .send(Mail {
                from: self.settings.mail_from.clone(),
                to: user.email.clone(),
                subject: "Reset your password".to_string(),
                body: format!(
                    "Hello {},\n\nReset your password at {}/reset_pass with this token: {}",
                    user.username, self.settings.public_url, token
                ),
            })
            .await
    }

    /// Set a new password using a mailed reset token. Ends every session.
    pub async fn reset_pass(&self, token: &str, new_password: &str) -> Result<()> {
        check_strength(new_password)?;
        let pcuser = db::get_pcuser_by_reset_token(&self.db, &digest(token))
            .await?
            .ok_or(Error::InvalidToken)?;

        db::set_password_hash(&self.db, pcuser.user_id, &hash_password(new_password)?).await?;
        db::set_reset_token(&self.db, pcuser.id, None).await?;
        let ended = db::delete_user_sessions(&self.db, pcuser.user_id).await?;
        info!(user_id = pcuser.user_id, sessions_ended = ended, "Password reset");
        Ok(())
    }

    /// Change the password of a logged in user.
    pub async fn change_pass(&self, user_id: i64, old_password: &str, new_password: &str) -> Result<()> {
        let user = db::get_user(&self.db, user_id).await?;
        if !verify_password(old_password, &user.password_hash)? {
            return Err(Error::InvalidCredentials);
        }
        check_strength(new_password)?;

        db::set_password_hash(&self.db, user_id, &hash_password(new_password)?).await?;
        info!(user_id, "Password changed");
        Ok(())
    }

    /// Relay a contact message from a user to the site inbox.
    pub async fn send_email(&self, user_id: i64, subject: &str, message: &str) -> Result<()> {
        db::require_text("subject", subject)?;
        db::require_text("message", message)?;
        let user = db::get_user(&self.db, user_id).await?;

        self.mailer
            .send(Mail {
                from: self.settings.mail_from.clone(),
                to: self.settings.mail_from.clone(),
                subject: subject.trim().to_string(),
                body: format!("From {} <{}>:\n\n{}", user.username, user.email, message),
            })
            .await
    }

    /// Create a superuser unless the username is taken.
    pub async fn ensure_superuser(&self, username: &str, password: &str, email: &str) -> Result<User> {
        if let Some(existing) = db::get_user_by_username(&self.db, username).await? {
            return Ok(existing);
        }

        let user = db::create_user(
            &self.db,
            CreateUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
                is_staff: true,
                is_superuser: true,
                ..Default::default()
            },
        )
        .await?;
        let pcuser = db::create_pcuser(&self.db, user.id, PcuserProfile::default()).await?;
        db::mark_verified(&self.db, pcuser.id).await?;
        info!(user_id = user.id, username = %user.username, "Bootstrap superuser created");

        Ok(user)
    }

    async fn pcuser_of(&self, user_id: i64) -> Result<Pcuser> {
        db::get_pcuser_by_user(&self.db, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Pcuser for user {}", user_id)))
    }

    async fn issue_verification(&self, user: &User, pcuser: &Pcuser) -> Result<()> {
        let token = nanoid::nanoid!(TOKEN_LEN);
        db::set_verify_token(&self.db, pcuser.id, Some(&digest(&token))).await?;
        self.mailer.send(self.verification_mail(user, &token)).await
    }

    fn verification_mail(&self, user: &User, token: &str) -> Mail {
        Mail {
            from: self.settings.mail_from.clone(),
            to: user.email.clone(),
            subject: "Verify your account".to_string(),
            body: format!(
                "Hello {},\n\nConfirm your address by visiting {}/verify?token={}",
                user.username, self.settings.public_url, token
            ),
        }
    }
}

/// SHA-256 hex digest of a token.
fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn check_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(Error::Validation(format!("'{}' is not a valid email address", email))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};
    use crate::services::MemoryMailer;

    async fn setup() -> (AccountService, MemoryMailer) {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        let mailer = MemoryMailer::new();
        let service = AccountService::new(
            pool,
            Arc::new(mailer.clone()),
            AccountSettings {
                session_max_age: Duration::days(14),
                mail_from: "noreply@webhub.local".to_string(),
                public_url: "http://localhost:8000".to_string(),
            },
        );
        (service, mailer)
    }

    /// Pull the token out of a mailed message body.
    fn token_from_mail(body: &str) -> Option<String> {
        body.split(|c: char| c.is_whitespace() || c == '=')
            .filter(|part| part.len() == TOKEN_LEN)
            .last()
            .map(str::to_string)
    }

    fn signup(username: &str) -> Signup {
        Signup {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            profile: PcuserProfile::default(),
        }
    }

    #[test]
    fn test_check_email() {
        assert!(check_email("a@example.com").is_ok());
        assert!(check_email("nope").is_err());
        assert!(check_email("@example.com").is_err());
        assert!(check_email("a@localhost").is_err());
    }

    #[tokio::test]
    async fn test_signup_mails_verification_token() {
        let (service, mailer) = setup().await;

        let profile = service.signup(signup("alice")).await.unwrap();
        assert!(!profile.pcuser.verified);
        assert_ne!(profile.user.password_hash, "password123");

        let mail = mailer.last_to("alice@example.com").unwrap();
        let token = token_from_mail(&mail.body).unwrap();

        let verified = service.verify(&token).await.unwrap();
        assert!(verified.verified);

        // Tokens are single use
        assert!(matches!(service.verify(&token).await, Err(Error::InvalidToken)));
    }

    struct DownMailer;

    #[async_trait::async_trait]
    impl Mailer for DownMailer {
        async fn send(&self, _mail: Mail) -> Result<()> {
            Err(Error::Mail("relay unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_signup_mail_leaves_no_user_behind() {
        let (working, mailer) = setup().await;
        let failing = AccountService::new(
            working.db.clone(),
            Arc::new(DownMailer),
            working.settings.clone(),
        );

        let err = failing.signup(signup("alice")).await.unwrap_err();
        assert!(matches!(err, Error::Mail(_)));
        assert!(db::get_user_by_username(&working.db, "alice")
            .await
            .unwrap()
            .is_none());

        // The username is still free
        let profile = working.signup(signup("alice")).await.unwrap();
        assert_eq!(profile.user.username, "alice");
        assert!(mailer.last_to("alice@example.com").is_some());
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicates_and_weak_passwords() {
        let (service, _) = setup().await;
        service.signup(signup("bob")).await.unwrap();

        assert!(matches!(
            service.signup(signup("bob")).await,
            Err(Error::AlreadyExists(_))
        ));

        let mut weak = signup("carol");
        weak.password = "short".to_string();
        assert!(matches!(service.signup(weak).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let (service, _) = setup().await;
        service.signup(signup("dave")).await.unwrap();

        let (user, session) = service.login("dave", "password123").await.unwrap();
        assert_eq!(session.user_id, user.id);
        assert!(!session.is_expired());

        assert!(matches!(
            service.login("dave", "wrong-password").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody", "password123").await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (service, mailer) = setup().await;
        let profile = service.signup(signup("erin")).await.unwrap();
        service.login("erin", "password123").await.unwrap();

        service.forgot_pass("erin@example.com").await.unwrap();
        let token = token_from_mail(&mailer.last_to("erin@example.com").unwrap().body).unwrap();

        service.reset_pass(&token, "brand-new-password").await.unwrap();
        assert!(service.login("erin", "password123").await.is_err());
        service.login("erin", "brand-new-password").await.unwrap();

        // Reset token cannot be replayed
        assert!(matches!(
            service.reset_pass(&token, "another-password").await,
            Err(Error::InvalidToken)
        ));
        assert_eq!(profile.user.username, "erin");
    }

    #[tokio::test]
    async fn test_forgot_pass_unknown_email_is_silent() {
        let (service, mailer) = setup().await;
        service.forgot_pass("ghost@example.com").await.unwrap();
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_change_pass_requires_old_password() {
        let (service, _) = setup().await;
        let profile = service.signup(signup("frank")).await.unwrap();

        assert!(matches!(
            service
                .change_pass(profile.user.id, "wrong-password", "new-password-1")
                .await,
            Err(Error::InvalidCredentials)
        ));

        service
            .change_pass(profile.user.id, "password123", "new-password-1")
            .await
            .unwrap();
        service.login("frank", "new-password-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_edit_profile() {
        let (service, _) = setup().await;
        let profile = service.signup(signup("grace")).await.unwrap();

        let updated = service
            .edit_profile(
                profile.user.id,
                ProfileUpdate {
                    first_name: Some("Grace".to_string()),
                    profile: PcuserProfile {
                        gender: Some("F".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.user.first_name, "Grace");
        assert_eq!(updated.pcuser.gender.as_deref(), Some("F"));
    }

    #[tokio::test]
    async fn test_ensure_superuser_is_idempotent() {
        let (service, _) = setup().await;
        let first = service
            .ensure_superuser("admin", "password", "admin@example.com")
            .await
            .unwrap();
        let second = service
            .ensure_superuser("admin", "other", "admin@example.com")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.is_staff && first.is_superuser);
    }
}
