use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::accounts::password::{hash_password, verify_password};
use crate::accounts::repo::UserStore;
use crate::accounts::repo_types::{NewUser, User};
use crate::error::ApiError;

/// Identity returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub name: String,
}

/// Owns user identity, credential checks and block state on top of a `UserStore`.
#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn UserStore>,
}

fn required<'a>(value: &'a str, message: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(message.into()));
    }
    Ok(value)
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<i64, ApiError> {
        const MSG: &str = "Name, email and password are required";
        let name = required(name, MSG)?;
        let email = required(email, MSG)?;
        if password.is_empty() {
            return Err(ApiError::Validation(MSG.into()));
        }

        let password_hash = hash_password(password.to_owned()).await?;
        let id = self
            .store
            .insert(NewUser {
                name: name.to_owned(),
                email: email.to_owned(),
                password_hash,
                last_seen: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(user_id = id, email = %email, "user registered");
        Ok(id)
    }

    /// Invalid credentials are rejected before the blocked flag is consulted.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, ApiError> {
        const MSG: &str = "Email and Password required";
        let email = required(email, MSG)?;
        if password.is_empty() {
            return Err(ApiError::Validation(MSG.into()));
        }

        let user = match self.store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                return Err(ApiError::UnknownEmail);
            }
        };

        if !verify_password(password.to_owned(), user.password_hash.clone()).await? {
            warn!(user_id = user.id, "login invalid password");
            return Err(ApiError::InvalidCredentials);
        }

        if user.is_blocked {
            warn!(user_id = user.id, "login rejected for blocked account");
            return Err(ApiError::Blocked);
        }

        self.record_login(user.id);
        info!(user_id = user.id, "user logged in");
        Ok(AuthenticatedUser {
            id: user.id,
            name: user.name,
        })
    }

    /// Detached `last_seen` update; the caller never waits on it.
    fn record_login(&self, id: i64) {
        let store = Arc::clone(&self.store);
        let at = OffsetDateTime::now_utc();
        tokio::spawn(async move {
            match store.touch_last_seen(id, at).await {
                Ok(()) => debug!(user_id = id, "last_seen updated"),
                Err(e) => warn!(user_id = id, error = %e, "failed to update last_seen"),
            }
        });
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        Ok(self.store.list().await?)
    }

    /// Guard run before every privileged operation. The actor's state is read
    /// before the mutation it authorizes is applied. Id `0` never names a row
    /// and counts as missing.
    pub async fn ensure_active_actor(&self, actor: Option<i64>) -> Result<User, ApiError> {
        let actor = actor
            .filter(|id| *id != 0)
            .ok_or_else(|| ApiError::Validation("User ID missing in request.".into()))?;
        let user = match self.store.find_by_id(actor).await? {
            Some(u) => u,
            None => {
                warn!(user_id = actor, "acting user not found");
                return Err(ApiError::UserNotFound(actor));
            }
        };
        if user.is_blocked {
            warn!(user_id = actor, "blocked user attempted a privileged operation");
            return Err(ApiError::Blocked);
        }
        Ok(user)
    }

    pub async fn set_blocked_state(
        &self,
        actor: Option<i64>,
        targets: &[i64],
        blocked: bool,
    ) -> Result<u64, ApiError> {
        let actor = self.ensure_active_actor(actor).await?;
        if targets.is_empty() {
            let verb = if blocked { "blocking" } else { "unblocking" };
            return Err(ApiError::Validation(format!("No users selected for {verb}")));
        }

        let matched = self.store.set_blocked(targets, blocked).await?;
        info!(
            actor_id = actor.id,
            targets = ?targets,
            matched,
            blocked,
            "block state changed"
        );
        Ok(matched)
    }

    pub async fn delete_users(&self, actor: Option<i64>, targets: &[i64]) -> Result<u64, ApiError> {
        let actor = self.ensure_active_actor(actor).await?;
        if targets.is_empty() {
            return Err(ApiError::Validation("No users selected for deletion".into()));
        }

        let removed = self.store.delete_many(targets).await?;
        info!(actor_id = actor.id, targets = ?targets, removed, "users deleted");
        Ok(removed)
    }
}
