//! Users, wallets and admin deposits

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use ts_rs::TS;

use super::NotificationService;
use crate::config::TS_EXPORT_PATH;
use crate::errors::{BantahError, Result};
use crate::storage::{NotificationPayload, SeaOrmStorage, User, Wallet, WalletTransaction};

/// `GET /api/me`
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct Profile {
    pub user: User,
    pub wallet: Wallet,
    pub active_challenges: u64,
}

/// Usernames are 3 to 32 ASCII letters, digits or underscores
pub fn validate_username(username: &str) -> Result<()> {
    let valid_len = (3..=32).contains(&username.len());
    let valid_chars = username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(BantahError::validation(format!(
            "Invalid username '{}': use 3-32 letters, digits or underscores",
            username
        )))
    }
}

/// Username for ids whose claim carries no usable name: `user_` plus the id's alphanumerics
pub fn fallback_username(user_id: &str) -> String {
    let suffix: String = user_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(20)
        .collect();
    format!("user_{}", suffix)
}

const MAX_USERNAME_ATTEMPTS: u32 = 50;

/// Best valid username for a claim: the claim itself, its allowed characters,
/// or the id-derived fallback
fn provisional_username(user_id: &str, claimed: &str) -> String {
    let claimed = claimed.trim().trim_start_matches('@');
    if validate_username(claimed).is_ok() {
        return claimed.to_string();
    }

    let cleaned: String = claimed
        .chars()
        .map(|c| if c == '.' || c == '-' || c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(32)
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.len() >= 3 {
        cleaned.to_string()
    } else {
        fallback_username(user_id)
    }
}

/// `base` for the first attempt, then `base_2`, `base_3`... kept within 32 chars
fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return base.to_string();
    }
    let suffix = format!("_{}", attempt);
    let keep = 32usize.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", &base[..keep], suffix)
}

pub struct UserService {
    storage: Arc<SeaOrmStorage>,
    notifications: Arc<NotificationService>,
}

impl UserService {
    pub fn new(storage: Arc<SeaOrmStorage>, notifications: Arc<NotificationService>) -> Self {
        Self {
            storage,
            notifications,
        }
    }

    /// Return the user, provisioning it (with an empty wallet) on first sight.
    ///
    /// The claimed username is a preference: an invalid one is sanitized and a
    /// taken one gets a numeric suffix, so a valid session always signs in.
    pub async fn ensure_user(
        &self,
        user_id: &str,
        username: &str,
        first_name: Option<&str>,
    ) -> Result<User> {
        if let Some(user) = self.storage.get_user(user_id).await? {
            return Ok(user);
        }

        let base = provisional_username(user_id, username);
        let mut last_err = None;

        for attempt in 1..=MAX_USERNAME_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if self.storage.get_user_by_username(&candidate).await?.is_some() {
                continue;
            }

            match self
                .storage
                .create_user_with_wallet(user_id, &candidate, first_name)
                .await
            {
                Ok(user) => {
                    if candidate != username.trim().trim_start_matches('@') {
                        info!(
                            "User {} requested '{}', provisioned as @{}",
                            user.id, username, user.username
                        );
                    }
                    return Ok(user);
                }
                // Either a concurrent first request for the same id won, or
                // someone grabbed the name between the check and the insert
                Err(e @ BantahError::Conflict(_)) => {
                    if let Some(user) = self.storage.get_user(user_id).await? {
                        return Ok(user);
                    }
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            BantahError::conflict(format!("No free username derived from '{}'", base))
        }))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        self.storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| BantahError::not_found(format!("User {} not found", user_id)))
    }

    /// Case-insensitive lookup; a leading `@` is ignored
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return Ok(None);
        }
        self.storage.get_user_by_username(username).await
    }

    /// Resolve a user id or a username
    pub async fn resolve(&self, id_or_username: &str) -> Result<User> {
        let needle = id_or_username.trim();
        if !needle.starts_with('@')
            && let Some(user) = self.storage.get_user(needle).await?
        {
            return Ok(user);
        }
        self.get_user_by_username(needle).await?.ok_or_else(|| {
            BantahError::not_found(format!(
                "User {} not found",
                needle.trim_start_matches('@')
            ))
        })
    }

    /// `@username` of a user, or the raw id if the user is gone
    pub async fn handle_of(&self, user_id: &str) -> String {
        match self.storage.get_user(user_id).await {
            Ok(Some(user)) => user.handle(),
            _ => user_id.to_string(),
        }
    }

    pub async fn require_admin(&self, user_id: &str) -> Result<User> {
        let user = self.get_user(user_id).await?;
        if !user.is_admin {
            return Err(BantahError::forbidden("Admin access required"));
        }
        Ok(user)
    }

    pub async fn wallet(&self, user_id: &str) -> Result<Wallet> {
        self.storage
            .get_wallet(user_id)
            .await?
            .ok_or_else(|| BantahError::not_found(format!("Wallet for {} not found", user_id)))
    }

    pub async fn profile(&self, user_id: &str) -> Result<Profile> {
        let user = self.get_user(user_id).await?;
        let wallet = self.wallet(user_id).await?;
        let active_challenges = self.storage.count_active_challenges(user_id).await?;
        Ok(Profile {
            user,
            wallet,
            active_challenges,
        })
    }

    pub async fn seed_admins(&self, usernames: &[String]) -> Result<u64> {
        let promoted = self.storage.set_admin_by_usernames(usernames).await?;
        if promoted > 0 {
            info!("Granted admin to {} user(s)", promoted);
        }
        Ok(promoted)
    }

    /// Admin deposit into a wallet
    pub async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        coins: i64,
        reference: Option<&str>,
    ) -> Result<Wallet> {
        if amount < 0 || coins < 0 {
            return Err(BantahError::validation("Amounts must not be negative"));
        }
        if amount == 0 && coins == 0 {
            return Err(BantahError::validation(
                "Either amount or coins must be positive",
            ));
        }

        let wallet = self
            .storage
            .deposit(user_id, amount, coins, reference)
            .await?;

        self.notifications
            .dispatch(
                user_id,
                NotificationPayload::PaymentReceived {
                    amount,
                    coins,
                    new_balance: wallet.balance,
                },
            )
            .await;
        Ok(wallet)
    }

    pub async fn transactions(&self, user_id: &str, limit: u64) -> Result<Vec<WalletTransaction>> {
        self.storage.list_transactions(user_id, limit).await
    }
}
