use crate::errors::{AppError, StorageError};
use crate::models::{Account, DailyRecord, Store, UserProfile};
use chrono::Utc;
use std::path::Path;
use tokio::fs;
use tracing::{error, info};

/// A missing file is an empty store; anything unreadable is an error so the
/// next write cannot clobber data we failed to load.
pub async fn load_store(path: &Path) -> Result<Store, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
            error!("failed to parse data file: {source}");
            StorageError::Parse {
                path: path.to_path_buf(),
                source,
            }
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Store::default()),
        Err(source) => {
            error!("failed to read data file: {source}");
            Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

pub async fn persist_store(path: &Path, store: &Store) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(store).map_err(AppError::internal)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).await.map_err(|err| {
        error!("failed to write data file: {err}");
        AppError::internal(err)
    })?;
    fs::rename(&tmp, path).await.map_err(AppError::internal)?;
    Ok(())
}

/// Writes `next` to disk and only then makes it the live store, so a failed
/// write leaves memory matching what is on disk.
pub async fn commit(path: &Path, live: &mut Store, next: Store) -> Result<(), AppError> {
    persist_store(path, &next).await?;
    *live = next;
    Ok(())
}

impl Store {
    pub fn account_by_email(&self, email: &str) -> Option<&Account> {
        let email = email.trim();
        self.accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
    }

    pub fn email_taken(&self, email: &str, except_id: Option<&str>) -> bool {
        self.account_by_email(email)
            .is_some_and(|account| Some(account.id.as_str()) != except_id)
    }

    pub fn profile(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    pub fn count_for(&self, user_id: &str, date: &str) -> u32 {
        self.records
            .get(user_id)
            .and_then(|days| days.get(date))
            .map(|record| record.count)
            .unwrap_or(0)
    }

    /// Sets the count for a day, creating the record if needed and keeping its other fields.
    pub fn merge_count(&mut self, user_id: &str, date: &str, count: u32) {
        self.records
            .entry(user_id.to_string())
            .or_default()
            .entry(date.to_string())
            .and_modify(|record| record.count = count)
            .or_insert_with(|| DailyRecord {
                count,
                created_at: Utc::now(),
            });
    }

    /// Drops the profile, every day record and the account of a user.
    /// Returns how many day records were removed.
    pub fn delete_user(&mut self, user_id: &str) -> usize {
        let mut removed = 0;
        if let Some(days) = self.records.get_mut(user_id) {
            let dates: Vec<String> = days.keys().cloned().collect();
            for date in dates {
                if days.remove(&date).is_some() {
                    removed += 1;
                }
            }
        }
        self.records.remove(user_id);
        self.profiles.remove(user_id);
        self.accounts.remove(user_id);
        info!(user_id, removed, "deleted user data");
        removed
    }
}
