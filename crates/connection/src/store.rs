use std::{collections::HashMap, path::PathBuf};

use {
    async_trait::async_trait,
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, info},
};

use crate::{credential::Preferences, error::StoreError};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent per-user preference storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Every stored key for `user_id`. Unknown users yield an empty map.
    async fn load(&self, user_id: &str) -> Result<Preferences>;
    /// Merge `values` into the user's record.
    async fn save(&self, user_id: &str, values: Preferences) -> Result<()>;
    /// Drop `keys` from the user's record.
    async fn remove(&self, user_id: &str, keys: &[&str]) -> Result<()>;
}

/// Process-local store. Everything is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, Preferences>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, user_id: &str) -> Result<Preferences> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, values: Preferences) -> Result<()> {
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .extend(values);
        Ok(())
    }

    async fn remove(&self, user_id: &str, keys: &[&str]) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(prefs) = users.get_mut(user_id) {
            prefs.retain(|k, _| !keys.contains(&k.as_str()));
            if prefs.is_empty() {
                users.remove(user_id);
            }
        }
        Ok(())
    }
}

/// JSON file keyed by user id. Written with `0600` permissions on Unix.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, Preferences>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(HashMap::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "credential file not found");
                Ok(HashMap::new())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, users: &HashMap<String, Preferences>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, user_id: &str) -> Result<Preferences> {
        Ok(self.read_all().await?.remove(user_id).unwrap_or_default())
    }

    async fn save(&self, user_id: &str, values: Preferences) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.read_all().await?;
        users
            .entry(user_id.to_string())
            .or_default()
            .extend(values);
        self.write_all(&users).await?;
        info!(path = %self.path.display(), user_id, "credentials saved");
        Ok(())
    }

    async fn remove(&self, user_id: &str, keys: &[&str]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.read_all().await?;
        let Some(prefs) = users.get_mut(user_id) else {
            return Ok(());
        };
        prefs.retain(|k, _| !keys.contains(&k.as_str()));
        if prefs.is_empty() {
            users.remove(user_id);
        }
        self.write_all(&users).await?;
        info!(path = %self.path.display(), user_id, "credentials removed");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(pairs: &[(&str, &str)]) -> Preferences {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    async fn exercise(store: &dyn CredentialStore) {
        assert!(store.load("42").await.unwrap().is_empty());

        store
            .save("42", prefs(&[("slack_url", "u"), ("slack_channel", "c")]))
            .await
            .unwrap();
        store
            .save("42", prefs(&[("slack_channel", "c2")]))
            .await
            .unwrap();
        let loaded = store.load("42").await.unwrap();
        assert_eq!(loaded.get("slack_url").map(String::as_str), Some("u"));
        assert_eq!(loaded.get("slack_channel").map(String::as_str), Some("c2"));

        store.remove("42", &["slack_url"]).await.unwrap();
        assert_eq!(store.load("42").await.unwrap().len(), 1);

        store.remove("42", &["slack_channel"]).await.unwrap();
        assert!(store.load("42").await.unwrap().is_empty());
        store.remove("unknown", &["slack_url"]).await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_merges_and_removes() {
        exercise(&MemoryCredentialStore::new()).await;
    }

    #[tokio::test]
    async fn file_store_merges_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileCredentialStore::new(dir.path().join("nested/creds.json"))).await;
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        FileCredentialStore::new(path.clone())
            .save("7", prefs(&[("slack_slackusername", "@mike")]))
            .await
            .unwrap();

        let reopened = FileCredentialStore::new(path.clone());
        let loaded = reopened.load("7").await.unwrap();
        assert_eq!(
            loaded.get("slack_slackusername").map(String::as_str),
            Some("@mike")
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileCredentialStore::new(path);
        assert!(matches!(
            store.load("1").await,
            Err(StoreError::Json(_))
        ));
    }
}
