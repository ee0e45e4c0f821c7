//! Persistence of one `ChallengeState` blob per user.
//!
//! The whole state is written and read atomically as JSON. Blobs that fail to
//! parse or violate the state invariants are logged and treated as absent, so a
//! damaged file never takes the service down; the student simply starts fresh.

use std::{collections::HashMap, path::PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::domain::ChallengeState;
use crate::error::StoreError;
use crate::util::trunc_for_log;

const MAX_USER_LEN: usize = 64;

pub enum ChallengeStore {
    /// Process-local; lost on restart.
    Memory(RwLock<HashMap<String, String>>),
    /// One `<user>.json` per user below `dir`.
    JsonFile { dir: PathBuf },
}

/// User keys double as file names, so only `[A-Za-z0-9_-]{1,64}` is accepted.
pub fn validate_user(user: &str) -> Result<&str, StoreError> {
    let ok = !user.is_empty()
        && user.len() <= MAX_USER_LEN
        && user.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(user)
    } else {
        Err(StoreError::InvalidUser(trunc_for_log(user, MAX_USER_LEN)))
    }
}

/// Parse and validate a stored blob. `None` for anything that is not a sound state.
pub fn decode_state(user: &str, blob: &str) -> Option<ChallengeState> {
    let state = match serde_json::from_str::<ChallengeState>(blob) {
        Ok(s) => s,
        Err(e) => {
            warn!(target: "mathe_backend", %user, error = %e, "Stored challenge is malformed; discarding");
            return None;
        }
    };
    if let Err(reason) = state.validate() {
        warn!(target: "mathe_backend", %user, %reason, "Stored challenge violates invariants; discarding");
        return None;
    }
    Some(state)
}

impl ChallengeStore {
    pub fn memory() -> Self {
        ChallengeStore::Memory(RwLock::new(HashMap::new()))
    }

    pub fn json_file(dir: impl Into<PathBuf>) -> Self {
        ChallengeStore::JsonFile { dir: dir.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChallengeStore::Memory(_) => "memory",
            ChallengeStore::JsonFile { .. } => "file",
        }
    }

    fn path_for(dir: &std::path::Path, user: &str) -> PathBuf {
        dir.join(format!("{}.json", user))
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self, user: &str) -> Result<Option<ChallengeState>, StoreError> {
        let user = validate_user(user)?;
        let blob = match self {
            ChallengeStore::Memory(map) => map.read().await.get(user).cloned(),
            ChallengeStore::JsonFile { dir } => {
                match tokio::fs::read_to_string(Self::path_for(dir, user)).await {
                    Ok(s) => Some(s),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => return Err(e.into()),
                }
            }
        };
        Ok(blob.and_then(|b| decode_state(user, &b)))
    }

    #[instrument(level = "debug", skip(self, state), fields(day = state.current_day))]
    pub async fn save(&self, user: &str, state: &ChallengeState) -> Result<(), StoreError> {
        let user = validate_user(user)?;
        let blob = serde_json::to_string_pretty(state)?;
        match self {
            ChallengeStore::Memory(map) => {
                map.write().await.insert(user.to_string(), blob);
            }
            ChallengeStore::JsonFile { dir } => {
                tokio::fs::create_dir_all(dir).await?;
                let path = Self::path_for(dir, user);
                let tmp = path.with_extension("json.tmp");
                tokio::fs::write(&tmp, blob.as_bytes()).await?;
                tokio::fs::rename(&tmp, &path).await?;
            }
        }
        debug!(target: "mathe_backend", %user, "Challenge saved");
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn clear(&self, user: &str) -> Result<(), StoreError> {
        let user = validate_user(user)?;
        match self {
            ChallengeStore::Memory(map) => {
                map.write().await.remove(user);
            }
            ChallengeStore::JsonFile { dir } => {
                match tokio::fs::remove_file(Self::path_for(dir, user)).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}
