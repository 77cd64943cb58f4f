use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rand::Rng;

use crate::errors::AppError;

const PASSWORD_LEN: usize = 24;
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789._+-";

/// The durable `KEY=VALUE` store backing placeholder substitution and
/// generated secrets. Entries are merged from the env file and the Docker
/// secrets directory with case-insensitive reconciliation; a conflicting
/// pair aborts the load.
#[derive(Debug, Clone)]
pub struct EnvStore {
    path: PathBuf,
    entries: IndexMap<String, String>,
}

/// Normalised form of a key: upper-case, runs of non-alphanumerics collapsed
/// to a single `_`, leading and trailing `_` trimmed.
pub fn normalise_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    out.trim_matches('_').to_string()
}

pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

/// First three characters followed by `***`; used when a value has to be
/// named in a log line.
fn sanitise_value(value: &str) -> String {
    let prefix: String = value.chars().take(3).collect();
    format!("{prefix}***")
}

impl EnvStore {
    /// Load the env file and overlay the secrets directory.
    ///
    /// A key present in both sources with the same trimmed value logs a
    /// warning; differing values are a fatal [`AppError::ConfigConflict`].
    pub fn load(path: &Path, secrets_dir: &Path) -> Result<Self, AppError> {
        let mut store = Self {
            path: path.to_path_buf(),
            entries: IndexMap::new(),
        };

        match fs::read_to_string(path) {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((key, value)) = line.split_once('=') {
                        store.entries.insert(key.trim().to_string(), value.to_string());
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!("Could not read env store {}: {}", path.display(), err);
            }
        }

        store.merge_secrets_dir(secrets_dir)?;
        Ok(store)
    }

    /// An in-memory store that never touches disk; persistence becomes a
    /// no-op. Used by the side-effect-free enrichment path and by tests.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            entries: IndexMap::new(),
        }
    }

    fn merge_secrets_dir(&mut self, dir: &Path) -> Result<(), AppError> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(err) => {
                tracing::debug!("No secrets directory at {}: {}", dir.display(), err);
                return Ok(());
            }
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let value = match fs::read_to_string(&path) {
                Ok(v) => v.trim().to_string(),
                Err(err) => {
                    tracing::warn!("Could not read secret {}: {}", path.display(), err);
                    continue;
                }
            };

            match self.find_key(name) {
                None => {
                    self.entries.insert(name.to_string(), value);
                }
                Some(existing) => {
                    let existing = existing.to_string();
                    let current = self.entries.get(&existing).cloned().unwrap_or_default();
                    if current.trim() == value {
                        tracing::warn!(
                            "Key '{}' present in both env store and secrets directory with the same value",
                            name
                        );
                    } else {
                        return Err(AppError::ConfigConflict {
                            key: name.to_string(),
                            left: sanitise_value(current.trim()),
                            right: sanitise_value(&value),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Case-insensitive lookup of the stored key matching `key`.
    fn find_key(&self, key: &str) -> Option<&String> {
        self.entries.keys().find(|k| k.eq_ignore_ascii_case(key))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let stored = self.find_key(key)?;
        self.entries.get(stored.as_str()).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find_key(key).is_some()
    }

    pub fn entries(&self) -> &IndexMap<String, String> {
        &self.entries
    }

    /// Insert `key=value` unless a case-insensitive match already exists.
    /// Returns whether an entry was written. Existing entries are never
    /// overwritten.
    pub fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool, AppError> {
        if self.contains(key) {
            return Ok(false);
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()?;
        Ok(true)
    }

    /// Guarantee an entry for a secret name, generating a fresh password on
    /// first encounter.
    pub fn ensure_secret(&mut self, name: &str) -> Result<bool, AppError> {
        if self.contains(name) {
            return Ok(false);
        }
        let password = generate_password();
        self.set_if_absent(name, &password)
    }

    /// Full-file rewrite with mode 0600. Callers serialise writes through
    /// the process-level mutex around the store.
    pub fn persist(&self) -> Result<(), AppError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.path)
            .map_err(|e| AppError::fs(format!("open {}", self.path.display()), e))?;
        for (key, value) in &self.entries {
            writeln!(&mut file, "{key}={value}")
                .map_err(|e| AppError::fs(format!("write {}", self.path.display()), e))?;
        }
        Ok(())
    }
}
