use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::errors::AppError;

const JWT_KEY_LEN: usize = 64;
const JWT_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Process-wide settings, resolved once at startup and shared through
/// `web::Data`. Path discovery must run before the env store is loaded,
/// since the store lives inside the stacks directory.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_host: String,
    pub listen_port: u16,
    pub stacks_dir: PathBuf,
    pub env_file: PathBuf,
    pub secrets_dir: PathBuf,
    pub public_domain: String,
    pub user_id: u32,
    pub user_gid: u32,
}

impl Settings {
    pub fn source_path(&self, stack: &str) -> PathBuf {
        self.stacks_dir.join(format!("{stack}.yml"))
    }

    pub fn effective_path(&self, stack: &str) -> PathBuf {
        self.stacks_dir.join(format!("{stack}.effective.yml"))
    }
}

/// Resolves a named value against the six-level cascade:
/// command-line argument, `KEY_FILE` env var, `KEY` env var, env-store
/// file, `/run/secrets` entry, supplied default. First hit wins; read
/// failures log a warning and fall through.
#[derive(Debug, Clone)]
pub struct ValueResolver {
    args: Vec<String>,
    env_file: Option<PathBuf>,
    secrets_dir: PathBuf,
}

impl ValueResolver {
    pub fn from_process_args(secrets_dir: PathBuf) -> Self {
        Self {
            args: std::env::args().collect(),
            env_file: None,
            secrets_dir,
        }
    }

    pub fn with_args(args: Vec<String>, secrets_dir: PathBuf) -> Self {
        Self {
            args,
            env_file: None,
            secrets_dir,
        }
    }

    pub fn set_env_file(&mut self, path: PathBuf) {
        self.env_file = Some(path);
    }

    pub fn resolve(&self, key: &str, default: Option<&str>) -> Option<String> {
        if let Some(v) = self.lookup_arg(key) {
            return Some(v);
        }
        if let Some(v) = self.lookup_env_file_pointer(key) {
            return Some(v);
        }
        if let Ok(v) = std::env::var(key.to_uppercase()) {
            return Some(v);
        }
        if let Some(v) = self.lookup_env_store(key) {
            return Some(v);
        }
        if let Some(v) = self.lookup_secrets_dir(key) {
            return Some(v);
        }
        default.map(str::to_string)
    }

    /// `--key value`, `--key=value` and the single-dash forms; the key is
    /// lowercased with `_` mapped to `-`.
    fn lookup_arg(&self, key: &str) -> Option<String> {
        let flag = key.to_lowercase().replace('_', "-");
        let forms = [format!("--{flag}"), format!("-{flag}")];
        let mut iter = self.args.iter().peekable();
        while let Some(arg) = iter.next() {
            for form in &forms {
                if arg == form {
                    return iter.peek().map(|v| v.to_string());
                }
                if let Some(rest) = arg.strip_prefix(&format!("{form}=")) {
                    return Some(rest.to_string());
                }
            }
        }
        None
    }

    /// `KEY_FILE` names a file whose trimmed contents are the value.
    fn lookup_env_file_pointer(&self, key: &str) -> Option<String> {
        let pointer = format!("{}_FILE", key.to_uppercase());
        let path = std::env::var(pointer).ok()?;
        match fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(err) => {
                tracing::warn!("Could not read {}: {}", path, err);
                None
            }
        }
    }

    fn lookup_env_store(&self, key: &str) -> Option<String> {
        let path = self.env_file.as_ref()?;
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not read env store {}: {}", path.display(), err);
                }
                return None;
            }
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                if k.trim().eq_ignore_ascii_case(key) {
                    return Some(v.to_string());
                }
            }
        }
        None
    }

    /// `/run/secrets/KEY`, `/run/secrets/key`, `/run/secrets/Key`; the
    /// first existing file wins.
    fn lookup_secrets_dir(&self, key: &str) -> Option<String> {
        let mut title = String::new();
        let mut chars = key.chars();
        if let Some(first) = chars.next() {
            title.push(first.to_ascii_uppercase());
            title.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
        for candidate in [key.to_uppercase(), key.to_lowercase(), title] {
            let path = self.secrets_dir.join(&candidate);
            match fs::read_to_string(&path) {
                Ok(content) => return Some(content.trim().to_string()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::warn!("Could not read {}: {}", path.display(), err);
                    continue;
                }
            }
        }
        None
    }
}

/// The stacks directory: `--stacks-dir`, else the first existing of
/// `/containers` and `/stacks`, else `$HOME/.local/containers` (created).
fn init_paths(resolver: &ValueResolver) -> Result<PathBuf, AppError> {
    if let Some(dir) = resolver.resolve("STACKS_DIR", None) {
        let dir = PathBuf::from(dir);
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::fs(format!("create {}", dir.display()), e))?;
        return Ok(dir);
    }
    for fixed in ["/containers", "/stacks"] {
        if Path::new(fixed).is_dir() {
            return Ok(PathBuf::from(fixed));
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    let fallback = PathBuf::from(home).join(".local/containers");
    fs::create_dir_all(&fallback)
        .map_err(|e| AppError::fs(format!("create {}", fallback.display()), e))?;
    Ok(fallback)
}

pub fn get_configuration() -> Result<Settings, AppError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let mut resolver = ValueResolver::from_process_args(PathBuf::from("/run/secrets"));
    if let Some(dir) = resolver.resolve("SECRETS_DIR", None) {
        resolver.secrets_dir = PathBuf::from(dir);
    }

    let stacks_dir = init_paths(&resolver)?;
    let env_file = stacks_dir.join("prod.env");
    resolver.set_env_file(env_file.clone());

    let listen_host = resolver
        .resolve("HOST", Some("0.0.0.0"))
        .unwrap_or_default();
    let listen_port = resolver
        .resolve("PORT", Some("8120"))
        .unwrap_or_default()
        .parse::<u16>()
        .map_err(|_| AppError::InputInvalid("PORT is not a valid port number".into()))?;
    let public_domain = resolver
        .resolve("PUBLIC_DOMAIN_NAME", Some("localhost"))
        .unwrap_or_default();

    Ok(Settings {
        listen_host,
        listen_port,
        stacks_dir,
        env_file,
        secrets_dir: resolver.secrets_dir.clone(),
        public_domain,
        user_id: uzers::get_effective_uid(),
        user_gid: uzers::get_effective_gid(),
    })
}

/// The signing key consumed by the session middleware. Resolved through
/// the cascade; a missing key yields a fresh 64-character URL-safe random
/// string that the caller may persist.
pub fn jwt_secret(resolver: &ValueResolver) -> String {
    if let Some(key) = resolver.resolve("JWT_SECRET", None) {
        return key;
    }
    let mut rng = rand::thread_rng();
    (0..JWT_KEY_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..JWT_CHARSET.len());
            JWT_CHARSET[idx] as char
        })
        .collect()
}
