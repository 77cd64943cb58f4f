use regex::Regex;

use crate::compose::dctypes::ComposeFile;
use crate::env_store::{normalise_key, EnvStore};
use crate::errors::AppError;

const SENSITIVE_MARKERS: [&str; 8] = [
    "PASSWD", "PASSWORD", "SECRET", "API_KEY", "APIKEY", "KEY", "TOKEN", "PRIVATE",
];

/// A key carries secret material when its upper-case form contains one of
/// the markers, unless it is a `_FILE` indirection.
pub fn is_sensitive_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    if upper.contains("_FILE") {
        return false;
    }
    SENSITIVE_MARKERS.iter().any(|m| upper.contains(m))
}

fn is_placeholder(value: &str) -> bool {
    let re = Regex::new(r"^\$\{?[A-Za-z_][A-Za-z0-9_]*\}?$").expect("placeholder pattern");
    re.is_match(value.trim())
}

/// Strip plaintext secrets out of service environments. The plaintext
/// moves into the env store under the normalised key (first writer wins)
/// and the entry is rewritten to `${NORMALISED_KEY}`. Values already
/// pointing at `/run/secrets` or holding a placeholder are left alone, so
/// a second run never re-extracts.
pub fn sanitize_passwords(
    doc: &mut ComposeFile,
    store: &mut EnvStore,
    mutate_store: bool,
) -> Result<(), AppError> {
    for (svc_name, svc) in doc.services.0.iter_mut() {
        for (key, value) in svc.environment.entries() {
            if !is_sensitive_key(&key) {
                continue;
            }
            let value = value.trim().to_string();
            if value.is_empty() || value.starts_with("/run/secrets") || is_placeholder(&value) {
                continue;
            }
            let normalised = normalise_key(&key);
            if mutate_store && store.set_if_absent(&normalised, &value)? {
                tracing::info!(
                    "Extracted value of '{}' from service '{}' into the env store",
                    key,
                    svc_name
                );
            }
            svc.environment.set(&key, &format!("${{{normalised}}}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse_document;

    #[test]
    fn classifies_sensitive_keys() {
        assert!(is_sensitive_key("POSTGRES_PASSWORD"));
        assert!(is_sensitive_key("api_key"));
        assert!(is_sensitive_key("GITEA_ADMIN_TOKEN"));
        assert!(is_sensitive_key("PRIVATE_PEM"));
        assert!(!is_sensitive_key("POSTGRES_PASSWORD_FILE"));
        assert!(!is_sensitive_key("POSTGRES_USER"));
    }

    #[test]
    fn plaintext_moves_to_the_store_once() {
        let raw = concat!(
            "services:\n",
            "  db:\n",
            "    image: postgres\n",
            "    environment:\n",
            "      - POSTGRES_PASSWORD=s3cr3t\n",
            "      - POSTGRES_USER=admin\n",
        );
        let mut doc = parse_document(raw).unwrap();
        let mut store = EnvStore::ephemeral();
        sanitize_passwords(&mut doc, &mut store, true).unwrap();

        let env = &doc.services.0["db"].environment;
        assert_eq!(env.get("POSTGRES_PASSWORD").as_deref(), Some("${POSTGRES_PASSWORD}"));
        assert_eq!(env.get("POSTGRES_USER").as_deref(), Some("admin"));
        assert_eq!(store.get("POSTGRES_PASSWORD"), Some("s3cr3t"));

        // the second run sees only placeholders and extracts nothing
        sanitize_passwords(&mut doc, &mut store, true).unwrap();
        assert_eq!(store.get("POSTGRES_PASSWORD"), Some("s3cr3t"));
    }

    #[test]
    fn secret_references_and_placeholders_are_skipped() {
        let raw = concat!(
            "services:\n",
            "  db:\n",
            "    image: postgres\n",
            "    environment:\n",
            "      - POSTGRES_PASSWORD_FILE=/run/secrets/DB_PW\n",
            "      - ADMIN_TOKEN=/run/secrets/ADMIN_TOKEN\n",
            "      - ROOT_PASSWORD=${ROOT_PASSWORD}\n",
        );
        let mut doc = parse_document(raw).unwrap();
        let mut store = EnvStore::ephemeral();
        sanitize_passwords(&mut doc, &mut store, true).unwrap();

        assert!(store.entries().is_empty());
        let env = &doc.services.0["db"].environment;
        assert_eq!(
            env.get("ADMIN_TOKEN").as_deref(),
            Some("/run/secrets/ADMIN_TOKEN")
        );
    }

    #[test]
    fn preview_mode_rewrites_without_storing() {
        let raw = concat!(
            "services:\n",
            "  db:\n",
            "    image: postgres\n",
            "    environment:\n",
            "      MYSQL_ROOT_PASSWORD: hunter2\n",
        );
        let mut doc = parse_document(raw).unwrap();
        let mut store = EnvStore::ephemeral();
        sanitize_passwords(&mut doc, &mut store, false).unwrap();

        assert!(store.entries().is_empty());
        assert_eq!(
            doc.services.0["db"].environment.get("MYSQL_ROOT_PASSWORD").as_deref(),
            Some("${MYSQL_ROOT_PASSWORD}")
        );
    }
}
