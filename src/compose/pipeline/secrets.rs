use crate::compose::dctypes::{ComposeFile, SecretDecl};
use crate::env_store::EnvStore;
use crate::errors::AppError;

/// The secret name referenced by an environment value of the form
/// `/run/secrets/NAME`, unwrapping `${NAME}` when the name itself is a
/// placeholder.
fn secret_name_from_value(value: &str) -> Option<String> {
    let rest = value.trim().strip_prefix("/run/secrets/")?;
    let rest = rest.trim();
    let name = rest
        .strip_prefix("${")
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(rest);
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Scan environment entries for `/run/secrets/NAME` references, append the
/// name to the referring service's `secrets` list and declare it at the
/// top level.
pub fn detect_secrets(doc: &mut ComposeFile) {
    let mut detected: Vec<(String, String)> = Vec::new();
    for (svc_name, svc) in &doc.services.0 {
        for (_, value) in svc.environment.entries() {
            if let Some(name) = secret_name_from_value(&value) {
                detected.push((svc_name.clone(), name));
            }
        }
    }

    for (svc_name, secret) in detected {
        if let Some(svc) = doc.services.0.get_mut(&svc_name) {
            if !svc.secrets.iter().any(|s| s == &secret) {
                svc.secrets.push(secret.clone());
            }
        }
        if !doc.secrets.contains_key(&secret) {
            doc.secrets
                .insert(secret.clone(), SecretDecl::from_env(&secret));
        }
    }
}

/// Generate env-store entries for every environment-sourced secret that
/// does not have one yet. Existing entries are never touched.
pub fn ensure_secrets_exist(doc: &ComposeFile, store: &mut EnvStore) -> Result<(), AppError> {
    for (name, decl) in &doc.secrets {
        if decl.environment.is_none() {
            continue;
        }
        if store.ensure_secret(name)? {
            tracing::info!("Generated secret '{}'", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse_document;

    #[test]
    fn extracts_plain_and_wrapped_names() {
        assert_eq!(
            secret_name_from_value("/run/secrets/DB_PW").as_deref(),
            Some("DB_PW")
        );
        assert_eq!(
            secret_name_from_value("/run/secrets/${DB_PW}").as_deref(),
            Some("DB_PW")
        );
        assert_eq!(secret_name_from_value("plain-value"), None);
        assert_eq!(secret_name_from_value("/run/secrets/"), None);
    }

    #[test]
    fn detection_declares_service_and_top_level() {
        let raw = concat!(
            "services:\n",
            "  db:\n",
            "    image: postgres\n",
            "    environment:\n",
            "      - POSTGRES_PASSWORD_FILE=/run/secrets/DB_PW\n",
        );
        let mut doc = parse_document(raw).unwrap();
        detect_secrets(&mut doc);
        detect_secrets(&mut doc);

        let svc = &doc.services.0["db"];
        assert_eq!(svc.secrets, vec!["DB_PW"]);
        let decl = &doc.secrets["DB_PW"];
        assert_eq!(decl.name.as_deref(), Some("DB_PW"));
        assert_eq!(decl.environment.as_deref(), Some("DB_PW"));
    }

    #[test]
    fn ensure_generates_only_missing_entries() {
        let raw = concat!(
            "services:\n",
            "  db:\n",
            "    image: postgres\n",
            "    environment:\n",
            "      - POSTGRES_PASSWORD_FILE=/run/secrets/DB_PW\n",
        );
        let mut doc = parse_document(raw).unwrap();
        detect_secrets(&mut doc);

        let mut store = EnvStore::ephemeral();
        store.set_if_absent("DB_PW", "already-there").unwrap();
        ensure_secrets_exist(&doc, &mut store).unwrap();
        assert_eq!(store.get("DB_PW"), Some("already-there"));
    }
}
