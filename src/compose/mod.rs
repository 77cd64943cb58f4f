pub mod dctypes;
pub mod pipeline;

use crate::errors::AppError;
use dctypes::ComposeFile;

/// Parse a user-authored compose document. An unparseable body or a
/// document without services is the only fatal validation.
pub fn parse_document(raw: &str) -> Result<ComposeFile, AppError> {
    let doc: ComposeFile = serde_yaml::from_str(raw)
        .map_err(|e| AppError::InputInvalid(format!("YAML parse error: {e}")))?;
    if doc.services.0.is_empty() {
        return Err(AppError::InputInvalid(
            "compose document declares no services".to_string(),
        ));
    }
    Ok(doc)
}

pub fn to_yaml(doc: &ComposeFile) -> Result<String, AppError> {
    serde_yaml::to_string(doc).map_err(|e| AppError::Internal(format!("YAML encode error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_documents_without_services() {
        assert!(parse_document("networks:\n  homelab:\n").is_err());
        assert!(parse_document("not yaml: [").is_err());
    }

    #[test]
    fn multiline_scalars_round_trip_in_literal_block_style() {
        let raw = concat!(
            "services:\n",
            "  web:\n",
            "    image: nginx\n",
            "configs:\n",
            "  tls_cert:\n",
            "    content: |\n",
            "      -----BEGIN CERTIFICATE-----\n",
            "      MIIBszCCAVmgAwIBAgIUX\n",
            "      -----END CERTIFICATE-----\n",
        );
        let doc = parse_document(raw).unwrap();
        let body = doc.config_content("tls_cert").unwrap().to_string();

        let emitted = to_yaml(&doc).unwrap();
        assert!(emitted.contains("content: |"), "emitted:\n{emitted}");

        let reparsed = parse_document(&emitted).unwrap();
        assert_eq!(reparsed.config_content("tls_cert").unwrap(), body);
    }

    #[test]
    fn unknown_fields_survive_the_round_trip() {
        let raw = concat!(
            "services:\n",
            "  db:\n",
            "    image: postgres\n",
            "    depends_on:\n",
            "      - cache\n",
            "    healthcheck:\n",
            "      test: pg_isready\n",
        );
        let doc = parse_document(raw).unwrap();
        let emitted = to_yaml(&doc).unwrap();
        assert!(emitted.contains("depends_on"));
        assert!(emitted.contains("pg_isready"));
    }
}
