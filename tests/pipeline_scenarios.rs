//! End-to-end pipeline scenarios, exercised without a docker daemon.

use std::fs;
use std::path::Path;

use composectl::compose::dctypes::Environment;
use composectl::compose::pipeline::{self, EnrichOptions};
use composectl::compose::{parse_document, to_yaml};
use composectl::configuration::Settings;
use composectl::env_store::EnvStore;
use composectl::errors::AppError;
use tempfile::TempDir;

fn settings_for(dir: &Path) -> Settings {
    Settings {
        listen_host: "127.0.0.1".to_string(),
        listen_port: 0,
        stacks_dir: dir.to_path_buf(),
        env_file: dir.join("prod.env"),
        secrets_dir: dir.join("secrets"),
        public_domain: "example.test".to_string(),
        user_id: 1000,
        user_gid: 1000,
    }
}

fn store_for(settings: &Settings) -> EnvStore {
    EnvStore::load(&settings.env_file, &settings.secrets_dir).expect("load env store")
}

#[test]
fn put_creates_sanitised_source_and_enriched_effective() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let mut store = store_for(&settings);

    let raw = concat!(
        "services:\n",
        "  db:\n",
        "    image: postgres\n",
        "    environment:\n",
        "      - POSTGRES_PASSWORD=s3cr3t\n",
    );
    let dual = pipeline::process_put(raw, &settings, &mut store).unwrap();

    // the sanitised source keeps only the placeholder
    assert!(dual
        .source_yaml
        .contains("POSTGRES_PASSWORD=${POSTGRES_PASSWORD}"));
    assert!(!dual.source_yaml.contains("s3cr3t"));

    // enrichment artifacts on the effective document
    let effective = parse_document(&dual.effective_yaml).unwrap();
    let db = &effective.services.0["db"];
    assert_eq!(db.container_name.as_deref(), Some("db"));
    assert_eq!(db.mem_limit.as_ref().unwrap().to_string(), "256m");
    assert_eq!(db.cpus.as_ref().unwrap().to_string(), "0.5");
    let logging = db.logging.as_ref().unwrap();
    assert_eq!(logging.driver.as_deref(), Some("json-file"));
    assert_eq!(logging.options["max-size"].to_string(), "10m");
    assert_eq!(logging.options["max-file"].to_string(), "3");
    assert!(db.networks.contains("homelab"));
    assert_eq!(db.environment.get("TZ").as_deref(), Some("${TZ}"));
    assert_eq!(
        db.environment.get("POSTGRES_PASSWORD").as_deref(),
        Some("${POSTGRES_PASSWORD}")
    );
    assert!(effective.networks.0["homelab"].as_ref().unwrap().external);

    // the plaintext landed in the env store file exactly once
    let env_file = fs::read_to_string(settings.env_file).unwrap();
    assert!(env_file.contains("POSTGRES_PASSWORD=s3cr3t"));
}

#[test]
fn map_form_environments_canonicalise_to_sequences() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let mut store = store_for(&settings);

    let raw = concat!(
        "services:\n",
        "  db:\n",
        "    image: postgres\n",
        "    environment:\n",
        "      POSTGRES_PASSWORD: s3cr3t\n",
        "      POSTGRES_USER: admin\n",
    );
    let dual = pipeline::process_put(raw, &settings, &mut store).unwrap();

    // both artifacts write the environment back as a K=V sequence
    let source = parse_document(&dual.source_yaml).unwrap();
    assert_eq!(
        source.services.0["db"].environment,
        Environment::List(vec![
            "POSTGRES_PASSWORD=${POSTGRES_PASSWORD}".to_string(),
            "POSTGRES_USER=admin".to_string(),
        ])
    );
    assert!(dual
        .source_yaml
        .contains("- POSTGRES_PASSWORD=${POSTGRES_PASSWORD}"));

    let effective = parse_document(&dual.effective_yaml).unwrap();
    let env = &effective.services.0["db"].environment;
    assert!(matches!(env, Environment::List(_)));
    assert_eq!(
        env.get("POSTGRES_PASSWORD").as_deref(),
        Some("${POSTGRES_PASSWORD}")
    );
    assert!(dual.effective_yaml.contains("- TZ=${TZ}"));
    assert_eq!(store.get("POSTGRES_PASSWORD"), Some("s3cr3t"));
}

#[test]
fn secret_references_are_injected_and_generated() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let mut store = store_for(&settings);
    assert!(store.get("DB_PW").is_none());

    let raw = concat!(
        "services:\n",
        "  db:\n",
        "    image: postgres\n",
        "    environment:\n",
        "      - POSTGRES_PASSWORD_FILE=/run/secrets/DB_PW\n",
    );
    let dual = pipeline::process_put(raw, &settings, &mut store).unwrap();

    let effective = parse_document(&dual.effective_yaml).unwrap();
    assert_eq!(effective.services.0["db"].secrets, vec!["DB_PW"]);
    let decl = &effective.secrets["DB_PW"];
    assert_eq!(decl.name.as_deref(), Some("DB_PW"));
    assert_eq!(decl.environment.as_deref(), Some("DB_PW"));

    let generated = store.get("DB_PW").expect("generated secret").to_string();
    assert_eq!(generated.len(), 24);
    let env_file = fs::read_to_string(settings.env_file).unwrap();
    assert!(env_file.contains(&format!("DB_PW={generated}")));
}

#[test]
fn http_services_get_proxy_labels() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let mut store = store_for(&settings);

    let raw = concat!(
        "services:\n",
        "  web:\n",
        "    image: nginx\n",
        "    ports:\n",
        "      - \"8080:80\"\n",
        "    labels:\n",
        "      traefik.enable: \"true\"\n",
    );
    let dual = pipeline::process_put(raw, &settings, &mut store).unwrap();

    let effective = parse_document(&dual.effective_yaml).unwrap();
    let labels = &effective.services.0["web"].labels;
    assert_eq!(
        labels
            .get("traefik.http.services.web.loadbalancer.server.port")
            .as_deref(),
        Some("80")
    );
    assert_eq!(
        labels
            .get("traefik.http.services.web.loadbalancer.server.scheme")
            .as_deref(),
        Some("http")
    );
    assert!(labels
        .get("traefik.http.routers.web.rule")
        .unwrap()
        .contains("`web.localhost`"));
}

#[test]
fn privileged_ports_grant_capability_and_sysctl() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let mut store = store_for(&settings);

    let raw = concat!(
        "services:\n",
        "  web:\n",
        "    image: nginx\n",
        "    ports:\n",
        "      - \"80:80\"\n",
    );
    let dual = pipeline::process_put(raw, &settings, &mut store).unwrap();

    let effective = parse_document(&dual.effective_yaml).unwrap();
    let web = &effective.services.0["web"];
    assert!(web.cap_add.iter().any(|c| c == "NET_BIND_SERVICE"));
    assert!(web
        .sysctls
        .contains_key("net.ipv4.ip_unprivileged_port_start"));
    assert!(dual
        .effective_yaml
        .contains("net.ipv4.ip_unprivileged_port_start=80"));
}

#[test]
fn conflicting_env_store_and_secrets_abort_startup() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    fs::write(&settings.env_file, "ADMIN_PASSWORD=old\n").unwrap();
    fs::create_dir(&settings.secrets_dir).unwrap();
    fs::write(settings.secrets_dir.join("admin_password"), "new\n").unwrap();

    let err = EnvStore::load(&settings.env_file, &settings.secrets_dir).unwrap_err();
    match err {
        AppError::ConfigConflict { key, left, right } => {
            assert_eq!(key, "admin_password");
            assert_eq!(left, "old***");
            assert_eq!(right, "new***");
        }
        other => panic!("expected ConfigConflict, got {other:?}"),
    }
}

#[test]
fn enrichment_is_idempotent_after_the_first_run() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let mut store = store_for(&settings);

    let raw = concat!(
        "services:\n",
        "  app:\n",
        "    image: ghcr.io/example/app:1.0\n",
        "    ports:\n",
        "      - \"8080:80\"\n",
        "    environment:\n",
        "      - APP_SECRET=abc123\n",
        "      - CACHE_FILE=/run/secrets/CACHE_KEY\n",
        "    volumes:\n",
        "      - data:/var/lib/app\n",
    );
    let mut doc = parse_document(raw).unwrap();
    pipeline::enrich_document(&mut doc, &settings, &mut store, &EnrichOptions::enrich()).unwrap();
    let first = to_yaml(&doc).unwrap();

    pipeline::enrich_document(&mut doc, &settings, &mut store, &EnrichOptions::enrich()).unwrap();
    let second = to_yaml(&doc).unwrap();

    pipeline::enrich_document(&mut doc, &settings, &mut store, &EnrichOptions::enrich()).unwrap();
    let third = to_yaml(&doc).unwrap();

    // a host TZ variable may legitimately expand on the second run; from
    // then on the document is a fixed point
    if std::env::var("TZ").is_err() {
        assert_eq!(first, second);
    }
    assert_eq!(second, third);
}

#[test]
fn preview_enrichment_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let store = store_for(&settings);

    let raw = concat!(
        "services:\n",
        "  db:\n",
        "    image: postgres\n",
        "    environment:\n",
        "      - POSTGRES_PASSWORD=s3cr3t\n",
        "      - TOKEN_FILE=/run/secrets/APP_TOKEN\n",
    );
    let yaml = pipeline::enrich_preview(raw, &settings, &store).unwrap();

    assert!(yaml.contains("POSTGRES_PASSWORD=${POSTGRES_PASSWORD}"));
    assert!(yaml.contains("APP_TOKEN"));
    // neither the extracted password nor a generated secret was persisted
    assert!(!settings.env_file.exists());
    assert!(store.get("POSTGRES_PASSWORD").is_none());
    assert!(store.get("APP_TOKEN").is_none());
}
