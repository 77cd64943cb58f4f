pub mod defaults;
pub mod networks;
pub mod placeholders;
pub mod proxy;
pub mod sanitize;
pub mod secrets;
pub mod timezone;

pub use placeholders::{ExpandMode, VarResolver};

use crate::compose::dctypes::ComposeFile;
use crate::compose::{parse_document, to_yaml};
use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;

/// Controls the two pipeline variants: file-writing enrichment on PUT
/// (store mutations allowed, unresolved placeholders kept literal) and
/// the side-effect-free preview used by the enrich endpoint.
#[derive(Clone, Copy, Debug)]
pub struct EnrichOptions {
    pub mode: ExpandMode,
    pub mutate_store: bool,
}

impl EnrichOptions {
    pub fn enrich() -> Self {
        Self {
            mode: ExpandMode::Enrich,
            mutate_store: true,
        }
    }

    pub fn preview() -> Self {
        Self {
            mode: ExpandMode::Enrich,
            mutate_store: false,
        }
    }

    pub fn execute() -> Self {
        Self {
            mode: ExpandMode::Execute,
            mutate_store: true,
        }
    }
}

/// The enrichment sequence. Pass order is load-bearing: placeholder
/// expansion runs before label synthesis and the TZ append so their
/// `${…}` references survive into the effective document, and password
/// sanitisation runs last so nothing it rewrote is reprocessed.
#[tracing::instrument(name = "Enrich compose document.", skip_all)]
pub fn enrich_document(
    doc: &mut ComposeFile,
    settings: &Settings,
    store: &mut EnvStore,
    opts: &EnrichOptions,
) -> Result<(), AppError> {
    secrets::detect_secrets(doc);
    if opts.mutate_store {
        secrets::ensure_secrets_exist(doc, store)?;
    }
    defaults::default_container_names(doc);
    defaults::default_resource_limits(doc);
    defaults::default_logging(doc);
    networks::ensure_shared_network(doc);
    networks::declare_missing_resources(doc);
    {
        let resolver = VarResolver::new(settings, store);
        placeholders::expand_document(doc, &resolver, opts.mode)?;
    }
    proxy::apply_proxy_labels(doc);
    proxy::grant_privileged_ports(doc);
    timezone::mount_timezone_files(doc);
    timezone::ensure_tz_variable(doc);
    sanitize::sanitize_passwords(doc, store, opts.mutate_store)?;
    Ok(())
}

/// Both artifacts of a PUT: the sanitised source (raw parse plus password
/// sanitisation) and the fully enriched, re-sanitised effective document.
pub struct DualOutput {
    pub source_yaml: String,
    pub effective_yaml: String,
}

#[tracing::instrument(name = "Process stack document.", skip_all)]
pub fn process_put(
    raw: &str,
    settings: &Settings,
    store: &mut EnvStore,
) -> Result<DualOutput, AppError> {
    let parsed = parse_document(raw)?;

    let mut source = parsed.clone();
    sanitize::sanitize_passwords(&mut source, store, true)?;

    let mut effective = parsed;
    enrich_document(&mut effective, settings, store, &EnrichOptions::enrich())?;

    Ok(DualOutput {
        source_yaml: to_yaml(&source)?,
        effective_yaml: to_yaml(&effective)?,
    })
}

/// In-memory enrichment for the preview endpoint: no file writes, no env
/// store mutation.
pub fn enrich_preview(raw: &str, settings: &Settings, store: &EnvStore) -> Result<String, AppError> {
    let mut doc = parse_document(raw)?;
    let mut scratch = store.clone();
    enrich_document(&mut doc, settings, &mut scratch, &EnrichOptions::preview())?;
    to_yaml(&doc)
}
