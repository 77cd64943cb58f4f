use std::collections::BTreeSet;
use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;

use crate::compose::dctypes::{
    Command, ComposeFile, ConfigRef, Environment, Labels, MapOrEmpty, SingleValue, SysCtls,
};
use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;

const PLACEHOLDER_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)";

/// How unresolved placeholders are treated: the enrichment path leaves
/// them literal, the execution path refuses to run the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpandMode {
    Enrich,
    Execute,
}

/// Replacement values in ascending priority: ambient seeds, then the env
/// store, then the process environment. The last source wins.
pub struct VarResolver<'a> {
    seeds: IndexMap<String, String>,
    store: &'a EnvStore,
}

fn docker_socket_path(uid: u32) -> String {
    let rootless = format!("/run/user/{uid}/docker.sock");
    if Path::new(&rootless).exists() {
        rootless
    } else {
        "/var/run/docker.sock".to_string()
    }
}

impl<'a> VarResolver<'a> {
    /// Enrichment-time resolver: only the four ambient variables are
    /// seeded, so `${TZ}` and `${PUBLIC_DOMAIN_NAME}` synthesised by
    /// later passes stay literal in the effective document.
    pub fn new(settings: &Settings, store: &'a EnvStore) -> Self {
        let socket = docker_socket_path(settings.user_id);
        let mut seeds = IndexMap::new();
        seeds.insert("DOCKER_SOCK".to_string(), socket.clone());
        seeds.insert("DOCKER_SOCKET".to_string(), socket);
        seeds.insert("USER_ID".to_string(), settings.user_id.to_string());
        seeds.insert("USER_GID".to_string(), settings.user_gid.to_string());
        Self { seeds, store }
    }

    /// Execution-time resolver: everything the compose run must be able
    /// to resolve gets a fallback seed.
    pub fn for_execution(settings: &Settings, store: &'a EnvStore) -> Self {
        let mut resolver = Self::new(settings, store);
        resolver.seeds.insert(
            "PUBLIC_DOMAIN_NAME".to_string(),
            settings.public_domain.clone(),
        );
        resolver
            .seeds
            .insert("TZ".to_string(), "Etc/UTC".to_string());
        resolver
    }

    fn resolve(&self, name: &str) -> Option<String> {
        let mut value = self.seeds.get(name).cloned();
        if let Some(v) = self.store.get(name) {
            value = Some(v.to_string());
        }
        if let Ok(v) = std::env::var(name) {
            value = Some(v);
        }
        value
    }
}

fn expand(
    input: &str,
    re: &Regex,
    resolver: &VarResolver,
    unresolved: &mut BTreeSet<String>,
) -> String {
    re.replace_all(input, |caps: &regex::Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match resolver.resolve(name) {
            Some(value) => value,
            None => {
                unresolved.insert(name.to_string());
                caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
            }
        }
    })
    .into_owned()
}

fn expand_opt(
    field: &mut Option<String>,
    re: &Regex,
    resolver: &VarResolver,
    unresolved: &mut BTreeSet<String>,
) {
    if let Some(value) = field {
        *value = expand(value, re, resolver, unresolved);
    }
}

fn expand_value_side(
    item: &mut String,
    re: &Regex,
    resolver: &VarResolver,
    unresolved: &mut BTreeSet<String>,
) {
    if let Some((key, value)) = item.split_once('=') {
        let expanded = expand(value, re, resolver, unresolved);
        *item = format!("{key}={expanded}");
    }
}

fn expand_single_values(
    map: &mut IndexMap<String, SingleValue>,
    re: &Regex,
    resolver: &VarResolver,
    unresolved: &mut BTreeSet<String>,
) {
    for value in map.values_mut() {
        if let SingleValue::String(s) = value {
            *s = expand(s, re, resolver, unresolved);
        }
    }
}

/// Substitute `${VAR}` / `$VAR` across every string position the pipeline
/// owns. In [`ExpandMode::Execute`] any variable that stays unresolved
/// aborts with [`AppError::UnresolvedPlaceholder`].
pub fn expand_document(
    doc: &mut ComposeFile,
    resolver: &VarResolver,
    mode: ExpandMode,
) -> Result<(), AppError> {
    let re = Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern");
    let mut unresolved = BTreeSet::new();

    for svc in doc.services.0.values_mut() {
        expand_opt(&mut svc.image, &re, resolver, &mut unresolved);
        expand_opt(&mut svc.container_name, &re, resolver, &mut unresolved);
        expand_opt(&mut svc.user, &re, resolver, &mut unresolved);
        expand_opt(&mut svc.restart, &re, resolver, &mut unresolved);

        match &mut svc.command {
            Some(Command::Simple(s)) => *s = expand(s, &re, resolver, &mut unresolved),
            Some(Command::Args(items)) => {
                for item in items {
                    *item = expand(item, &re, resolver, &mut unresolved);
                }
            }
            None => {}
        }

        for port in &mut svc.ports {
            if let SingleValue::String(s) = port {
                *s = expand(s, &re, resolver, &mut unresolved);
            }
        }
        for mount in &mut svc.volumes {
            *mount = expand(mount, &re, resolver, &mut unresolved);
        }

        match &mut svc.environment {
            Environment::List(items) => {
                for item in items {
                    expand_value_side(item, &re, resolver, &mut unresolved);
                }
            }
            Environment::KvPair(map) => {
                for value in map.values_mut() {
                    if let Some(SingleValue::String(s)) = value {
                        *s = expand(s, &re, resolver, &mut unresolved);
                    }
                }
            }
        }

        svc.networks
            .map_strings(&mut |s| expand(s, &re, resolver, &mut unresolved));

        match &mut svc.labels {
            Labels::List(items) => {
                for item in items {
                    expand_value_side(item, &re, resolver, &mut unresolved);
                }
            }
            Labels::Map(map) => expand_single_values(map, &re, resolver, &mut unresolved),
        }

        for config in &mut svc.configs {
            match config {
                ConfigRef::Short(s) => *s = expand(s, &re, resolver, &mut unresolved),
                ConfigRef::Long { source, target, .. } => {
                    *source = expand(source, &re, resolver, &mut unresolved);
                    expand_opt(target, &re, resolver, &mut unresolved);
                }
            }
        }

        match &mut svc.sysctls {
            SysCtls::List(items) => {
                for item in items {
                    expand_value_side(item, &re, resolver, &mut unresolved);
                }
            }
            SysCtls::Map(map) => expand_single_values(map, &re, resolver, &mut unresolved),
        }

        for secret in &mut svc.secrets {
            *secret = expand(secret, &re, resolver, &mut unresolved);
        }

        if let Some(logging) = &mut svc.logging {
            expand_single_values(&mut logging.options, &re, resolver, &mut unresolved);
        }
    }

    let volumes = std::mem::take(&mut doc.volumes.0);
    for (key, mut decl) in volumes {
        let key = expand(&key, &re, resolver, &mut unresolved);
        if let MapOrEmpty::Map(body) = &mut decl {
            expand_opt(&mut body.name, &re, resolver, &mut unresolved);
            expand_opt(&mut body.driver, &re, resolver, &mut unresolved);
            expand_single_values(&mut body.driver_opts, &re, resolver, &mut unresolved);
        }
        doc.volumes.0.insert(key, decl);
    }

    let configs = std::mem::take(&mut doc.configs);
    for (key, mut decl) in configs {
        let key = expand(&key, &re, resolver, &mut unresolved);
        expand_opt(&mut decl.file, &re, resolver, &mut unresolved);
        doc.configs.insert(key, decl);
    }

    let secrets = std::mem::take(&mut doc.secrets);
    for (key, mut decl) in secrets {
        let key = expand(&key, &re, resolver, &mut unresolved);
        expand_opt(&mut decl.name, &re, resolver, &mut unresolved);
        expand_opt(&mut decl.environment, &re, resolver, &mut unresolved);
        expand_opt(&mut decl.file, &re, resolver, &mut unresolved);
        doc.secrets.insert(key, decl);
    }

    if mode == ExpandMode::Execute && !unresolved.is_empty() {
        return Err(AppError::UnresolvedPlaceholder {
            vars: unresolved.into_iter().collect(),
        });
    }
    Ok(())
}
