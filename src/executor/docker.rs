use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_derive::Serialize;

use crate::compose::dctypes::{ComposeFile, SingleValue};
use crate::compose::pipeline::{
    self, networks::SHARED_NETWORK, placeholders, secrets, ExpandMode, VarResolver,
};
use crate::compose::{parse_document, to_yaml};
use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::command::{capture_command, stream_command};
use crate::executor::reconstruct;
use crate::executor::stream::OutputStream;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackAction {
    Up,
    Down,
    Start,
    Stop,
    Logs,
}

impl StackAction {
    fn compose_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Up => &["up", "-d", "--wait"],
            Self::Down => &["down"],
            Self::Start => &["start"],
            Self::Stop => &["stop"],
            Self::Logs => &["logs"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct ContainerBrief {
    pub name: String,
    pub state: String,
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct StackSummary {
    pub name: String,
    pub containers: Vec<ContainerBrief>,
}

#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(default, rename = "Labels")]
    labels: String,
}

impl PsEntry {
    fn project(&self) -> Option<&str> {
        self.labels
            .split(',')
            .find_map(|l| l.strip_prefix("com.docker.compose.project="))
    }
}

/// Drives `docker` / `docker compose` against the effective documents on
/// disk, streaming every line of subprocess output to the caller.
#[derive(Clone)]
pub struct Executor {
    settings: Arc<Settings>,
    store: Arc<Mutex<EnvStore>>,
}

impl Executor {
    pub fn new(settings: Arc<Settings>, store: Arc<Mutex<EnvStore>>) -> Self {
        Self { settings, store }
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, EnvStore>, AppError> {
        self.store
            .lock()
            .map_err(|_| AppError::Internal("env store lock poisoned".to_string()))
    }

    /// The document an action runs against: the effective file, else the
    /// source enriched in memory, else a reconstruction from live
    /// containers.
    async fn effective_document(&self, stack: &str) -> Result<ComposeFile, AppError> {
        match fs::read_to_string(self.settings.effective_path(stack)) {
            Ok(raw) => return parse_document(&raw),
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!("Could not read effective document for '{}': {}", stack, err);
            }
            Err(_) => {}
        }

        match fs::read_to_string(self.settings.source_path(stack)) {
            Ok(raw) => {
                let mut doc = parse_document(&raw)?;
                let mut store = self.lock_store()?;
                pipeline::enrich_document(
                    &mut doc,
                    &self.settings,
                    &mut store,
                    &pipeline::EnrichOptions::enrich(),
                )?;
                return Ok(doc);
            }
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!("Could not read source document for '{}': {}", stack, err);
            }
            Err(_) => {}
        }

        let ids = reconstruct::project_container_ids(stack)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("Container lookup for '{}' failed: {}", stack, err);
                Vec::new()
            });
        if ids.is_empty() {
            return Err(AppError::NotFound(stack.to_string()));
        }
        let containers = reconstruct::inspect_containers(&ids).await?;
        let mut store = self.lock_store()?;
        reconstruct::document_from_inspect(stack, &containers, &mut store)
    }

    /// Fully expand the document for execution and snapshot the child
    /// environment. Unresolved placeholders are fatal here.
    fn prepare_for_execution(
        &self,
        mut doc: ComposeFile,
    ) -> Result<(String, Vec<(String, String)>), AppError> {
        let store = self.lock_store()?;
        let resolver = VarResolver::for_execution(&self.settings, &store);
        placeholders::expand_document(&mut doc, &resolver, ExpandMode::Execute)?;
        let envs = store
            .entries()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok((to_yaml(&doc)?, envs))
    }

    async fn resource_exists(&self, kind: &str, name: &str) -> bool {
        let args: Vec<String> = [kind, "inspect", name].iter().map(|s| s.to_string()).collect();
        capture_command("docker", &args)
            .await
            .map(|o| o.success)
            .unwrap_or(false)
    }

    async fn create_resource(
        &self,
        kind: &str,
        name: &str,
        driver: &str,
        opts: &IndexMap<String, SingleValue>,
        out: &OutputStream,
    ) -> Result<(), AppError> {
        let mut args: Vec<String> = vec![
            kind.to_string(),
            "create".to_string(),
            "--driver".to_string(),
            driver.to_string(),
        ];
        for (key, value) in opts {
            args.push("--opt".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(name.to_string());
        stream_command(out, "docker", &args, None, &[]).await
    }

    /// Make sure every non-external network and volume of the document
    /// exists, creating missing ones. The shared network is this plane's
    /// to provide even though it is declared external.
    async fn ensure_prerequisites(
        &self,
        doc: &ComposeFile,
        out: &OutputStream,
    ) -> Result<(), AppError> {
        if !self.resource_exists("network", SHARED_NETWORK).await {
            out.info(&format!(
                "Creating network: {SHARED_NETWORK} with driver: bridge"
            ))
            .await;
            self.create_resource("network", SHARED_NETWORK, "bridge", &IndexMap::new(), out)
                .await?;
        }

        for (name, decl) in &doc.networks.0 {
            let body = decl.as_ref();
            if name == SHARED_NETWORK || body.map(|b| b.external).unwrap_or(false) {
                continue;
            }
            if self.resource_exists("network", name).await {
                continue;
            }
            let driver = body
                .and_then(|b| b.driver.clone())
                .unwrap_or_else(|| "bridge".to_string());
            let empty = IndexMap::new();
            let opts = body.map(|b| &b.driver_opts).unwrap_or(&empty);
            out.info(&format!("Creating network: {name} with driver: {driver}"))
                .await;
            self.create_resource("network", name, &driver, opts, out)
                .await?;
        }

        for (name, decl) in &doc.volumes.0 {
            let body = decl.as_ref();
            if body.map(|b| b.external).unwrap_or(false) {
                continue;
            }
            if self.resource_exists("volume", name).await {
                continue;
            }
            let driver = body
                .and_then(|b| b.driver.clone())
                .unwrap_or_else(|| "local".to_string());
            let empty = IndexMap::new();
            let opts = body.map(|b| &b.driver_opts).unwrap_or(&empty);
            out.info(&format!("Creating volume: {name} with driver: {driver}"))
                .await;
            self.create_resource("volume", name, &driver, opts, out)
                .await?;
        }
        Ok(())
    }

    /// Run one compose verb against a stack, the expanded effective
    /// document piped through stdin. The up-path provisions secrets,
    /// networks and volumes first.
    #[tracing::instrument(name = "Run stack action.", skip(self, out))]
    pub async fn run_action(
        &self,
        stack: &str,
        action: StackAction,
        out: &OutputStream,
    ) -> Result<(), AppError> {
        let doc = self.effective_document(stack).await?;

        if action == StackAction::Up {
            {
                let mut store = self.lock_store()?;
                secrets::ensure_secrets_exist(&doc, &mut store)?;
            }
            self.ensure_prerequisites(&doc, out).await?;
        }

        let (yaml, envs) = match self.prepare_for_execution(doc) {
            Ok(prepared) => prepared,
            Err(err) => {
                out.error(&err.to_string()).await;
                return Err(err);
            }
        };

        let mut args: Vec<String> = ["compose", "-f", "-", "-p", stack]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(action.compose_args());
        stream_command(out, "docker", &args, Some(yaml), &envs).await
    }

    /// Tear the stack down, then remove its files. Deletion failures are
    /// warned about and do not fail the operation.
    #[tracing::instrument(name = "Delete stack.", skip(self, out))]
    pub async fn delete_stack(&self, stack: &str, out: &OutputStream) -> Result<(), AppError> {
        self.run_action(stack, StackAction::Down, out).await?;

        for path in [
            self.settings.source_path(stack),
            self.settings.effective_path(stack),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => out.info(&format!("Deleted {}", path.display())).await,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    out.warn(&format!("Could not delete {}: {}", path.display(), err))
                        .await
                }
            }
        }
        Ok(())
    }

    /// Merge live compose-labelled containers with the stack files on
    /// disk. A docker daemon that cannot be reached degrades to the
    /// filesystem view.
    pub async fn list_stacks(&self) -> Result<Vec<StackSummary>, AppError> {
        let mut merged: IndexMap<String, Vec<ContainerBrief>> = IndexMap::new();

        let args: Vec<String> = ["ps", "-a", "--format", "{{json .}}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match capture_command("docker", &args).await {
            Ok(output) if output.success => {
                for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
                    let entry: PsEntry = match serde_json::from_str(line) {
                        Ok(entry) => entry,
                        Err(err) => {
                            tracing::warn!("Unparseable docker ps line: {}", err);
                            continue;
                        }
                    };
                    let Some(project) = entry.project() else { continue };
                    merged.entry(project.to_string()).or_default().push(ContainerBrief {
                        name: entry.names.clone(),
                        state: entry.state.clone(),
                        image: entry.image.clone(),
                    });
                }
            }
            Ok(output) => {
                tracing::warn!("docker ps failed: {}", output.stderr.trim());
            }
            Err(err) => {
                tracing::warn!("docker ps unavailable: {}", err);
            }
        }

        let entries = fs::read_dir(&self.settings.stacks_dir)
            .map_err(|e| AppError::fs(format!("read {}", self.settings.stacks_dir.display()), e))?;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            if !name.ends_with(".yml") || name.ends_with(".effective.yml") {
                continue;
            }
            let stack = name.trim_end_matches(".yml").to_string();
            merged.entry(stack).or_default();
        }

        let mut stacks: Vec<StackSummary> = merged
            .into_iter()
            .map(|(name, containers)| StackSummary { name, containers })
            .collect();
        stacks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stacks)
    }

    pub fn has_files(&self, stack: &str) -> bool {
        self.settings.source_path(stack).exists() || self.settings.effective_path(stack).exists()
    }

    pub async fn has_live_containers(&self, stack: &str) -> bool {
        reconstruct::project_container_ids(stack)
            .await
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    pub async fn stack_known(&self, stack: &str) -> bool {
        self.has_files(stack) || self.has_live_containers(stack).await
    }

    /// The YAML a read returns: the source file verbatim when present,
    /// else a reconstruction from live containers. A broken symlink at
    /// the source path is replaced by the reconstructed body.
    pub async fn stack_yaml(&self, stack: &str) -> Result<String, AppError> {
        let path = self.settings.source_path(stack);
        match fs::read_to_string(&path) {
            Ok(raw) => return Ok(raw),
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                return Err(AppError::fs(format!("read {}", path.display()), err));
            }
            Err(_) => {}
        }

        let ids = reconstruct::project_container_ids(stack)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("Container lookup for '{}' failed: {}", stack, err);
                Vec::new()
            });
        if ids.is_empty() {
            return Err(AppError::NotFound(stack.to_string()));
        }
        let containers = reconstruct::inspect_containers(&ids).await?;
        let rendered = {
            let mut store = self.lock_store()?;
            let doc = reconstruct::document_from_inspect(stack, &containers, &mut store)?;
            reconstruct::render_with_header(&doc, stack)?
        };

        // only ever overwrite a dangling link, never a regular file
        if path.symlink_metadata().is_ok() && fs::metadata(&path).is_err() {
            tracing::warn!(
                "Source of '{}' is a broken symlink; replacing {} with the reconstructed document",
                stack,
                path.display()
            );
            let _ = fs::remove_file(&path);
            if let Err(err) = fs::write(&path, &rendered) {
                tracing::warn!("Could not repair {}: {}", path.display(), err);
            }
        }

        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ps_entries_expose_their_project() {
        let line = r#"{"Names":"blog-web-1","State":"running","Image":"nginx","Labels":"com.docker.compose.project=blog,com.docker.compose.service=web"}"#;
        let entry: PsEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.project(), Some("blog"));

        let unlabelled = r#"{"Names":"adhoc","State":"running","Image":"alpine","Labels":""}"#;
        let entry: PsEntry = serde_json::from_str(unlabelled).unwrap();
        assert_eq!(entry.project(), None);
    }

    #[test]
    fn actions_map_to_compose_verbs() {
        assert_eq!(StackAction::Up.compose_args(), vec!["up", "-d", "--wait"]);
        assert_eq!(StackAction::Down.compose_args(), vec!["down"]);
        assert_eq!(StackAction::Logs.compose_args(), vec!["logs"]);
    }
}
