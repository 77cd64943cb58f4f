use indexmap::IndexMap;
use serde::Deserialize;

use crate::compose::dctypes::{
    Command, ComposeFile, Environment, Labels, Service, ServiceNetworks, SingleValue,
};
use crate::compose::pipeline::{defaults, proxy, sanitize};
use crate::compose::to_yaml;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::command::capture_command;

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
const DROPPED_ENV: [&str; 3] = ["PATH", "HOSTNAME", "HOME"];
const DROPPED_LABEL_PREFIXES: [&str; 3] = [
    "com.docker.compose.",
    "org.opencontainers.image",
    "traefik",
];

/// The slice of `docker inspect` output the reconstruction reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDetails {
    pub name: String,
    pub config: ContainerConfig,
    #[serde(default)]
    pub host_config: HostConfig,
    #[serde(default)]
    pub mounts: Vec<MountPoint>,
    #[serde(default)]
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    pub image: String,
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default)]
    pub restart_policy: RestartPolicy,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountPoint {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkSettings {
    #[serde(default)]
    pub ports: IndexMap<String, Option<Vec<PortBinding>>>,
    #[serde(default)]
    pub networks: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    #[serde(default)]
    pub host_ip: String,
    #[serde(default)]
    pub host_port: String,
}

fn service_name(project: &str, details: &ContainerDetails) -> String {
    if let Some(name) = details.config.labels.get(COMPOSE_SERVICE_LABEL) {
        return name.clone();
    }
    let container = details.name.trim_start_matches('/');
    tracing::warn!(
        "Container '{}' carries no compose service label; deriving a service name",
        container
    );
    let stripped = container
        .strip_prefix(&format!("{project}-"))
        .or_else(|| container.strip_prefix(&format!("{project}_")))
        .unwrap_or(container);
    if stripped.is_empty() {
        defaults::default_name_from_image(&details.config.image)
    } else {
        stripped.to_string()
    }
}

fn service_from_container(details: &ContainerDetails) -> Service {
    let mut svc = Service {
        image: Some(details.config.image.clone()),
        container_name: Some(details.name.trim_start_matches('/').to_string()),
        ..Default::default()
    };

    if let Some(cmd) = &details.config.cmd {
        if !cmd.is_empty() {
            svc.command = Some(Command::Args(cmd.clone()));
        }
    }

    let env: Vec<String> = details
        .config
        .env
        .iter()
        .filter(|entry| {
            let key = entry.split('=').next().unwrap_or_default();
            !DROPPED_ENV.contains(&key)
        })
        .cloned()
        .collect();
    if !env.is_empty() {
        svc.environment = Environment::List(env);
    }

    let mut ports: Vec<SingleValue> = Vec::new();
    for (spec, bindings) in &details.network_settings.ports {
        let container_port = spec.split('/').next().unwrap_or_default();
        let Some(bindings) = bindings else { continue };
        for binding in bindings {
            if binding.host_port.is_empty() {
                continue;
            }
            let mapping = format!("{}:{}", binding.host_port, container_port);
            if !ports.iter().any(|p| p.to_string() == mapping) {
                ports.push(SingleValue::String(mapping));
            }
        }
    }
    svc.ports = ports;

    for mount in &details.mounts {
        match mount.kind.as_str() {
            "bind" => svc
                .volumes
                .push(format!("{}:{}", mount.source, mount.destination)),
            "volume" => {
                if let Some(name) = &mount.name {
                    svc.volumes.push(format!("{}:{}", name, mount.destination));
                }
            }
            _ => {}
        }
    }

    let networks: Vec<serde_yaml::Value> = details
        .network_settings
        .networks
        .keys()
        .map(|n| serde_yaml::Value::String(n.clone()))
        .collect();
    if !networks.is_empty() {
        svc.networks = ServiceNetworks::List(networks);
    }

    let restart = details.host_config.restart_policy.name.as_str();
    if !restart.is_empty() && restart != "unless-stopped" {
        svc.restart = Some(restart.to_string());
    }

    let labels: IndexMap<String, SingleValue> = details
        .config
        .labels
        .iter()
        .filter(|(key, _)| {
            !DROPPED_LABEL_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
        })
        .map(|(k, v)| (k.clone(), SingleValue::from(v.as_str())))
        .collect();
    if !labels.is_empty() {
        svc.labels = Labels::Map(labels);
    }

    svc
}

/// Build a compose document from the inspect output of a project's
/// containers, sensitive values sanitised through the store and proxy
/// labels re-derived.
pub fn document_from_inspect(
    project: &str,
    containers: &[ContainerDetails],
    store: &mut EnvStore,
) -> Result<ComposeFile, AppError> {
    let mut doc = ComposeFile::default();
    for details in containers {
        let name = service_name(project, details);
        if doc.services.0.contains_key(&name) {
            continue;
        }
        doc.services.0.insert(name, service_from_container(details));
    }
    sanitize::sanitize_passwords(&mut doc, store, true)?;
    proxy::apply_proxy_labels(&mut doc);
    Ok(doc)
}

/// IDs of the containers labelled as belonging to a compose project.
pub async fn project_container_ids(project: &str) -> Result<Vec<String>, AppError> {
    let args: Vec<String> = [
        "ps",
        "-a",
        "-q",
        "--filter",
        &format!("label={COMPOSE_PROJECT_LABEL}={project}"),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let output = capture_command("docker", &args).await?;
    if !output.success {
        return Err(AppError::SubprocessFailure {
            command: "docker ps".to_string(),
            code: output.exit_code,
        });
    }
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

pub async fn inspect_containers(ids: &[String]) -> Result<Vec<ContainerDetails>, AppError> {
    let mut args = vec!["inspect".to_string()];
    args.extend(ids.iter().cloned());
    let output = capture_command("docker", &args).await?;
    if !output.success {
        return Err(AppError::SubprocessFailure {
            command: "docker inspect".to_string(),
            code: output.exit_code,
        });
    }
    serde_json::from_str(&output.stdout)
        .map_err(|e| AppError::Internal(format!("docker inspect output: {e}")))
}

/// Serialise with the marker comment identifying the document as derived
/// from live containers rather than an authored source.
pub fn render_with_header(doc: &ComposeFile, project: &str) -> Result<String, AppError> {
    let body = to_yaml(doc)?;
    let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    Ok(format!(
        "# Stack '{project}' reconstructed from running containers at {stamp}.\n\
         # The original source file was missing; this document was derived via docker inspect.\n\
         # Review it before treating it as authoritative.\n\
         {body}"
    ))
}
