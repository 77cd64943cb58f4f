use crate::compose::dctypes::{ComposeFile, Logging, SingleValue};

const DEFAULT_MEM_LIMIT: &str = "256m";
const DEFAULT_CPUS: f64 = 0.5;
const DEFAULT_LOG_DRIVER: &str = "json-file";

/// A service without a `container_name` gets the service key.
pub fn default_container_names(doc: &mut ComposeFile) {
    for (name, svc) in doc.services.0.iter_mut() {
        let missing = svc
            .container_name
            .as_deref()
            .map(|n| n.trim().is_empty())
            .unwrap_or(true);
        if missing {
            svc.container_name = Some(name.clone());
        }
    }
}

/// Last path segment of an image reference, digest and tag stripped.
/// `ghcr.io/linuxserver/jellyfin:10.9@sha256:...` becomes `jellyfin`.
pub fn default_name_from_image(image: &str) -> String {
    let image = image.split('@').next().unwrap_or(image);
    let segment = image.rsplit('/').next().unwrap_or(image);
    segment.split(':').next().unwrap_or(segment).to_string()
}

pub fn default_resource_limits(doc: &mut ComposeFile) {
    for svc in doc.services.0.values_mut() {
        let mem_missing = match &svc.mem_limit {
            None => true,
            Some(v) => v.to_string().trim().is_empty(),
        };
        if mem_missing {
            svc.mem_limit = Some(SingleValue::from(DEFAULT_MEM_LIMIT));
        }

        let cpus_missing = match &svc.cpus {
            None => true,
            Some(SingleValue::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if cpus_missing {
            svc.cpus = Some(SingleValue::Float(DEFAULT_CPUS));
        }
    }
}

pub fn default_logging(doc: &mut ComposeFile) {
    for svc in doc.services.0.values_mut() {
        match &mut svc.logging {
            None => {
                let mut logging = Logging {
                    driver: Some(DEFAULT_LOG_DRIVER.to_string()),
                    options: Default::default(),
                };
                logging
                    .options
                    .insert("max-size".to_string(), SingleValue::from("10m"));
                logging
                    .options
                    .insert("max-file".to_string(), SingleValue::from("3"));
                svc.logging = Some(logging);
            }
            Some(logging) => {
                if logging.driver.as_deref() == Some(DEFAULT_LOG_DRIVER) {
                    if !logging.options.contains_key("max-size") {
                        logging
                            .options
                            .insert("max-size".to_string(), SingleValue::from("10m"));
                    }
                    if !logging.options.contains_key("max-file") {
                        logging
                            .options
                            .insert("max-file".to_string(), SingleValue::from("3"));
                    }
                }
            }
        }
    }
}
