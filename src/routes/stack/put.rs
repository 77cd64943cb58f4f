use std::fs;
use std::sync::Mutex;

use actix_web::{web, HttpResponse};
use serde_derive::Serialize;

use crate::compose::pipeline;
use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::routes::stack::validate_stack_name;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutResponse {
    success: bool,
    stack_name: String,
    message: String,
}

/// Write a stack: the body is sanitised into `<name>.yml` and enriched
/// into `<name>.effective.yml`; extracted passwords and generated secrets
/// land in the env store.
#[tracing::instrument(name = "Write stack.", skip(body, settings, store))]
pub async fn put(
    path: web::Path<String>,
    body: String,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    let name = validate_stack_name(&path.into_inner())?;

    let dual = {
        let mut store = store
            .lock()
            .map_err(|_| AppError::Internal("env store lock poisoned".to_string()))?;
        pipeline::process_put(&body, &settings, &mut store)?
    };

    let source_path = settings.source_path(&name);
    fs::write(&source_path, &dual.source_yaml)
        .map_err(|e| AppError::fs(format!("write {}", source_path.display()), e))?;
    let effective_path = settings.effective_path(&name);
    fs::write(&effective_path, &dual.effective_yaml)
        .map_err(|e| AppError::fs(format!("write {}", effective_path.display()), e))?;

    tracing::info!("Stack '{}' written to {}", name, source_path.display());
    Ok(HttpResponse::Ok().json(PutResponse {
        success: true,
        stack_name: name.clone(),
        message: format!("Stack '{name}' updated"),
    }))
}
