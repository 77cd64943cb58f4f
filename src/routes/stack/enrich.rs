use std::sync::Mutex;

use actix_web::{web, HttpResponse};

use crate::compose::pipeline;
use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::routes::stack::validate_stack_name;

/// Preview what enrichment would produce for the posted document. No
/// files are written and the env store is left untouched.
#[tracing::instrument(name = "Enrich preview.", skip(body, settings, store))]
pub async fn enrich(
    path: web::Path<String>,
    body: String,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    validate_stack_name(&path.into_inner())?;
    let yaml = {
        let store = store
            .lock()
            .map_err(|_| AppError::Internal("env store lock poisoned".to_string()))?;
        pipeline::enrich_preview(&body, &settings, &store)?
    };
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(yaml))
}
