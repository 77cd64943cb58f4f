use std::sync::Mutex;

use actix_web::{web, HttpResponse};

use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::Executor;
use crate::routes::stack::validate_stack_name;

/// Return the stack's source document, reconstructing it from live
/// containers when the file is gone.
#[tracing::instrument(name = "Read stack.", skip(settings, store))]
pub async fn get(
    path: web::Path<String>,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    let name = validate_stack_name(&path.into_inner())?;
    let executor = Executor::new(settings.into_inner(), store.into_inner());
    let yaml = executor.stack_yaml(&name).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(yaml))
}
