use std::sync::Mutex;

use actix_web::{web, HttpResponse};

use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::{Executor, OutputStream};
use crate::routes::stack::{stream_response, validate_stack_name};

/// Tear the stack down and remove its files, streaming the whole
/// operation.
#[tracing::instrument(name = "Delete stack.", skip(settings, store))]
pub async fn delete(
    path: web::Path<String>,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    let name = validate_stack_name(&path.into_inner())?;
    let executor = Executor::new(settings.into_inner(), store.into_inner());
    if !executor.stack_known(&name).await {
        return Err(AppError::NotFound(name));
    }

    let (out, rx) = OutputStream::channel(64);
    actix_web::rt::spawn(async move {
        if let Err(err) = executor.delete_stack(&name, &out).await {
            tracing::warn!("Delete of '{}' failed: {}", name, err);
        }
    });
    Ok(stream_response(rx))
}
