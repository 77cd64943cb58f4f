use std::sync::Mutex;

use actix_web::{web, HttpResponse};

use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::{Executor, OutputStream, StackAction};
use crate::routes::stack::{stream_response, validate_stack_name};

#[tracing::instrument(name = "Stack logs.", skip(settings, store))]
pub async fn logs(
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
        if let Err(err) = executor.run_action(&name, StackAction::Logs, &out).await {
            tracing::warn!("Logs for '{}' failed: {}", name, err);
        }
    });
    Ok(stream_response(rx))
}
