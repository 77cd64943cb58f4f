use std::sync::Mutex;

use actix_web::{web, HttpResponse};

use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::Executor;

/// All stacks the plane knows about: compose-labelled containers merged
/// with the stack files on disk.
#[tracing::instrument(name = "List stacks.", skip(settings, store))]
pub async fn list(
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    let executor = Executor::new(settings.into_inner(), store.into_inner());
    let stacks = executor.list_stacks().await?;
    Ok(HttpResponse::Ok().json(stacks))
}
