use std::sync::Mutex;

use actix_web::{web, HttpResponse};

use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::errors::AppError;
use crate::executor::{Executor, OutputStream, StackAction};
use crate::routes::stack::{stream_response, validate_stack_name};

async fn run_verb(
    name: String,
    action: StackAction,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    let name = validate_stack_name(&name)?;
    let executor = Executor::new(settings.into_inner(), store.into_inner());
    if !executor.stack_known(&name).await {
        return Err(AppError::NotFound(name));
    }

    let (out, rx) = OutputStream::channel(64);
    actix_web::rt::spawn(async move {
        if let Err(err) = executor.run_action(&name, action, &out).await {
            tracing::warn!("Action on '{}' failed: {}", name, err);
        }
    });
    Ok(stream_response(rx))
}

#[tracing::instrument(name = "Stack up.", skip(settings, store))]
pub async fn up(
    path: web::Path<String>,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    run_verb(path.into_inner(), StackAction::Up, settings, store).await
}

#[tracing::instrument(name = "Stack down.", skip(settings, store))]
pub async fn down(
    path: web::Path<String>,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    run_verb(path.into_inner(), StackAction::Down, settings, store).await
}

#[tracing::instrument(name = "Stack start.", skip(settings, store))]
pub async fn start(
    path: web::Path<String>,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    run_verb(path.into_inner(), StackAction::Start, settings, store).await
}

#[tracing::instrument(name = "Stack stop.", skip(settings, store))]
pub async fn stop(
    path: web::Path<String>,
    settings: web::Data<Settings>,
    store: web::Data<Mutex<EnvStore>>,
) -> Result<HttpResponse, AppError> {
    run_verb(path.into_inner(), StackAction::Stop, settings, store).await
}
