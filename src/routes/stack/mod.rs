pub mod action;
pub mod delete;
pub mod enrich;
pub mod get;
pub mod list;
pub mod logs;
pub mod put;

pub use action::*;
pub use delete::*;
pub use enrich::*;
pub use get::*;
pub use list::*;
pub use logs::*;
pub use put::*;

use actix_web::web;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::errors::AppError;

/// Stack names become project names, file names and subprocess arguments;
/// anything beyond a conservative charset is rejected up front.
pub(crate) fn validate_stack_name(name: &str) -> Result<String, AppError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false)
        && !name.ends_with(".effective");
    if !valid {
        return Err(AppError::InputInvalid(format!("invalid stack name '{name}'")));
    }
    Ok(name.to_string())
}

/// Chunked plain-text response fed by a tagged line channel. Headers are
/// committed before the first command launches; every received line is
/// one chunk, which actix flushes individually.
pub(crate) fn stream_response(rx: mpsc::Receiver<String>) -> actix_web::HttpResponse {
    let body = ReceiverStream::new(rx)
        .map(|line| Ok::<_, actix_web::Error>(web::Bytes::from(line)));
    actix_web::HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(("X-Content-Type-Options", "nosniff"))
        .streaming(body)
}
