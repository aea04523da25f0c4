//! HTTP surface of the quote service: `GET /quote`.
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::core::{Deadline, Quote, QuoteError};
use crate::service::QuoteService;

pub const QUOTE_PATH: &str = "/quote";

/// A fetch failure rendered as a plain-text 500.
pub struct QuoteFailure(QuoteError);

impl From<QuoteError> for QuoteFailure {
    fn from(err: QuoteError) -> Self {
        QuoteFailure(err)
    }
}

impl IntoResponse for QuoteFailure {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to fetch quote: {}", self.0),
        )
            .into_response()
    }
}

async fn get_quote(State(service): State<QuoteService>) -> Result<Json<Quote>, QuoteFailure> {
    // Plain HTTP carries no caller deadline; the service's own ceilings apply.
    // A client hang-up drops this future, cancelling whatever stage is running.
    let quote = service.handle(Deadline::unbounded()).await?;
    Ok(Json(quote))
}

pub fn router(service: QuoteService) -> Router {
    Router::new()
        .route(QUOTE_PATH, get(get_quote))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serves requests on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: QuoteService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}
