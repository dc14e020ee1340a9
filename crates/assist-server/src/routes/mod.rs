//! API route handlers

use axum::Router;

use crate::AppState;

mod chat;
mod tools;

/// Build the API router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/chat", chat::router())
        .nest("/tools", tools::router())
}
