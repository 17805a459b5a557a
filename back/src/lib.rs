pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod v1;
pub mod validation;

use axum::{middleware, response::Redirect, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{session::SessionRegistry, storage::Backend};

/// Where the lists index is served.
pub const LISTS_PATH: &str = "/api/v1/lists";

#[derive(Clone, Debug)]
pub struct AppState<B> {
    pub backend: B,
    pub sessions: SessionRegistry,
}

impl<B: Backend> AppState<B> {
    pub fn new(backend: B, sessions: SessionRegistry) -> Self {
        Self { backend, sessions }
    }
}

pub fn app<B: Backend>(backend: B, sessions: SessionRegistry) -> Router {
    let state = AppState::new(backend, sessions);

    let api = v1::router().layer(middleware::from_fn_with_state(
        state.sessions.clone(),
        session::attach,
    ));

    Router::new()
        .route("/", get(|| async { Redirect::to(LISTS_PATH) }))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
