//! Request handlers for sync endpoints.

use crate::config::ServerConfig;
use crate::engine::SyncEngine;
use crate::error::{ServerError, ServerResult};
use crate::planner::ResyncPlanner;
use lexisync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use lexisync_store::Store;
use std::sync::Arc;

/// Context for request handling.
pub struct HandlerContext {
    /// Shared store.
    pub store: Arc<Store>,
    /// Push side.
    pub engine: SyncEngine,
    /// Pull side.
    pub planner: ResyncPlanner,
}

impl HandlerContext {
    /// Creates a context with the default engine wiring.
    pub fn new(store: Arc<Store>, config: ServerConfig) -> Self {
        Self::with_engine(SyncEngine::new(Arc::clone(&store), config), store)
    }

    /// Creates a context around a configured engine. The planner shares the
    /// engine's appliers and catch-up window.
    pub fn with_engine(engine: SyncEngine, store: Arc<Store>) -> Self {
        let planner = ResyncPlanner::new(
            Arc::clone(&store),
            Arc::clone(engine.appliers()),
            engine.config().catch_up_window,
        );
        Self {
            store,
            engine,
            planner,
        }
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a push request.
    ///
    /// Sync failures are reported in the response. Only malformed requests
    /// are returned as errors.
    pub fn handle_push(&self, request: &PushRequest) -> ServerResult<PushResponse> {
        match self.context.engine.push(request) {
            Ok(version) => Ok(PushResponse::success(version)),
            Err(e @ ServerError::InvalidRequest(_)) => Err(e),
            Err(e) => Ok(PushResponse::failed(e.kind(), e.code(), e.to_string())),
        }
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: &PullRequest) -> ServerResult<PullResponse> {
        if request.user_id.is_empty() {
            return Err(ServerError::InvalidRequest("userId is required".into()));
        }
        Ok(self
            .context
            .planner
            .pull(&request.user_id, request.from_version))
    }
}
