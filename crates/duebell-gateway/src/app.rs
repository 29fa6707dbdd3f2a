use axum::{
    routing::{get, post},
    Router,
};
use duebell_channels::{ChannelStateMachine, SqliteSessionStore};
use duebell_core::DuebellConfig;
use duebell_scheduler::ReminderScheduler;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub type SessionMachine = ChannelStateMachine<SqliteSessionStore>;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: DuebellConfig,
    /// WhatsApp session; also held by the dispatcher as its readiness probe.
    pub session: Arc<SessionMachine>,
    pub scheduler: ReminderScheduler,
}

impl AppState {
    pub fn new(
        config: DuebellConfig,
        session: Arc<SessionMachine>,
        scheduler: ReminderScheduler,
    ) -> Self {
        Self {
            config,
            session,
            scheduler,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/whatsapp/status", get(crate::http::whatsapp::status_handler))
        .route("/whatsapp/events", post(crate::http::whatsapp::events_handler))
        .route(
            "/contracts/created",
            post(crate::http::contracts::created_handler),
        )
        .route(
            "/contracts/due-date",
            post(crate::http::contracts::due_date_handler),
        )
        .route(
            "/contracts/cancelled",
            post(crate::http::contracts::cancelled_handler),
        )
        .route(
            "/contracts/next-cycle",
            post(crate::http::contracts::next_cycle_handler),
        )
        .route(
            "/contracts/reminders",
            get(crate::http::contracts::reminders_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
