// src/api/http/mod.rs
// HTTP router composition for the REST API.

mod chat;
mod knowledge;
mod memories;
mod providers;
mod sessions;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat::chat_turn))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", get(sessions::get_session).delete(sessions::delete_session))
        .route("/sessions/{id}/messages/{mid}", delete(sessions::delete_message))
        .route("/sessions/{id}/summarize", post(sessions::summarize_session))
        .route("/memories/search", get(memories::search_memories))
        .route("/knowledge", get(knowledge::list_knowledge).post(knowledge::create_knowledge))
        .route(
            "/knowledge/{id}",
            get(knowledge::get_knowledge)
                .put(knowledge::update_knowledge)
                .delete(knowledge::delete_knowledge),
        )
        .route("/providers", post(providers::create_provider))
        .route("/models", post(providers::create_model))
}
