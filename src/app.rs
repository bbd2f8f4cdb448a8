use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/count/increment", post(handlers::increment_form))
        .route("/count/decrement", post(handlers::decrement_form))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/verify", post(handlers::verify_email))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/password/forgot", post(handlers::forgot_password))
        .route("/api/auth/password/reset", post(handlers::reset_password))
        .route("/api/session", get(handlers::session_info))
        .route("/api/count", get(handlers::get_count).post(handlers::change_count))
        .route("/api/count/reset", post(handlers::reset_count))
        .route("/api/history", get(handlers::get_history))
        .route("/api/history/records", get(handlers::get_history_records))
        .route(
            "/api/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )
        .route(
            "/api/account",
            get(handlers::get_account)
                .put(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .with_state(state)
}
