pub mod app;
pub mod auth;
pub mod config;
pub mod counter;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod models;
pub mod state;
pub mod storage;
pub mod ui;
pub mod validation;
pub mod zones;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_store;
