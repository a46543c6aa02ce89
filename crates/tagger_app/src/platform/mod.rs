mod app;
mod config;
mod logging;
mod persistence;
mod prompt;
mod replay;

pub use app::run_app;
