pub mod api;
pub mod config;
pub mod error;
pub mod forecast;
pub mod history;
pub mod state;
