pub mod bridge;
pub mod config;
pub mod discovery;
pub mod ef;
pub mod error;
pub mod handlers;
pub mod models;
pub mod panel;
pub mod prompt;
pub mod store;
pub mod terminal;
pub mod websocket;
