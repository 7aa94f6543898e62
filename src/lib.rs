pub mod app;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod editor;
pub mod logging;
pub mod models;
pub mod state;
pub mod toast;
pub mod ui;
