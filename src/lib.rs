//! Terminal dashboard for association dues, payments and expenses.

pub mod api;
pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod event;
pub mod hooks;
pub mod ui;
