//! Conduit - articles, comments and favorites for a social publishing API
//!
//! This library provides the article subsystem: storage, business rules and
//! the HTTP layer on top of them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
