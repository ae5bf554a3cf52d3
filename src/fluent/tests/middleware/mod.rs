//! Pipeline stage tests for FluentRouter
//!
//! Tests are organized by stage in separate modules.
//! The `interactions` module tests stages working together.

mod catch_panic;
mod content_blocks;
mod crawler;
mod interactions;
mod locale;
mod request_id;
mod request_parsing;
mod sessions;
mod static_files;
