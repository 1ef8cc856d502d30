//! Integration tests for the suspense-aware markup renderer

mod config_integration;
mod destroy;
mod streaming;
mod support;
