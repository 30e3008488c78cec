//! HTTP request handlers.

pub mod jobs;
