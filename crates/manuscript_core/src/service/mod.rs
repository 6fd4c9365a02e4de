//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, storage and tree calls into project-level APIs.
//! - Keep the CLI decoupled from persistence details.

pub mod project_service;
