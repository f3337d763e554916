//! # Loopwright Core
//!
//! Domain types, traits, and error definitions for the Loopwright agent loop.
//! This crate has **no HTTP or runtime dependencies**. It defines the domain
//! model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two seams of the loop are traits defined here:
//! - [`Provider`]: the reasoning service that decides what to do next
//! - [`Action`]: a named, schema-described capability the service may request
//!
//! Everything else (transcripts, plans, revision contexts) is plain data.

pub mod action;
pub mod error;
pub mod event;
pub mod plan;
pub mod provider;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionDescriptor, ActionOutput, ActionRegistry};
pub use error::{ActionError, Error, PlanError, ProviderError, RegistryError, Result, TranscriptError};
pub use event::{DomainEvent, EventBus};
pub use plan::{Plan, PlanStep, Replan, RevisionContext};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use transcript::{ActionRequest, Role, Transcript, TranscriptId, Turn};
