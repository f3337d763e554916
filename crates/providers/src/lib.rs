//! Reasoning service implementations for Loopwright.
//!
//! All providers implement the `loopwright_core::Provider` trait.
//! [`build_from_config`] selects and wraps the configured one.

pub mod builder;
pub mod openai_compat;
pub mod retry;

pub use builder::build_from_config;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
