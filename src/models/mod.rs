//! Data models for promptvault.
//!
//! This module contains the core document types and the outward DTO shape.

mod prompt;
mod tag;

pub use prompt::{
    OwnedDocument, ParameterKind, Prompt, PromptDto, PromptInput, PromptParameter,
    build_search_text,
};
pub use tag::{PromptTag, Tag};
