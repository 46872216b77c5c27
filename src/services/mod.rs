//! Service layer: validation, authorization, planning, and storage composed
//! behind one call surface.

pub mod prompt;

pub use prompt::PromptService;
