//! Prompt document model and DTO mapping.
//!
//! `Prompt` is the closed internal record stored by the document store.
//! `PromptDto` is the stable outward shape returned to callers; it is the same
//! regardless of whether tags are held relationally or inline internally.

use serde::{Deserialize, Serialize};

/// A document type that carries an owner identity.
///
/// The authorization guard compares a document's owner against the caller's
/// identity without knowing the concrete document type.
pub trait OwnedDocument {
    /// Returns the owner identifier, or `None` for global/shared records.
    fn owner_id(&self) -> Option<&str>;
}

/// The type of a prompt parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// A single string value.
    String,
    /// A list of string values.
    StringArray,
    /// A numeric value.
    Number,
    /// A boolean value.
    Boolean,
}

impl ParameterKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringArray => "string_array",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// A typed parameter declared by a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParameter {
    /// Parameter name.
    pub name: String,
    /// Value type.
    pub kind: ParameterKind,
    /// Whether the parameter must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl PromptParameter {
    /// Creates a new required parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
        }
    }

    /// Marks the parameter as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A stored prompt, owned by exactly one user.
///
/// `tags` is the denormalized tag-name array. Under the relational tag
/// strategy it is kept in sync with the join table by the tag synchronizer and
/// must always equal the sorted set of tag names reachable via surviving join
/// rows. `search_text` is derived from the content fields and recomputed on
/// every content-affecting write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Opaque unique id.
    pub id: String,
    /// Owner identifier; every query is scoped to it.
    pub owner_id: String,
    /// URL-safe identifier, unique within the owner's scope.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// The prompt body text.
    pub content: String,
    /// Declared parameters, if any.
    #[serde(default)]
    pub parameters: Vec<PromptParameter>,
    /// Denormalized tag names, sorted.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lowercased concatenation of slug+name+description+content.
    #[serde(default)]
    pub search_text: String,
    /// Pinned prompts sort before everything else in list views.
    #[serde(default)]
    pub pinned: bool,
    /// Favorited prompts receive a fixed score boost.
    #[serde(default)]
    pub favorited: bool,
    /// Monotonic usage counter.
    #[serde(default)]
    pub usage_count: u64,
    /// Last-used timestamp (ms epoch), if ever used.
    #[serde(default)]
    pub last_used_at: Option<u64>,
    /// Creation timestamp (ms epoch).
    #[serde(default)]
    pub created_at: u64,
    /// Last update timestamp (ms epoch).
    #[serde(default)]
    pub updated_at: u64,
}

impl Prompt {
    /// Returns true if the prompt has ever been used.
    ///
    /// List-mode ranking sorts used prompts before never-used ones.
    #[must_use]
    pub const fn has_been_used(&self) -> bool {
        self.usage_count > 0 || self.last_used_at.is_some()
    }

    /// Recomputes the derived search text from the content fields.
    pub fn refresh_search_text(&mut self) {
        self.search_text = build_search_text(&self.slug, &self.name, &self.description, &self.content);
    }

    /// Maps the internal record to the outward DTO shape.
    #[must_use]
    pub fn to_dto(&self) -> PromptDto {
        PromptDto {
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            parameters: if self.parameters.is_empty() {
                None
            } else {
                Some(self.parameters.clone())
            },
            pinned: self.pinned,
            favorited: self.favorited,
            usage_count: self.usage_count,
            last_used_at: self.last_used_at,
        }
    }
}

impl OwnedDocument for Prompt {
    fn owner_id(&self) -> Option<&str> {
        Some(&self.owner_id)
    }
}

/// Builds the derived search text for a prompt.
///
/// Lowercased, whitespace-trimmed concatenation of slug, name, description,
/// and body. The FTS index is built over this field.
#[must_use]
pub fn build_search_text(slug: &str, name: &str, description: &str, content: &str) -> String {
    [slug, name, description, content]
        .iter()
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Caller-supplied input for creating or updating a prompt.
///
/// Passed through the validator before any write; the validator returns a
/// normalized copy (trimmed fields, normalized de-duplicated tags).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptInput {
    /// URL-safe identifier.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// The prompt body text.
    pub content: String,
    /// Tag names to associate.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<PromptParameter>,
    /// Whether the prompt is pinned.
    #[serde(default)]
    pub pinned: bool,
    /// Whether the prompt is favorited.
    #[serde(default)]
    pub favorited: bool,
}

impl PromptInput {
    /// Creates a minimal input with slug, name, and content.
    #[must_use]
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the pinned flag.
    #[must_use]
    pub const fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Sets the favorited flag.
    #[must_use]
    pub const fn favorited(mut self, favorited: bool) -> Self {
        self.favorited = favorited;
        self
    }
}

/// The stable outward prompt shape.
///
/// Independent of the internal storage representation: tags are always a flat
/// array regardless of whether they are held relationally or inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDto {
    /// URL-safe identifier.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// The prompt body text.
    pub content: String,
    /// Tag names, sorted.
    pub tags: Vec<String>,
    /// Declared parameters, omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<PromptParameter>>,
    /// Whether the prompt is pinned.
    pub pinned: bool,
    /// Whether the prompt is favorited.
    pub favorited: bool,
    /// Monotonic usage counter.
    pub usage_count: u64,
    /// Last-used timestamp (ms epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<u64>,
}
