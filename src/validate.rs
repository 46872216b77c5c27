//! Input validation for prompt and tag data.
//!
//! Runs fully before any write. The limits here are the single source of truth
//! for every call site; a batch insert validates every element first and
//! performs no partial writes.

use std::collections::HashSet;

use crate::models::PromptInput;
use crate::{Error, Result};

/// Maximum length of a prompt name.
pub const MAX_NAME_LEN: usize = 200;
/// Maximum length of a prompt description.
pub const MAX_DESCRIPTION_LEN: usize = 2_000;
/// Maximum length of a prompt body.
pub const MAX_CONTENT_LEN: usize = 100_000;
/// Maximum number of tags per prompt.
pub const MAX_TAGS_PER_PROMPT: usize = 50;
/// Maximum length of a slug.
pub const MAX_SLUG_LEN: usize = 200;
/// Maximum length of a tag name.
pub const MAX_TAG_LEN: usize = 64;

/// Validates a slug.
///
/// Valid slugs contain lowercase ASCII alphanumerics and internal dashes only,
/// with no leading or trailing dash. The colon is called out separately: it is
/// reserved as a future namespace separator.
///
/// Examples of valid slugs: `code-review`, `api-design-v2`, `sql`
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(Error::Validation(
            "slug cannot be empty; use a kebab-case identifier like 'code-review'".to_string(),
        ));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(Error::Validation(format!(
            "slug exceeds {MAX_SLUG_LEN} characters"
        )));
    }
    if slug.contains(':') {
        return Err(Error::Validation(format!(
            "invalid slug '{slug}': the colon is reserved as a namespace separator"
        )));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(Error::Validation(format!(
            "invalid slug '{slug}': dashes must be internal, not leading or trailing"
        )));
    }
    for ch in slug.chars() {
        if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() && ch != '-' {
            return Err(Error::Validation(format!(
                "invalid character '{ch}' in slug '{slug}': use lowercase letters, digits, \
                 and internal dashes only"
            )));
        }
    }
    Ok(())
}

/// Normalizes a tag name: trim, lowercase, charset and length check.
///
/// Returns the normalized name. Tag names use the same restricted charset as
/// slugs.
pub fn normalize_tag_name(raw: &str) -> Result<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::Validation("tag name cannot be empty".to_string()));
    }
    if name.len() > MAX_TAG_LEN {
        return Err(Error::Validation(format!(
            "tag '{name}' exceeds {MAX_TAG_LEN} characters"
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::Validation(format!(
            "invalid tag '{name}': dashes must be internal"
        )));
    }
    for ch in name.chars() {
        if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() && ch != '-' {
            return Err(Error::Validation(format!(
                "invalid character '{ch}' in tag '{name}': use lowercase letters, digits, \
                 and internal dashes only"
            )));
        }
    }
    Ok(name)
}

/// Validates and normalizes a prompt input.
///
/// Trims text fields, enforces the length limits, validates the slug, and
/// normalizes + de-duplicates tags (preserving first-seen order; the stored
/// denormalized array is sorted later by the synchronizer).
///
/// # Errors
///
/// Returns [`Error::Validation`] with a specific reason for the first problem
/// found.
pub fn validate_input(input: &PromptInput) -> Result<PromptInput> {
    validate_slug(&input.slug)?;

    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::Validation("name cannot be empty".to_string()));
    }
    // Free-text fields are bounded in characters, not bytes.
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }

    let description = input.description.trim().to_string();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(Error::Validation(format!(
            "description exceeds {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    let content = input.content.trim().to_string();
    if content.is_empty() {
        return Err(Error::Validation("content cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(Error::Validation(format!(
            "content exceeds {MAX_CONTENT_LEN} characters"
        )));
    }

    if input.tags.len() > MAX_TAGS_PER_PROMPT {
        return Err(Error::Validation(format!(
            "too many tags: {} (maximum {MAX_TAGS_PER_PROMPT})",
            input.tags.len()
        )));
    }
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for raw in &input.tags {
        let tag = normalize_tag_name(raw)?;
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }

    for param in &input.parameters {
        if param.name.trim().is_empty() {
            return Err(Error::Validation(
                "parameter name cannot be empty".to_string(),
            ));
        }
    }

    Ok(PromptInput {
        slug: input.slug.clone(),
        name,
        description,
        content,
        tags,
        parameters: input.parameters.clone(),
        pinned: input.pinned,
        favorited: input.favorited,
    })
}

/// Validates a whole batch and rejects intra-batch duplicate slugs.
///
/// Every element is validated before any result is returned, so a failure in
/// element k leaves no doubt that nothing was persisted.
///
/// # Errors
///
/// Returns [`Error::Validation`] for the first invalid element or
/// [`Error::Conflict`] for the first duplicated slug.
pub fn validate_batch(inputs: &[PromptInput]) -> Result<Vec<PromptInput>> {
    let mut normalized = Vec::with_capacity(inputs.len());
    let mut slugs = HashSet::new();
    for input in inputs {
        let valid = validate_input(input)?;
        if !slugs.insert(valid.slug.clone()) {
            return Err(Error::Conflict(format!(
                "duplicate slug '{}' within batch",
                valid.slug
            )));
        }
        normalized.push(valid);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use test_case::test_case;

    #[test_case("code-review"; "kebab case")]
    #[test_case("sql"; "single word")]
    #[test_case("api-design-v2"; "with digits")]
    #[test_case("a"; "single char")]
    fn test_validate_slug_valid(slug: &str) {
        assert!(validate_slug(slug).is_ok());
    }

    #[test_case(""; "empty")]
    #[test_case("-leading"; "leading dash")]
    #[test_case("trailing-"; "trailing dash")]
    #[test_case("With-Upper"; "uppercase")]
    #[test_case("under_score"; "underscore")]
    #[test_case("has space"; "space")]
    fn test_validate_slug_invalid(slug: &str) {
        assert!(validate_slug(slug).is_err());
    }

    #[test]
    fn test_validate_slug_uppercase_message() {
        let err = validate_slug("AI-Meta-Check").unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn test_validate_slug_colon_message() {
        let err = validate_slug("team:prompt").unwrap_err();
        assert!(err.to_string().contains("colon"));
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_validate_slug_too_long() {
        let slug = "a".repeat(MAX_SLUG_LEN + 1);
        assert!(validate_slug(&slug).is_err());
        let slug = "a".repeat(MAX_SLUG_LEN);
        assert!(validate_slug(&slug).is_ok());
    }

    #[test]
    fn test_normalize_tag_name() {
        assert_eq!(normalize_tag_name("  SQL  ").unwrap(), "sql");
        assert_eq!(normalize_tag_name("code-gen").unwrap(), "code-gen");
        assert!(normalize_tag_name("").is_err());
        assert!(normalize_tag_name("   ").is_err());
        assert!(normalize_tag_name("bad tag").is_err());
        assert!(normalize_tag_name(&"x".repeat(MAX_TAG_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_input_trims_and_normalizes() {
        let input = crate::models::PromptInput::new("my-slug", "  Name  ", "  body  ")
            .with_description("  desc  ")
            .with_tags(vec!["  SQL ".to_string(), "sql".to_string(), "db".to_string()]);

        let valid = validate_input(&input).unwrap();
        assert_eq!(valid.name, "Name");
        assert_eq!(valid.description, "desc");
        assert_eq!(valid.content, "body");
        // normalized and de-duplicated
        assert_eq!(valid.tags, vec!["sql", "db"]);
    }

    #[test]
    fn test_validate_input_empty_required_fields() {
        let input = crate::models::PromptInput::new("s", "   ", "body");
        assert!(validate_input(&input).is_err());

        let input = crate::models::PromptInput::new("s", "name", "   ");
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn test_validate_input_length_bounds() {
        let input =
            crate::models::PromptInput::new("s", "n".repeat(MAX_NAME_LEN + 1), "body");
        assert!(validate_input(&input).is_err());

        let input = crate::models::PromptInput::new("s", "n", "c".repeat(MAX_CONTENT_LEN + 1));
        assert!(validate_input(&input).is_err());

        let input = crate::models::PromptInput::new("s", "n", "body")
            .with_description("d".repeat(MAX_DESCRIPTION_LEN + 1));
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn test_length_limits_count_characters_not_bytes() {
        // 150 two-byte characters: 300 bytes but well under the 200-char cap.
        let input = crate::models::PromptInput::new("s", "é".repeat(150), "body")
            .with_description("ü".repeat(MAX_DESCRIPTION_LEN));
        assert!(validate_input(&input).is_ok());

        let input = crate::models::PromptInput::new("s", "é".repeat(MAX_NAME_LEN + 1), "body");
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn test_validate_input_too_many_tags() {
        let tags: Vec<String> = (0..=MAX_TAGS_PER_PROMPT).map(|i| format!("tag-{i}")).collect();
        let input = crate::models::PromptInput::new("s", "n", "body").with_tags(tags);
        let err = validate_input(&input).unwrap_err();
        assert!(err.to_string().contains("too many tags"));
    }

    #[test]
    fn test_validate_batch_duplicate_slug() {
        let inputs = vec![
            crate::models::PromptInput::new("same-slug", "A", "a"),
            crate::models::PromptInput::new("same-slug", "B", "b"),
        ];
        let err = validate_batch(&inputs).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.to_string().contains("same-slug"));
    }

    #[test]
    fn test_validate_batch_invalid_element_rejects_all() {
        let inputs = vec![
            crate::models::PromptInput::new("ok-slug", "A", "a"),
            crate::models::PromptInput::new("Bad Slug", "B", "b"),
        ];
        assert!(validate_batch(&inputs).is_err());
    }

    #[test]
    fn test_validate_batch_empty_is_ok() {
        assert!(validate_batch(&[]).unwrap().is_empty());
    }
}
