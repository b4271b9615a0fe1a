//! Utility functions for the document store implementations.

use crate::errors::DocumentStoreError;

/// Validate a document id and index name before addressing the store.
///
/// Both must be non-blank. Index names must also follow the backend naming
/// rules: lowercase, and none of the characters OpenSearch rejects.
///
/// # Example
///
/// ```
/// use cdc_indexer_repository::validate_address;
///
/// assert!(validate_address("42", "posts").is_ok());
/// assert!(validate_address("", "posts").is_err());
/// assert!(validate_address("42", "Posts").is_err());
/// ```
pub fn validate_address(id: &str, index_name: &str) -> Result<(), DocumentStoreError> {
    if id.trim().is_empty() {
        return Err(DocumentStoreError::validation("Document id is required"));
    }

    validate_index_name(index_name)
}

/// Validate an index name against the backend naming rules.
///
/// ```
/// use cdc_indexer_repository::validate_index_name;
///
/// assert!(validate_index_name("posts_v2").is_ok());
/// assert!(validate_index_name("Posts").is_err());
/// ```
pub fn validate_index_name(index_name: &str) -> Result<(), DocumentStoreError> {
    if index_name.trim().is_empty() {
        return Err(DocumentStoreError::validation("Index name is required"));
    }

    if index_name.chars().any(|c| c.is_uppercase()) {
        return Err(DocumentStoreError::validation(format!(
            "Index name '{}' must be lowercase",
            index_name
        )));
    }

    if let Some(c) = index_name
        .chars()
        .find(|c| matches!(c, ' ' | '"' | '*' | '\\' | '<' | '|' | ',' | '>' | '/' | '?' | '#'))
    {
        return Err(DocumentStoreError::validation(format!(
            "Index name '{}' contains invalid character '{}'",
            index_name, c
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("1", "posts").is_ok());
        assert!(validate_address("post-1", "posts_v2").is_ok());
    }

    #[test]
    fn test_validate_address_blank_id() {
        let result = validate_address("  ", "posts");
        assert!(matches!(
            result.unwrap_err(),
            DocumentStoreError::ValidationError(_)
        ));
    }

    #[test]
    fn test_validate_address_blank_index() {
        let result = validate_address("1", "");
        assert!(matches!(
            result.unwrap_err(),
            DocumentStoreError::ValidationError(_)
        ));
    }

    #[test]
    fn test_validate_address_invalid_index_characters() {
        for index in ["Posts", "po sts", "posts/1", "posts?", "posts#a", "a,b", "po*"] {
            assert!(
                validate_address("1", index).is_err(),
                "Expected error for index '{}'",
                index
            );
        }
    }

    #[test]
    fn test_validate_index_name() {
        assert!(validate_index_name("posts").is_ok());
        assert!(validate_index_name("Posts").is_err());
        assert!(validate_index_name(" ").is_err());
    }
}
