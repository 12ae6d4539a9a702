//! Result type alias for p21-extract

use super::errors::ExtractError;

/// Result type alias for crate operations
///
/// # Examples
///
/// ```
/// use p21_extract::domain::result::Result;
/// use p21_extract::domain::errors::ExtractError;
///
/// fn failing_function() -> Result<()> {
///     Err(ExtractError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ExtractError>;
