//! Pre-flight checks before model and embedding calls.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::error::Result;
use crate::openai::check_api_key;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions calls the chat and embedding APIs.
    Ask,
    /// Indexing and filtered search embed text.
    Embed,
    /// Listing the catalog only reads the index.
    Browse,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Ask | Operation::Embed => check_api_key()?,
        Operation::Browse => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browse_has_no_requirements() {
        assert!(check(Operation::Browse).is_ok());
    }
}
