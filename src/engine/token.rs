//! Execution Tokens
//!
//! Opaque markers that travel through a running workplan. The main token
//! represents the primary control-flow thread of a process: only its arrival
//! at an exit place (or any token's arrival at a failure place) ends the
//! run. Branch tokens mark parallel side paths minted by split steps.

use serde::{Deserialize, Serialize};

/// An execution-progress marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    /// The primary control-flow thread of the process.
    Main,

    /// A parallel-branch marker, named after the split that minted it.
    Branch {
        /// Branch name, e.g. `"split-2:1"`
        name: String,
    },
}

impl Token {
    /// Creates a branch token with the given name.
    pub fn branch(name: impl Into<String>) -> Self {
        Self::Branch { name: name.into() }
    }

    /// Returns true for the main token.
    pub fn is_main(&self) -> bool {
        matches!(self, Self::Main)
    }

    /// The token's display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Main => "Main",
            Self::Branch { name } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_token() {
        assert!(Token::Main.is_main());
        assert_eq!(Token::Main.name(), "Main");
    }

    #[test]
    fn test_branch_token() {
        let token = Token::branch("split-3:1");
        assert!(!token.is_main());
        assert_eq!(token.name(), "split-3:1");
    }

    #[test]
    fn test_token_serialization_roundtrip() {
        let tokens = vec![Token::Main, Token::branch("split-3:1")];
        let json = serde_json::to_string(&tokens).unwrap();
        let loaded: Vec<Token> = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, tokens);
    }
}
