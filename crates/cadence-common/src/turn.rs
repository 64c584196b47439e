//! Conversation-history entries.

use serde::{Deserialize, Serialize};

/// One message in a session's turn history.
///
/// Roles are free-form (`"student"`, `"coach"`, ...). Content is not
/// validated when recorded; the controller's self-check reports entries
/// with an empty role or content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Check that both role and content are non-empty.
    pub fn is_well_formed(&self) -> bool {
        !self.role.trim().is_empty() && !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(Turn::new("student", "hi there").is_well_formed());
        assert!(!Turn::new("", "hi").is_well_formed());
        assert!(!Turn::new("coach", "   ").is_well_formed());
    }
}
