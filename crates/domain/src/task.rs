use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a task: a timestamp prefix plus a short random suffix,
/// monotonically sortable and filesystem-safe.
///
/// Format: `YYYYMMDD_HHMMSS_<8-char-uuid-prefix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a new task id from the current time.
    pub fn new() -> Self {
        let now = Utc::now();
        let suffix = uuid::Uuid::new_v4().to_string();
        Self(format!(
            "{}_{}",
            now.format("%Y%m%d_%H%M%S"),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A task id is filesystem-safe by construction; this still rejects any
    /// value that would escape its directory if one ever arrived from an
    /// external source (e.g. a resumed/replayed task id).
    pub fn is_filesystem_safe(s: &str) -> bool {
        !s.is_empty()
            && !s.contains('/')
            && !s.contains('\\')
            && s != "."
            && s != ".."
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_filesystem_safe_and_sortable_prefix() {
        let a = TaskId::new();
        assert!(TaskId::is_filesystem_safe(a.as_str()));
        assert!(a.as_str().len() > 15 + 1 + 8);
    }

    #[test]
    fn rejects_path_traversal_candidates() {
        assert!(!TaskId::is_filesystem_safe(".."));
        assert!(!TaskId::is_filesystem_safe("../etc"));
        assert!(!TaskId::is_filesystem_safe("a/b"));
    }

    #[test]
    fn two_generated_ids_differ() {
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
