//! Filtering of identities that must not count in statistics

use std::collections::HashSet;

/// Real students sign in with `first.last` names; everything else comes
/// from upstream platforms as opaque hashes. Short names without a dot
/// are test or artefact accounts.
pub const DEFAULT_MIN_HASH_LEN: usize = 28;

/// Decides which student identities to drop from aggregated statistics:
/// configured staff names, plus artefact accounts matched by shape.
#[derive(Debug, Clone)]
pub struct StudentFilter {
    staff: HashSet<String>,
    min_hash_len: usize,
}

impl StudentFilter {
    pub fn new(staff: impl IntoIterator<Item = String>, min_hash_len: usize) -> Self {
        Self {
            staff: staff.into_iter().collect(),
            min_hash_len,
        }
    }

    pub fn with_staff(staff: impl IntoIterator<Item = String>) -> Self {
        Self::new(staff, DEFAULT_MIN_HASH_LEN)
    }

    /// Artefact accounts: no dot in the name and shorter than a real hash
    pub fn is_artefact(&self, student: &str) -> bool {
        if student.contains('.') {
            return false;
        }
        student.len() < self.min_hash_len
    }

    /// Whether this identity is excluded from statistics
    pub fn ignores(&self, student: &str) -> bool {
        self.staff.contains(student) || self.is_artefact(student)
    }
}

impl Default for StudentFilter {
    fn default() -> Self {
        Self::new([], DEFAULT_MIN_HASH_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_names_are_real() {
        let filter = StudentFilter::default();
        assert!(!filter.ignores("jane.doe"));
        assert!(!filter.ignores("a.b"));
    }

    #[test]
    fn test_short_hashes_are_artefacts() {
        let filter = StudentFilter::default();
        assert!(filter.ignores("student"));
        assert!(filter.ignores("testuser42"));
        // a typical 32-char platform hash is long enough to be real
        assert!(!filter.ignores("9f8e7d6c5b4a39281706f5e4d3c2b1a0"));
    }

    #[test]
    fn test_staff_always_ignored() {
        let filter = StudentFilter::with_staff(["jane.doe".to_string()]);
        assert!(filter.ignores("jane.doe"));
        assert!(!filter.ignores("john.doe"));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let filter = StudentFilter::new([], 4);
        assert!(filter.ignores("abc"));
        assert!(!filter.ignores("abcd"));
    }
}
