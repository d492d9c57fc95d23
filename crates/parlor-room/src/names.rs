//! The directory of display names currently logged in.
//!
//! The hub refuses a login while the same name is active elsewhere on the
//! server; the connection driver releases a session's claim when the
//! session dies, wherever it happens to be at that moment.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::SessionId;

/// Cheap-to-clone registry mapping active display names to their owning
/// session.
#[derive(Clone, Default)]
pub struct NameDirectory {
    inner: Arc<Mutex<HashMap<String, SessionId>>>,
}

impl NameDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while some session holds `name`.
    pub fn is_claimed(&self, name: &str) -> bool {
        self.inner.lock().contains_key(name)
    }

    /// Claims `name` for `owner`. Fails if another session holds it;
    /// re-claiming one's own name succeeds.
    pub fn claim(&self, name: &str, owner: SessionId) -> bool {
        let mut names = self.inner.lock();
        match names.get(name) {
            Some(current) => *current == owner,
            None => {
                names.insert(name.to_owned(), owner);
                true
            }
        }
    }

    /// Releases every claim held by `owner`.
    pub fn release(&self, owner: SessionId) {
        self.inner.lock().retain(|_, holder| *holder != owner);
    }

    /// Number of active claims.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// `true` when nobody is logged in.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(id: u64) -> SessionId {
        SessionId::new(id)
    }

    #[test]
    fn test_claim_then_conflict() {
        let names = NameDirectory::new();
        assert!(names.claim("ada", sid(1)));
        assert!(names.is_claimed("ada"));
        assert!(!names.claim("ada", sid(2)), "second session refused");
        assert!(names.claim("ada", sid(1)), "re-claim by owner is fine");
    }

    #[test]
    fn test_release_frees_the_name() {
        let names = NameDirectory::new();
        names.claim("ada", sid(1));
        names.release(sid(1));
        assert!(!names.is_claimed("ada"));
        assert!(names.claim("ada", sid(2)));
    }

    #[test]
    fn test_release_touches_only_the_owner() {
        let names = NameDirectory::new();
        names.claim("ada", sid(1));
        names.claim("bob", sid(2));
        names.release(sid(1));
        assert!(!names.is_claimed("ada"));
        assert!(names.is_claimed("bob"));
        assert_eq!(names.len(), 1);
    }
}
