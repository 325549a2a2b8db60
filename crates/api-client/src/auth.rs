//! Bearer-token session storage.
//!
//! Any 401 from the backend clears the stored token through this trait, so
//! every consumer of the same store sees the session end at once.

use std::sync::{PoisonError, RwLock};

/// Storage for the admin session's bearer token.
pub trait TokenStore: Send + Sync {
    fn load_token(&self) -> Option<String>;
    fn persist_token(&self, token: &str);
    fn clear_token(&self);
}

/// In-memory token store, one per process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist_token(&self, token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Shallow shape check for a JWT (three dot-separated parts).
#[must_use]
pub fn looks_like_jwt(token: &str) -> bool {
    let mut parts = token.split('.');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some(a), Some(b), Some(c), None) if !a.is_empty() && !b.is_empty() && !c.is_empty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip_and_clear() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load_token(), None);

        store.persist_token("abc.def.ghi");
        assert_eq!(store.load_token().as_deref(), Some("abc.def.ghi"));

        store.clear_token();
        assert_eq!(store.load_token(), None);
    }

    #[test]
    fn jwt_shape_check() {
        assert!(looks_like_jwt("header.payload.signature"));
        assert!(!looks_like_jwt("not-a-jwt"));
        assert!(!looks_like_jwt("one.two"));
        assert!(!looks_like_jwt("one.two.three.four"));
        assert!(!looks_like_jwt("..signature"));
    }
}
