//! Memoization of rendered messages.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::html::{RenderFlags, RenderOptions};

/// Identifies one rendering of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub message_id: u64,
    pub flags: RenderFlags,
    /// Disabled tags, lowercased, sorted and comma separated. Empty for an unrestricted render.
    pub context: String,
}

impl CacheKey {
    pub fn new(message_id: u64, flags: RenderFlags) -> Self {
        Self {
            message_id,
            flags,
            context: String::new(),
        }
    }

    /// The key for a render with `options`, or `None` if such a render must not be cached.
    pub fn for_options(options: &RenderOptions) -> Option<Self> {
        if options.flags.contains(RenderFlags::PREVIEW) {
            return None;
        }

        let mut disabled: Vec<String> = options
            .disabled_tags
            .iter()
            .map(|x| x.to_ascii_lowercase())
            .collect();
        disabled.sort();
        disabled.dedup();

        Some(Self {
            message_id: options.message_id?,
            flags: options.flags,
            context: disabled.join(","),
        })
    }
}

/// A thread-safe map from [`CacheKey`] to rendered HTML.
///
/// The cache only ever saves work: a missing entry is rendered again, so a poisoned lock is simply taken over.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: Mutex<HashMap<CacheKey, Arc<str>>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<str>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        let hit = self.entries().get(key).cloned();
        if hit.is_some() {
            log::trace!("render cache hit for message {}", key.message_id);
        }
        hit
    }

    pub fn insert(&self, key: CacheKey, html: impl Into<Arc<str>>) -> Arc<str> {
        let html = html.into();
        self.entries().insert(key, Arc::clone(&html));
        html
    }

    /// Drop every rendering of `message_id`. Call this when the message is edited.
    pub fn invalidate(&self, message_id: u64) {
        self.entries().retain(|key, _| key.message_id != message_id);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_invalidate() {
        let cache = RenderCache::new();
        let key = CacheKey::new(1, RenderFlags::default());
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), "<b>x</b>");
        cache.insert(CacheKey::new(1, RenderFlags::empty()), "x");
        cache.insert(CacheKey::new(2, RenderFlags::default()), "y");
        assert_eq!(cache.get(&key).as_deref(), Some("<b>x</b>"));
        assert_eq!(cache.len(), 3);

        cache.invalidate(1);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_for_options() {
        assert_eq!(CacheKey::for_options(&RenderOptions::default()), None);
        assert_eq!(
            CacheKey::for_options(&RenderOptions::message(3)),
            Some(CacheKey::new(3, RenderFlags::default()))
        );

        let preview = RenderOptions {
            message_id: Some(3),
            ..RenderOptions::default().with_flags(RenderFlags::PREVIEW)
        };
        assert_eq!(CacheKey::for_options(&preview), None);

        let restricted = RenderOptions {
            disabled_tags: vec!["Size".to_owned(), "footnote".to_owned()],
            ..RenderOptions::message(3)
        };
        let key = CacheKey::for_options(&restricted).unwrap();
        assert_eq!(key.context, "footnote,size");
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let cache = std::sync::Arc::new(RenderCache::new());
        let poisoner = std::sync::Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock();
            panic!("poison the lock");
        })
        .join();

        cache.insert(CacheKey::new(1, RenderFlags::default()), "x");
        assert_eq!(cache.len(), 1);
    }
}
