use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

/// A deduplicated call-stack identity: one symbol at one source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Identity key. Two stack entries with the same key are the same frame.
    pub key: String,
    /// Display name (function, symbol, etc.).
    pub name: String,
    /// Source file or binary the symbol belongs to.
    pub file: Option<String>,
    /// Source line, when the format provides one.
    pub line: Option<u32>,
    /// Instruction address of the first occurrence.
    pub address: Option<u64>,
}

/// Attributes used to create a [`Frame`] the first time its key is seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub address: Option<u64>,
}

impl FrameInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Interns frames by key for the duration of a single import.
///
/// Frames are handed out as `Arc<Frame>` so every occurrence of the same key
/// shares one allocation. The first caller's attributes win.
#[derive(Debug, Default)]
pub struct FrameRegistry {
    frames: Vec<Arc<Frame>>,
    by_key: HashMap<String, usize>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the frame for `key`, creating it from `info` if unseen.
    pub fn intern(&mut self, key: &str, info: FrameInfo) -> Arc<Frame> {
        if let Some(&index) = self.by_key.get(key) {
            return Arc::clone(&self.frames[index]);
        }

        let frame = Arc::new(Frame {
            key: key.to_owned(),
            name: info.name,
            file: info.file,
            line: info.line,
            address: info.address,
        });
        self.by_key.insert(key.to_owned(), self.frames.len());
        self.frames.push(Arc::clone(&frame));
        frame
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Frame>> {
        self.by_key.get(key).map(|&index| &self.frames[index])
    }

    /// All interned frames in first-seen order.
    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_same_frame() {
        let mut registry = FrameRegistry::new();
        let a = registry.intern("main:/bin/app", FrameInfo::named("main"));
        let b = registry.intern("main:/bin/app", FrameInfo::named("main"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn first_writer_wins() {
        let mut registry = FrameRegistry::new();
        registry.intern(
            "k",
            FrameInfo {
                name: "first".into(),
                file: Some("a.c".into()),
                line: Some(3),
                address: None,
            },
        );
        let again = registry.intern("k", FrameInfo::named("second"));
        assert_eq!(again.name, "first");
        assert_eq!(again.file.as_deref(), Some("a.c"));
        assert_eq!(again.line, Some(3));
    }

    #[test]
    fn keeps_first_seen_order() {
        let mut registry = FrameRegistry::new();
        for key in ["c", "a", "b", "a"] {
            registry.intern(key, FrameInfo::named(key));
        }
        let keys: Vec<_> = registry.frames().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert!(registry.get("b").is_some());
        assert!(registry.get("z").is_none());
    }
}
