/// Classification of a [`WatchEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventType {
    /// First write of a key
    Added,
    /// Any later write of a key
    Modified,
    /// Key removed
    Deleted,
    /// In-band failure; carries no object
    Error,
}

impl WatchEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventType::Added => "added",
            WatchEventType::Modified => "modified",
            WatchEventType::Deleted => "deleted",
            WatchEventType::Error => "error",
        }
    }
}

impl std::fmt::Display for WatchEventType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed change delivered to a watcher.
///
/// Keys are relative to the store prefix. `Added` and `Modified` carry the
/// value after the write, `Deleted` the value that was removed.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<O> {
    Added { key: String, object: O },
    Modified { key: String, object: O },
    Deleted { key: String, object: O },
    Error { reason: String },
}

impl<O> WatchEvent<O> {
    pub fn event_type(&self) -> WatchEventType {
        match self {
            WatchEvent::Added { .. } => WatchEventType::Added,
            WatchEvent::Modified { .. } => WatchEventType::Modified,
            WatchEvent::Deleted { .. } => WatchEventType::Deleted,
            WatchEvent::Error { .. } => WatchEventType::Error,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            WatchEvent::Added { key, .. }
            | WatchEvent::Modified { key, .. }
            | WatchEvent::Deleted { key, .. } => Some(key),
            WatchEvent::Error { .. } => None,
        }
    }

    pub fn object(&self) -> Option<&O> {
        match self {
            WatchEvent::Added { object, .. }
            | WatchEvent::Modified { object, .. }
            | WatchEvent::Deleted { object, .. } => Some(object),
            WatchEvent::Error { .. } => None,
        }
    }

    pub fn into_object(self) -> Option<O> {
        match self {
            WatchEvent::Added { object, .. }
            | WatchEvent::Modified { object, .. }
            | WatchEvent::Deleted { object, .. } => Some(object),
            WatchEvent::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WatchEvent::Error { .. })
    }
}
