use std::{borrow::Cow, fmt};

/// Namespaced cache key: `entity:id[:segment...]`.
///
/// Each component is escaped (`%` as `%25`, `:` as `%3A`) before joining, so
/// two keys are equal only when their entity, id and segments are all equal.
/// Ids that happen to contain the separator cannot collide with sub-resource
/// keys, and keys of different entity kinds never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for one entity, e.g. `CacheKey::new("issue", "ENG-42")`.
    pub fn new(entity: &str, id: impl fmt::Display) -> Self {
        let mut key = escape(entity).into_owned();
        key.push(':');
        key.push_str(&escape(&id.to_string()));
        Self(key)
    }

    /// Appends a sub-resource segment, e.g. `.segment("comments")`.
    #[must_use]
    pub fn segment(mut self, segment: impl fmt::Display) -> Self {
        self.0.push(':');
        self.0.push_str(&escape(&segment.to_string()));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn escape(component: &str) -> Cow<'_, str> {
    if component.contains(['%', ':']) {
        Cow::Owned(component.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(CacheKey::new("issue", 42), CacheKey::new("issue", "42"));
        assert_eq!(CacheKey::new("issue", 42).as_str(), "issue:42");
    }

    #[test]
    fn test_segments_are_appended_in_order() {
        let key = CacheKey::new("project", "p1").segment("members").segment(2);
        assert_eq!(key.to_string(), "project:p1:members:2");
    }

    #[test]
    fn test_entity_kinds_do_not_collide() {
        assert_ne!(CacheKey::new("issue", "1"), CacheKey::new("project", "1"));
    }

    #[test]
    fn test_separator_inside_id_does_not_collide_with_segment() {
        let embedded = CacheKey::new("issue", "a:b");
        let segmented = CacheKey::new("issue", "a").segment("b");
        assert_ne!(embedded, segmented);
        assert_eq!(embedded.as_str(), "issue:a%3Ab");
    }

    #[test]
    fn test_escape_character_is_itself_escaped() {
        assert_ne!(CacheKey::new("issue", "a%3Ab"), CacheKey::new("issue", "a:b"));
        assert_eq!(CacheKey::new("issue", "100%").as_str(), "issue:100%25");
    }
}
