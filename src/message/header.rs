//! Ordered, case-insensitive, multi-valued message headers.
//!
//! B2F message headers must round-trip in insertion order, and several
//! names (`To`, `Cc`, `File`) legitimately repeat, so this is a plain
//! ordered list with case-insensitive name matching rather than a map.

/// Header name/value list preserving insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Append a value for `name`.
    pub fn add(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Replace the value for `name`, keeping its position. Later
    /// duplicates are dropped; a missing name is appended.
    pub fn set(&mut self, name: &str, value: &str) {
        let mut found = false;
        self.entries.retain_mut(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                if found {
                    return false;
                }
                found = true;
                *v = value.to_string();
            }
            true
        });
        if !found {
            self.add(name, value);
        }
    }

    /// Remove every value for `name`.
    pub fn del(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append to the last entry's value (header continuation line).
    pub(super) fn append_to_last(&mut self, continuation: &str) {
        if let Some((_, v)) = self.entries.last_mut() {
            v.push(' ');
            v.push_str(continuation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_get() {
        let mut h = Header::new();
        h.add("Mid", "ABC123");
        assert_eq!(h.get("MID"), Some("ABC123"));
        assert_eq!(h.get("mid"), Some("ABC123"));
    }

    #[test]
    fn test_multi_value_order_preserved() {
        let mut h = Header::new();
        h.add("To", "LA1B");
        h.add("Cc", "LA2C");
        h.add("To", "LA3D");
        assert_eq!(h.get_all("To"), vec!["LA1B", "LA3D"]);
        assert_eq!(h.get("To"), Some("LA1B"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut h = Header::new();
        h.add("Subject", "old");
        h.add("Mbo", "LA5NTA");
        h.set("Subject", "new");
        let entries: Vec<_> = h.iter().collect();
        assert_eq!(entries, vec![("Subject", "new"), ("Mbo", "LA5NTA")]);
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut h = Header::new();
        h.add("X-Tag", "a");
        h.add("X-Tag", "b");
        h.set("X-Tag", "c");
        assert_eq!(h.get_all("X-Tag"), vec!["c"]);
    }

    #[test]
    fn test_del() {
        let mut h = Header::new();
        h.add("X-Unread", "true");
        h.add("Subject", "keep");
        h.del("x-unread");
        assert!(!h.contains("X-Unread"));
        assert!(h.contains("Subject"));
    }

    #[test]
    fn test_continuation_append() {
        let mut h = Header::new();
        h.add("Subject", "a long");
        h.append_to_last("subject line");
        assert_eq!(h.get("Subject"), Some("a long subject line"));
    }
}
