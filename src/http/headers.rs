//! HTTP header map with case-insensitive name lookup.
//!
//! Repeated headers keep every value in arrival order; [`Headers::get`] is
//! the "single header" accessor and collapses them to the first value.

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// # Examples
///
/// ```
/// use weft::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Accept", "text/html");
/// headers.append("accept", "application/json");
///
/// assert_eq!(headers.get("ACCEPT"), Some("text/html"));
/// assert_eq!(headers.get_all("accept").count(), 2);
///
/// headers.set("Accept", "*/*");
/// assert_eq!(headers.get_all("accept").collect::<Vec<_>>(), vec!["*/*"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a value, keeping any existing values for the same name.
    ///
    /// Line breaks are removed from `name` and `value`, so no entry can
    /// spill into a second header line on the wire.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((single_line(name.into()), single_line(value.into())));
    }

    /// Replaces every value of `name` with a single `value`.
    ///
    /// The entry keeps the position of the first existing value so the wire
    /// order of unrelated headers is unchanged.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = single_line(name.into());
        let value = single_line(value.into());
        match self
            .inner
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(pos) => {
                let mut index = 0;
                self.inner.retain(|(k, _)| {
                    let keep = index <= pos || !k.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
                self.inner[pos] = (name, value);
            }
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all entries with the given header name (case-insensitive).
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn single_line(mut s: String) -> String {
    if s.contains(['\r', '\n']) {
        s.retain(|c| c != '\r' && c != '\n');
    }
    s
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.append("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn multi_value_keeps_order() {
        let mut h = Headers::new();
        h.append("Set-Cookie", "a=1");
        h.append("Set-Cookie", "b=2");
        let vals: Vec<_> = h.get_all("set-cookie").collect();
        assert_eq!(vals, vec!["a=1", "b=2"]);
        assert_eq!(h.get("set-cookie"), Some("a=1"));
    }

    #[test]
    fn set_replaces_all_values_in_place() {
        let mut h = Headers::new();
        h.append("X-First", "1");
        h.append("Vary", "Origin");
        h.append("X-Last", "2");
        h.append("vary", "Accept");

        h.set("Vary", "Accept-Encoding");

        let pairs: Vec<_> = h.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("X-First", "1"),
                ("Vary", "Accept-Encoding"),
                ("X-Last", "2"),
            ]
        );
    }

    #[test]
    fn set_appends_when_missing() {
        let mut h = Headers::new();
        h.set("Location", "/home");
        assert_eq!(h.get("location"), Some("/home"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn line_breaks_are_stripped() {
        let mut h = Headers::new();
        h.append("X-Note", "a\r\nSet-Cookie: admin=1");
        h.set("Loc\nation", "/x\r\n\r\n<html>");
        assert_eq!(h.get("x-note"), Some("aSet-Cookie: admin=1"));
        assert_eq!(h.get("location"), Some("/x<html>"));
        assert!(!h.to_string().contains("\r\nSet-Cookie"));
    }

    #[test]
    fn remove() {
        let mut h = Headers::new();
        h.append("X-Foo", "bar");
        h.append("X-Foo", "baz");
        assert!(h.remove("x-foo"));
        assert!(h.is_empty());
        assert!(!h.remove("x-foo"));
    }
}
