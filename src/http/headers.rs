//! HTTP header map with case-insensitive name lookup.
//!
//! Names are normalized to lowercase on the way in and on lookup, so every
//! name maps to at most one value and the last write wins.

use std::fmt;

/// A case-insensitive, single-value HTTP header map.
///
/// Preserves insertion order for serialization. Setting a name that is already
/// present replaces its value in place.
///
/// # Examples
///
/// ```
/// use filedrop::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.set("Content-Type", "  application/octet-stream ");
/// headers.set("X-Custom", "first");
/// headers.set("x-custom", "second");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), "application/octet-stream");
/// assert_eq!(headers.get("X-Custom"), "second");
/// assert_eq!(headers.get("missing"), "");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, overwriting any existing value for the same name.
    ///
    /// The name is trimmed and lowercased; the value is trimmed.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        let name = normalize(name.as_ref());
        let value = value.as_ref().trim().to_owned();

        match self.inner.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the value for `name`, or the empty string when absent.
    ///
    /// An absent header and a header set to `""` look the same here; use
    /// [`contains`](Self::contains) when the difference matters.
    pub fn get(&self, name: &str) -> &str {
        let name = normalize(name);
        self.inner
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Removes the entry for `name`. Returns `true` if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let name = normalize(name);
        let before = self.inner.len();
        self.inner.retain(|(k, _)| *k != name);
        self.inner.len() < before
    }

    /// Returns `true` if the map contains an entry for `name`.
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize(name);
        self.inner.iter().any(|(k, _)| *k == name)
    }

    /// Returns the number of distinct header names.
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

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Wire serialization: one `name: value\r\n` line per entry.
///
/// An empty map renders as the empty string, never a bare CRLF.
impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
