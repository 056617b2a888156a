//! Absolute prim paths.

use std::fmt;

/// An absolute, `/`-separated prim path such as `/World/Geo/Cube`.
///
/// The pseudo-root is `/`. Property paths (`/Prim.attr`) are only used as
/// connection targets and are stored verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SdfPath(String);

impl SdfPath {
    /// The pseudo-root path `/`.
    pub fn root() -> Self {
        SdfPath("/".to_string())
    }

    /// Build a path from text, normalizing a missing leading slash and any
    /// trailing slash.
    pub fn new(path: impl AsRef<str>) -> Self {
        let trimmed = path.as_ref().trim();
        let trimmed = trimmed.trim_end_matches('/');
        if trimmed.is_empty() {
            return Self::root();
        }
        if trimmed.starts_with('/') {
            SdfPath(trimmed.to_string())
        } else {
            SdfPath(format!("/{}", trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last path component; empty for the pseudo-root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Parent path, or `None` for the pseudo-root.
    pub fn parent(&self) -> Option<SdfPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(SdfPath(self.0[..idx].to_string())),
        }
    }

    pub fn append_child(&self, name: &str) -> SdfPath {
        if self.is_root() {
            SdfPath(format!("/{}", name))
        } else {
            SdfPath(format!("{}/{}", self.0, name))
        }
    }

    /// Component-aware prefix test: `/World` prefixes `/World/Geo` but not
    /// `/WorldX`. Every path has the pseudo-root as a prefix.
    pub fn has_prefix(&self, prefix: &SdfPath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/')
    }

    /// Re-root this path from `old_prefix` onto `new_prefix`.
    ///
    /// Returns `None` when `old_prefix` is not a prefix of this path.
    pub fn replace_prefix(&self, old_prefix: &SdfPath, new_prefix: &SdfPath) -> Option<SdfPath> {
        if !self.has_prefix(old_prefix) {
            return None;
        }
        if self == old_prefix {
            return Some(new_prefix.clone());
        }
        let rest = if old_prefix.is_root() {
            &self.0[1..]
        } else {
            &self.0[old_prefix.0.len() + 1..]
        };
        let mut out = new_prefix.clone();
        for part in rest.split('/') {
            out = out.append_child(part);
        }
        Some(out)
    }

    /// Number of components below the pseudo-root.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// Ancestors from the immediate parent up to and including the pseudo-root.
    pub fn ancestors(&self) -> impl Iterator<Item = SdfPath> {
        std::iter::successors(self.parent(), |p| p.parent())
    }
}

impl fmt::Display for SdfPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SdfPath {
    fn from(s: &str) -> Self {
        SdfPath::new(s)
    }
}

/// Turn arbitrary text into a valid prim name.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, and a leading digit gets an
/// underscore prefix. Empty input yields `_`.
pub fn make_valid_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    } else if out.as_bytes()[0].is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}
