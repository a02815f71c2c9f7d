//! Unit kind definitions.

use std::path::Path;

/// Kind of template unit, determines dependency handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Top-level page, served directly.
    Page,
    /// Reusable sub-template; may participate in include cycles.
    Fragment,
}

impl UnitKind {
    /// Detect unit kind from a logical path.
    ///
    /// Anything not carrying the fragment extension is a page.
    pub fn from_path(path: &str, fragment_extension: &str) -> Self {
        let is_fragment = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(fragment_extension));
        if is_fragment {
            Self::Fragment
        } else {
            Self::Page
        }
    }

    /// Display name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Fragment => "fragment",
        }
    }

    #[inline]
    pub fn is_fragment(self) -> bool {
        self == Self::Fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(UnitKind::from_path("/a.tpl", "tpf"), UnitKind::Page);
        assert_eq!(UnitKind::from_path("/lib/b.tpf", "tpf"), UnitKind::Fragment);
        assert_eq!(UnitKind::from_path("/lib/B.TPF", "tpf"), UnitKind::Fragment);
        assert_eq!(UnitKind::from_path("/noext", "tpf"), UnitKind::Page);
    }

    #[test]
    fn test_name() {
        assert_eq!(UnitKind::Page.name(), "page");
        assert!(UnitKind::Fragment.is_fragment());
    }
}
