//! Logical path handling and generated type naming.
//!
//! Type names are derived deterministically from the logical path so the
//! same template always maps to the same artifact location.

/// Normalize a logical path: leading slash, `/` separators, `.` and `..`
/// segments resolved. `..` never climbs above the root.
///
/// # Examples
/// ```
/// use stencil::core::normalize_path;
/// assert_eq!(normalize_path("a/b.tpl"), "/a/b.tpl");
/// assert_eq!(normalize_path("/a/./c/../b.tpl"), "/a/b.tpl");
/// assert_eq!(normalize_path("\\win\\x.tpl"), "/win/x.tpl");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Resolve `target` relative to the directory of `base`.
///
/// Absolute targets are only normalized.
///
/// # Examples
/// ```
/// use stencil::core::resolve_relative;
/// assert_eq!(resolve_relative("/pages/a.tpl", "frag.tpf"), "/pages/frag.tpf");
/// assert_eq!(resolve_relative("/pages/a.tpl", "../lib/b.tpf"), "/lib/b.tpf");
/// assert_eq!(resolve_relative("/pages/a.tpl", "/lib/b.tpf"), "/lib/b.tpf");
/// ```
pub fn resolve_relative(base: &str, target: &str) -> String {
    if target.starts_with('/') {
        return normalize_path(target);
    }
    let dir = base.rsplit_once('/').map_or("", |(dir, _)| dir);
    normalize_path(&format!("{dir}/{target}"))
}

/// Map a logical path to a qualified type name inside `namespace`.
///
/// Each path segment becomes one name segment; characters that are not
/// ASCII alphanumeric or `_` are escaped as `_xxxx` (hex code point), and a
/// leading digit is prefixed with `_`. The mapping is injective.
///
/// # Examples
/// ```
/// use stencil::core::type_name;
/// assert_eq!(type_name("gen", "/a.tpl"), "gen.a_002etpl");
/// assert_eq!(type_name("gen", "/blog/1st.tpl"), "gen.blog._1st_002etpl");
/// ```
pub fn type_name(namespace: &str, path: &str) -> String {
    let normalized = normalize_path(path);
    let mut name = String::from(namespace);
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        name.push('.');
        name.push_str(&mangle_segment(segment));
    }
    name
}

/// Whether `name` lies inside the generated `namespace`.
#[inline]
pub fn in_namespace(namespace: &str, name: &str) -> bool {
    name.strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Convert a type name to a filesystem-safe file stem.
#[inline]
pub fn type_file_stem(name: &str) -> String {
    name.replace('.', "/")
}

fn mangle_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    for (i, c) in segment.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            out.push('_');
            out.push(c);
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if c == '_' {
            // `_` introduces escapes, so a literal one is escaped too
            out.push_str("_005f");
        } else {
            out.push_str(&format!("_{:04x}", c as u32));
        }
    }
    out
}
