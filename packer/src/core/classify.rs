//! Name-based rules that decide what the tree walk visits and how each file
//! is transformed.

/// Entry names pruned from traversal at any depth below the source root.
pub const EXCLUDED_NAMES: [&str; 4] = ["node_modules", ".git", "dist", "build"];

/// Transform applied to a regular file in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Parsed and re-serialized without whitespace.
    Json,
    /// Copied byte-for-byte.
    Verbatim,
}

/// Returns true when an entry with this name must not be visited or copied.
///
/// Matching is exact and case-sensitive: `Build` is kept, `build` is not.
pub fn is_excluded(name: &str) -> bool {
    EXCLUDED_NAMES.contains(&name)
}

/// Pick the transform for a file from its name.
pub fn classify(name: &str) -> FileKind {
    if has_json_extension(name) {
        FileKind::Json
    } else {
        FileKind::Verbatim
    }
}

fn has_json_extension(name: &str) -> bool {
    const SUFFIX: &str = ".json";
    let bytes = name.as_bytes();
    bytes.len() >= SUFFIX.len()
        && bytes[bytes.len() - SUFFIX.len()..].eq_ignore_ascii_case(SUFFIX.as_bytes())
}
