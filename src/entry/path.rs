//! Lexical cleaning of slash-separated archive paths.
//!
//! Cleaning never touches the filesystem: it collapses `.` and `..`
//! segments and redundant separators purely on the string.

/// Return the shortest lexically equivalent form of `path`.
///
/// Rules, applied left to right over `/`-separated segments:
/// - empty segments and `.` are dropped
/// - `..` removes the previous segment, unless there is none (or it is
///   itself `..`); in a rooted path a leading `..` is dropped, otherwise kept
///
/// An empty result becomes `.` (or `/` when rooted).
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Clean `raw` and make it relative to the archive root.
///
/// The archive root itself normalizes to `.`, so the result is always a
/// fixed point of this function.
pub fn normalize(raw: &str) -> String {
    let cleaned = clean(raw);
    match cleaned.strip_prefix('/') {
        Some("") => ".".to_string(),
        Some(relative) => relative.to_string(),
        None => cleaned,
    }
}

/// True when a normalized path would resolve outside the archive root.
pub fn escapes_root(normalized: &str) -> bool {
    normalized == ".." || normalized.starts_with("../")
}

/// Final segment of a normalized path.
pub fn base_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}
