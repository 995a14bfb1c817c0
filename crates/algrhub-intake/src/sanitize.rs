//! Folder and file name sanitising.
//!
//! Client-supplied strings never reach the filesystem verbatim: package names
//! and owner ids are reduced to a conservative character set, and declared
//! file names are cut down to their final path component.

use std::path::{Component, Path};

/// Longest sanitised segment kept in an instance folder name.
pub const MAX_SEGMENT_LEN: usize = 64;

/// Fallback used when a name has no usable characters left.
const EMPTY_SEGMENT: &str = "algorithm";

/// Reduce `raw` to a single filesystem-safe path segment.
///
/// ASCII letters, digits, `-`, `_` and `.` are kept; runs of anything else
/// become one `_`. Leading dots are stripped so the result is never hidden
/// or a relative reference.
#[must_use]
pub fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_SEGMENT_LEN));
    let mut last_was_replacement = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
            last_was_replacement = false;
        } else if !last_was_replacement {
            out.push('_');
            last_was_replacement = true;
        }
    }

    let trimmed = out.trim_start_matches('.');
    let mut segment: String = trimmed.chars().take(MAX_SEGMENT_LEN).collect();
    while segment.ends_with('.') {
        segment.pop();
    }
    if segment.is_empty() || segment.chars().all(|ch| ch == '_') {
        return EMPTY_SEGMENT.to_string();
    }
    segment
}

/// Instance folder name: `<name>-[<owner>-]<millis>`.
#[must_use]
pub fn instance_folder_name(name: &str, owner: Option<&str>, millis: u64) -> String {
    let name = sanitize_segment(name);
    match owner.map(str::trim).filter(|owner| !owner.is_empty()) {
        Some(owner) => format!("{name}-{}-{millis}", sanitize_segment(owner)),
        None => format!("{name}-{millis}"),
    }
}

/// Final path component of a client-declared file name.
///
/// Browsers and CLI clients send anything from `pkg.zip` to
/// `C:\Users\me\pkg.zip`; only the last component is kept. Returns `None` when
/// nothing usable is left.
#[must_use]
pub fn declared_file_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let last = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed).trim();
    if last.is_empty() || last.contains('\0') {
        return None;
    }
    let mut components = Path::new(last).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) => segment.to_str().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_segment_keeps_safe_characters() {
        assert_eq!(sanitize_segment("sort-algo"), "sort-algo");
        assert_eq!(sanitize_segment("K_Means.v2"), "K_Means.v2");
    }

    #[test]
    fn sanitize_segment_replaces_unsafe_runs() {
        assert_eq!(sanitize_segment("my algo / v2"), "my_algo_v2");
        assert_eq!(sanitize_segment("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_segment("..hidden"), "hidden");
        assert_eq!(sanitize_segment("名前"), "algorithm");
        assert_eq!(sanitize_segment("   "), "algorithm");
        assert_eq!(sanitize_segment("..."), "algorithm");
    }

    #[test]
    fn sanitize_segment_truncates_long_names() {
        let long = "a".repeat(MAX_SEGMENT_LEN * 2);
        assert_eq!(sanitize_segment(&long).len(), MAX_SEGMENT_LEN);
    }

    #[test]
    fn instance_folder_name_embeds_owner_when_present() {
        assert_eq!(
            instance_folder_name("sort-algo", None, 1_700_000_000_000),
            "sort-algo-1700000000000"
        );
        assert_eq!(
            instance_folder_name("sort-algo", Some("u 42"), 7),
            "sort-algo-u_42-7"
        );
        assert_eq!(instance_folder_name("pca", Some("  "), 7), "pca-7");
    }

    #[test]
    fn declared_file_name_keeps_last_component() {
        assert_eq!(declared_file_name("pkg.zip").as_deref(), Some("pkg.zip"));
        assert_eq!(
            declared_file_name("C:\\Users\\me\\pkg.zip").as_deref(),
            Some("pkg.zip")
        );
        assert_eq!(
            declared_file_name("/tmp/../pkg.zip").as_deref(),
            Some("pkg.zip")
        );
    }

    #[test]
    fn declared_file_name_rejects_unusable_names() {
        for raw in ["", "  ", "..", ".", "dir/", "a\0b"] {
            assert_eq!(declared_file_name(raw), None, "{raw:?}");
        }
    }
}
