//! Filesystem-safe name handling.
//!
//! Metadata values (titles, channel names) can contain characters that are
//! illegal or ambiguous in file names. `sanitize` maps them to harmless
//! replacements; `unique_path` and `reserve_unique_path` handle collisions
//! with an ` (N)` suffix on the base name.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Replace filesystem-hostile characters in a metadata value.
///
/// Trailing whitespace and dots are trimmed after substitution; Windows
/// refuses names ending in either.
pub fn sanitize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ':' => out.push_str(" - "),
            '/' | '\\' => out.push('_'),
            '?' => {}
            '"' => out.push('\''),
            '<' => out.push('['),
            '>' => out.push(']'),
            '|' => out.push('-'),
            '*' => out.push('_'),
            _ => out.push(c),
        }
    }
    out.trim_end_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Build the ` (N)` variant of a path, preserving the extension.
fn numbered_variant(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

/// Return the first non-existing variant of `path`.
///
/// `path` itself is returned when it does not exist; otherwise the base name
/// is suffixed with ` (N)` for N = 2, 3, ... until a free slot is found.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let mut n = 2;
    loop {
        let candidate = numbered_variant(path, n);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Atomically claim a unique variant of `path` by creating it.
///
/// `unique_path` has a window between the existence probe and the rename
/// where a concurrent job can take the same name. Creating the file with
/// `create_new` closes that window; the caller renames the real artifact
/// over the placeholder.
pub fn reserve_unique_path(path: &Path) -> io::Result<PathBuf> {
    let mut candidate = path.to_path_buf();
    let mut n = 2;
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = numbered_variant(path, n);
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn replaces_reserved_characters() {
        assert_eq!(sanitize("a:b"), "a - b");
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
        assert_eq!(sanitize("what?"), "what");
        assert_eq!(sanitize("say \"hi\""), "say 'hi'");
        assert_eq!(sanitize("<tag>"), "[tag]");
        assert_eq!(sanitize("a|b"), "a-b");
        assert_eq!(sanitize("a*b"), "a_b");
    }

    #[test]
    fn trims_trailing_whitespace_and_dots() {
        assert_eq!(sanitize("name..."), "name");
        assert_eq!(sanitize("name.  "), "name");
        assert_eq!(sanitize("ends with colon:"), "ends with colon -");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "Some/Artist: Live",
            "a:b|c*d?e\"f<g>h",
            "trailing... ",
            "plain name",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn sanitized_output_has_no_reserved_characters() {
        let out = sanitize("a:b/c\\d?e\"f<g>h|i*j");
        for c in ['\\', '/', ':', '*', '?', '"', '|', '<', '>'] {
            assert!(!out.contains(c), "{:?} still contains {:?}", out, c);
        }
    }

    #[test]
    fn unique_path_returns_free_path_unchanged() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("song.mp3");
        assert_eq!(unique_path(&target), target);
    }

    #[test]
    fn unique_path_appends_counter_suffix() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("song.mp3");
        std::fs::write(&target, b"x").unwrap();
        assert_eq!(unique_path(&target), dir.path().join("song (2).mp3"));

        std::fs::write(dir.path().join("song (2).mp3"), b"x").unwrap();
        assert_eq!(unique_path(&target), dir.path().join("song (3).mp3"));
    }

    #[test]
    fn unique_path_is_idempotent_on_stable_filesystem() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("song.mp3");
        std::fs::write(&target, b"x").unwrap();

        let first = unique_path(&target);
        let second = unique_path(&first);
        assert_eq!(first, second);
    }

    #[test]
    fn reserve_unique_path_claims_the_slot() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("song.mp3");
        std::fs::write(&target, b"x").unwrap();

        let claimed = reserve_unique_path(&target).unwrap();
        assert_eq!(claimed, dir.path().join("song (2).mp3"));
        assert!(claimed.exists());

        // A second claim must move on to the next slot.
        let next = reserve_unique_path(&target).unwrap();
        assert_eq!(next, dir.path().join("song (3).mp3"));
    }
}
