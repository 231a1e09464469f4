use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use regex::Regex;

use crate::Result;

/// File-name prefix that marks a chunk as opt-in. Such files are never
/// auto-loaded.
pub const PRIVATE_MARKER: char = '_';

/// Return the sorted list of regular files matching `pattern`.
///
/// Supported syntax: `*` (any run within one path component), `?` (one
/// character), `**` (zero or more whole components). Relative patterns are
/// matched relative to the current directory and returned relative as well.
pub fn scan(pattern: &str) -> Result<Vec<PathBuf>> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let normalized = pattern.replace('\\', "/");
    let (base, recursive) = literal_base(&normalized);
    let re = glob_to_regex(&normalized).with_context(|| format!("compile pattern {pattern}"))?;

    let root = if base.is_empty() { Path::new(".") } else { Path::new(base) };
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut walker = walkdir::WalkDir::new(root).follow_links(false);
    if !recursive {
        walker = walker.max_depth(depth_of(&normalized[base.len()..]));
    }
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let display = path.to_string_lossy().replace('\\', "/");
        let candidate = if base.is_empty() {
            display.strip_prefix("./").unwrap_or(&display).to_string()
        } else {
            display
        };
        if re.is_match(&candidate) {
            out.push(PathBuf::from(candidate));
        }
    }
    out.sort();
    Ok(out)
}

/// True if the file name starts with [`PRIVATE_MARKER`].
pub fn is_private(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with(PRIVATE_MARKER))
        .unwrap_or(false)
}

/// Longest leading run of components without glob metacharacters, and
/// whether the pattern uses `**`.
fn literal_base(pattern: &str) -> (&str, bool) {
    let recursive = pattern.contains("**");
    let first_meta = pattern.find(['*', '?', '[']).unwrap_or(pattern.len());
    let base = match pattern[..first_meta].rfind('/') {
        Some(0) => "/",
        Some(i) => &pattern[..i],
        None => "",
    };
    (base, recursive)
}

/// Number of path components below the base directory.
fn depth_of(rest: &str) -> usize {
    rest.trim_start_matches('/')
        .split('/')
        .filter(|c| !c.is_empty())
        .count()
        .max(1)
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                // `**/` matches zero or more directories; a trailing `**`
                // matches everything below.
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => bail!("character classes are not supported"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}
