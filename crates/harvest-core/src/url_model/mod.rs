//! Destination naming.
//!
//! Derives a safe local filename from a locator's final path segment and
//! keeps names unique within one batch. Uniqueness is batch-scoped and never
//! touches the filesystem, so every name is known before any I/O starts.

mod path;
mod sanitize;

pub use path::last_path_segment;
pub use sanitize::sanitize_filename;

use crate::locator::ResourceLocator;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Fallback when the locator yields nothing usable.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Derives a sanitized base filename from the locator path.
///
/// - `https://h/img/a.jpg` → `a.jpg`
/// - `https://h/` → `download.bin`
pub fn derive_filename(locator: &ResourceLocator) -> String {
    let Some(raw) = last_path_segment(locator.url()) else {
        return DEFAULT_FILENAME.to_string();
    };
    let sanitized = sanitize_filename(&raw);
    if sanitized.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Returns `name` with `-n` inserted before the extension (`img.png` → `img-2.png`).
pub fn disambiguated(name: &str, n: usize) -> String {
    let suffix = format!("-{}", n);
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    };
    let ext = sanitize::truncate_on_char_boundary(ext, sanitize::NAME_MAX - suffix.len());
    let budget = sanitize::NAME_MAX.saturating_sub(suffix.len() + ext.len());
    let stem = sanitize::truncate_on_char_boundary(stem, budget);
    format!("{}{}{}", stem, suffix, ext)
}

/// Assigns batch-unique destination paths under one output root.
#[derive(Debug)]
pub struct DestinationNamer {
    root: PathBuf,
    assigned: HashSet<String>,
}

impl DestinationNamer {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            assigned: HashSet::new(),
        }
    }

    /// Picks the destination for `locator`, disambiguating against names
    /// already handed out in this batch.
    pub fn assign(&mut self, locator: &ResourceLocator) -> PathBuf {
        let base = derive_filename(locator);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.assigned.contains(&candidate) {
            candidate = disambiguated(&base, n);
            n += 1;
        }
        let path = self.root.join(&candidate);
        self.assigned.insert(candidate);
        path
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::normalize;

    fn loc(s: &str) -> ResourceLocator {
        normalize(s, None).unwrap()
    }

    #[test]
    fn derive_filename_from_path() {
        assert_eq!(derive_filename(&loc("https://h/a.jpg")), "a.jpg");
        assert_eq!(
            derive_filename(&loc("https://cdn.example.com/path/to/photo.png?size=large")),
            "photo.png"
        );
    }

    #[test]
    fn derive_filename_fallbacks() {
        assert_eq!(derive_filename(&loc("https://example.com/")), DEFAULT_FILENAME);
        assert_eq!(derive_filename(&loc("https://example.com")), DEFAULT_FILENAME);
        assert_eq!(derive_filename(&loc("https://example.com/...")), DEFAULT_FILENAME);
    }

    #[test]
    fn disambiguated_inserts_before_extension() {
        assert_eq!(disambiguated("img.png", 2), "img-2.png");
        assert_eq!(disambiguated("archive.tar.gz", 3), "archive.tar-3.gz");
        assert_eq!(disambiguated("README", 2), "README-2");
    }

    #[test]
    fn disambiguated_respects_name_max() {
        let long_stem = format!("{}.jpg", "s".repeat(251));
        let name = disambiguated(&long_stem, 12);
        assert_eq!(name.len(), 255);
        assert!(name.ends_with("-12.jpg"));

        let long_ext = format!("a.{}", "x".repeat(253));
        let name = disambiguated(&long_ext, 2);
        assert!(name.len() <= 255, "{} bytes", name.len());
        assert!(name.starts_with("-2."));
    }

    #[test]
    fn same_filename_on_two_hosts() {
        let mut namer = DestinationNamer::new(Path::new("/out"));
        let a = namer.assign(&loc("https://h1/img.png"));
        let b = namer.assign(&loc("https://h2/img.png"));
        assert_eq!(a, Path::new("/out/img.png"));
        assert_eq!(b, Path::new("/out/img-2.png"));
    }

    #[test]
    fn skips_names_taken_by_other_locators() {
        let mut namer = DestinationNamer::new(Path::new("/out"));
        let taken = namer.assign(&loc("https://h/img-2.png"));
        let first = namer.assign(&loc("https://h1/img.png"));
        let second = namer.assign(&loc("https://h2/img.png"));
        assert_eq!(taken, Path::new("/out/img-2.png"));
        assert_eq!(first, Path::new("/out/img.png"));
        assert_eq!(second, Path::new("/out/img-3.png"));
    }

    #[test]
    fn names_are_unique_across_a_batch() {
        let mut namer = DestinationNamer::new(Path::new("/out"));
        let paths: Vec<PathBuf> = (0..20)
            .map(|i| namer.assign(&loc(&format!("https://h{}/x.jpg", i % 3))))
            .collect();
        let unique: HashSet<&PathBuf> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
        assert_eq!(namer.assigned_count(), 20);
    }
}
