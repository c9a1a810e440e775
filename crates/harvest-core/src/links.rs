//! Input from the link-extraction side: raw locators plus the page's base.

use anyhow::{Context, Result};
use std::io::BufRead;

/// Raw locators in extraction order, with the URI of the page they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBatch {
    /// Page the links were scraped from; resolves relative locators.
    pub base: Option<String>,
    pub raw: Vec<String>,
}

impl LinkBatch {
    pub fn new(base: Option<String>, raw: Vec<String>) -> Self {
        Self { base, raw }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Reads a newline-separated link list. Blank lines and `#` comments are
/// skipped; everything else is kept verbatim for the normalizer to judge.
pub fn read_link_list<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read link list line {}", n + 1))?;
        let t = line.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        out.push(t.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blanks_and_comments() {
        let input = "# scraped from gallery\nhttps://h/a.jpg\n\n  /img/b.jpg  \n#https://h/skip.jpg\nnot a url\n";
        let links = read_link_list(input.as_bytes()).unwrap();
        assert_eq!(links, vec!["https://h/a.jpg", "/img/b.jpg", "not a url"]);
    }

    #[test]
    fn empty_input_is_empty_list() {
        assert!(read_link_list("".as_bytes()).unwrap().is_empty());
        assert!(LinkBatch::default().is_empty());
    }
}
