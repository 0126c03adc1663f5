//! Dictionary and name-list collaborator.
//!
//! Read-only token sets loaded once at startup and queried by membership
//! only. Accepts ispell-style lines ("word/FLAGS"); everything after the
//! first `/` is discarded.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::{FerretError, FerretResult};

/// Word and first-name token sets used by heuristic modules.
#[derive(Debug, Default)]
pub struct Dictionary {
    words: HashSet<String>,
    names: HashSet<String>,
}

impl Dictionary {
    /// An empty dictionary; heuristics degrade but keep working.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_lines<W, N>(words: W, names: N) -> Self
    where
        W: IntoIterator<Item = String>,
        N: IntoIterator<Item = String>,
    {
        Self {
            words: collect_tokens(words),
            names: collect_tokens(names),
        }
    }

    /// Load word lists and name lists from line-oriented files.
    pub fn from_files(word_files: &[&Path], name_files: &[&Path]) -> FerretResult<Self> {
        let mut dict = Self::default();
        for path in word_files {
            dict.words.extend(read_tokens(path)?);
        }
        for path in name_files {
            dict.names.extend(read_tokens(path)?);
        }
        log::debug!(
            "Loaded dictionary: {} words, {} names",
            dict.words.len(),
            dict.names.len()
        );
        Ok(dict)
    }

    pub fn is_word(&self, token: &str) -> bool {
        self.words.contains(&token.to_lowercase())
    }

    pub fn is_name(&self, token: &str) -> bool {
        self.names.contains(&token.to_lowercase())
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }
}

fn collect_tokens<I: IntoIterator<Item = String>>(lines: I) -> HashSet<String> {
    lines
        .into_iter()
        .filter_map(|line| {
            let token = line.trim().to_lowercase();
            let token = token.split('/').next().unwrap_or("").to_string();
            if token.is_empty() {
                None
            } else {
                Some(token)
            }
        })
        .collect()
}

fn read_tokens(path: &Path) -> FerretResult<HashSet<String>> {
    let file = File::open(path).map_err(|e| FerretError::io(e, Some(path.to_path_buf())))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<String>, _>>()
        .map_err(|e| FerretError::io(e, Some(path.to_path_buf())))?;
    Ok(collect_tokens(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_ispell_flags_stripped() {
        let dict = Dictionary::from_lines(
            vec!["apple/S".to_string(), "Banana".to_string(), "".to_string()],
            vec!["alice/M".to_string()],
        );
        assert!(dict.is_word("apple"));
        assert!(dict.is_word("BANANA"));
        assert!(!dict.is_word("apple/S"));
        assert!(dict.is_name("Alice"));
        assert!(!dict.is_name("bob"));
    }

    #[test]
    fn test_load_from_files() {
        let dir = TempDir::new().unwrap();
        let words = dir.path().join("english.dict");
        let names = dir.path().join("names.dict");
        writeln!(File::create(&words).unwrap(), "tree/A\nhouse").unwrap();
        writeln!(File::create(&names).unwrap(), "john\nmary/X").unwrap();

        let dict = Dictionary::from_files(&[&words], &[&names]).unwrap();
        assert_eq!(dict.word_count(), 2);
        assert!(dict.is_word("house"));
        assert!(dict.is_name("mary"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = Dictionary::from_files(&[Path::new("/nonexistent/words.dict")], &[]);
        assert!(err.is_err());
    }
}
