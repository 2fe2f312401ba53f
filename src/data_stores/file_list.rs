// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Directory expansion into ordered file-store lists.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::data_stores::File;
use crate::error::{DataReaderError, Result, StreamError};

/// Predicate deciding whether a listed path becomes a store.
pub type PathPredicate = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Options controlling [`list_files`].
#[derive(Default)]
pub struct FileListOptions {
    /// Glob pattern (`*` and `?`) matched against the full path.
    pub pattern: Option<String>,
    /// User predicate applied after the pattern.
    pub predicate: Option<PathPredicate>,
    /// Whether the resulting stores memory-map their files.
    pub memory_map: bool,
}

impl FileListOptions {
    /// Set the glob pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the predicate.
    pub fn with_predicate(mut self, predicate: PathPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Set whether stores memory-map their files.
    pub fn with_memory_map(mut self, memory_map: bool) -> Self {
        self.memory_map = memory_map;
        self
    }
}

/// Expand `paths` into file stores.
///
/// Directories are walked recursively; hidden entries are skipped. The
/// result is filtered by the glob pattern and predicate, then ordered by
/// natural sort (runs of digits compare numerically), so `part-2` sorts
/// before `part-10`.
pub fn list_files<P: AsRef<Path>>(paths: &[P], options: &FileListOptions) -> Result<Vec<File>> {
    let pattern = options
        .pattern
        .as_deref()
        .map(compile_glob)
        .transpose()?;

    let mut files = Vec::new();
    for path in paths {
        walk(path.as_ref(), &mut files)?;
    }

    files.retain(|path| {
        let text = path.to_string_lossy();

        if let Some(ref pattern) = pattern {
            if !pattern.is_match(&text) {
                return false;
            }
        }

        match &options.predicate {
            Some(predicate) => predicate(path),
            None => true,
        }
    });

    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

    Ok(files
        .into_iter()
        .map(|path| File::new(path).with_memory_map(options.memory_map))
        .collect())
}

fn walk(path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(StreamError::from)?;

        for entry in entries {
            let entry = entry.map_err(StreamError::from)?;

            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            walk(&entry.path(), out)?;
        }
    } else {
        out.push(path.to_path_buf());
    }

    Ok(())
}

/// Compile a glob pattern into an anchored regex.
pub(crate) fn compile_glob(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');

    for chr in pattern.chars() {
        match chr {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }

    expr.push('$');

    Regex::new(&expr).map_err(|e| {
        DataReaderError::invalid_argument(format!("the pattern '{pattern}' is invalid: {e}"))
    })
}

/// Compare two strings in natural sort order.
///
/// Runs of ASCII digits compare by numeric value; everything else
/// compares bytewise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());

    while !a.is_empty() && !b.is_empty() {
        if a[0].is_ascii_digit() && b[0].is_ascii_digit() {
            let a_len = a.iter().take_while(|c| c.is_ascii_digit()).count();
            let b_len = b.iter().take_while(|c| c.is_ascii_digit()).count();

            // Compare the digit runs as numbers: longer run of significant
            // digits wins, equal lengths compare lexically.
            let a_run = trim_leading_zeros(&a[..a_len]);
            let b_run = trim_leading_zeros(&b[..b_len]);

            let ordering = a_run
                .len()
                .cmp(&b_run.len())
                .then_with(|| a_run.cmp(b_run));
            if ordering != Ordering::Equal {
                return ordering;
            }

            a = &a[a_len..];
            b = &b[b_len..];
        } else {
            let ordering = a[0].cmp(&b[0]);
            if ordering != Ordering::Equal {
                return ordering;
            }

            a = &a[1..];
            b = &b[1..];
        }
    }

    a.len().cmp(&b.len())
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits.iter().take_while(|c| **c == b'0').count();

    &digits[first.min(digits.len().saturating_sub(1))..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_ordering() {
        let mut names = vec!["part-10", "part-2", "part-1", "other"];
        names.sort_by(|a, b| natural_cmp(a, b));

        assert_eq!(names, vec!["other", "part-1", "part-2", "part-10"]);
    }

    #[test]
    fn test_natural_ordering_with_leading_zeros() {
        assert_eq!(natural_cmp("part-002", "part-2"), Ordering::Equal);
        assert_eq!(natural_cmp("part-002", "part-10"), Ordering::Less);
    }

    #[test]
    fn test_glob_compilation() {
        let pattern = compile_glob("*.csv").unwrap();

        assert!(pattern.is_match("data/train.csv"));
        assert!(!pattern.is_match("data/train.csv.bak"));

        let pattern = compile_glob("part-?").unwrap();
        assert!(pattern.is_match("part-1"));
        assert!(!pattern.is_match("part-10"));
    }

    #[test]
    fn test_list_files_walks_and_filters() {
        let root = std::env::temp_dir().join(format!("mlfeed-list-{}", std::process::id()));
        let nested = root.join("nested");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(root.join("part-10.csv"), b"10").unwrap();
        std::fs::write(root.join("part-2.csv"), b"2").unwrap();
        std::fs::write(nested.join("part-1.csv"), b"1").unwrap();
        std::fs::write(root.join(".hidden.csv"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();

        let options = FileListOptions::default().with_pattern("*.csv");
        let files = list_files(&[&root], &options).unwrap();

        let names: Vec<&str> = files
            .iter()
            .map(|f| f.path().file_name().unwrap().to_str().unwrap())
            .collect();

        assert_eq!(names, vec!["part-1.csv", "part-2.csv", "part-10.csv"]);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
