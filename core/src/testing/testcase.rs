use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Path, PathBuf},
};

use fsutil::EntryKind;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestGroup {
    pub name: String,
    pub cases: Vec<TestCase>,
}

impl TestCase {
    pub const INPUT_EXT: &str = "in";
    pub const EXPECTED_EXT: &str = "sol";

    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected: expected.into(),
        }
    }

    pub fn load_pair(
        name: impl Into<String>,
        input_path: impl AsRef<Path>,
        expected_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let input = fsutil::read_to_string_lossy(input_path)?;
        let expected = fsutil::read_to_string_lossy(expected_path)?;
        Ok(Self::new(name, input, expected))
    }
}

impl TestGroup {
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }

    /// Loads every `<stem>.in` / `<stem>.sol` pair in `dir`.
    /// Files without a partner are skipped.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let name = dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut inputs: HashMap<String, PathBuf> = HashMap::new();
        let mut expecteds: HashMap<String, PathBuf> = HashMap::new();

        for path in fsutil::list_entries(dir, EntryKind::File)? {
            let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
                log::warn!("Non UTF-8 filename {:?}, skipped", path);
                continue;
            };
            match fsutil::split_ext(filename) {
                Some((stem, TestCase::INPUT_EXT)) => {
                    inputs.insert(stem.to_owned(), path.clone());
                }
                Some((stem, TestCase::EXPECTED_EXT)) => {
                    expecteds.insert(stem.to_owned(), path.clone());
                }
                _ => (),
            }
        }

        let mut stems: Vec<_> = inputs.keys().cloned().collect();
        stems.sort_by(|a, b| natural_cmp(a, b));

        let mut cases = Vec::with_capacity(stems.len());
        for stem in stems {
            let Some(sol) = expecteds.get(&stem) else {
                log::debug!("No .{} for {:?}, skipped", TestCase::EXPECTED_EXT, inputs[&stem]);
                continue;
            };
            cases.push(TestCase::load_pair(stem.clone(), &inputs[&stem], sol)?);
        }

        Ok(Self { name, cases })
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Resolves `<test_root>/<base_name>/` and loads each subdirectory as a group.
pub fn load_groups(test_root: impl AsRef<Path>, base_name: &str) -> Result<Vec<TestGroup>> {
    let root = test_root.as_ref().join(base_name);
    if !root.is_dir() {
        return Err(Error::FixtureNotFound(root));
    }

    let mut dirs = fsutil::list_entries(&root, EntryKind::Dir)?;
    dirs.sort_by(|a, b| {
        let a = a.file_name().unwrap_or_default().to_string_lossy();
        let b = b.file_name().unwrap_or_default().to_string_lossy();
        natural_cmp(&a, &b)
    });

    dirs.iter().map(TestGroup::load).collect()
}

/// Integer names first in numeric order, then the rest lexically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
