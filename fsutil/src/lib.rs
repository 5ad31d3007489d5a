use std::{
    fs::{self, ReadDir},
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("{0} (from='{1}', to='{2}'): {3}")]
        FromToIO(Msg, PathBuf, PathBuf, #[source] io::Error),
    }

    impl Error {
        /// Path the failed operation was acting on (the source path for copies).
        pub fn path(&self) -> &std::path::Path {
            match self {
                Error::SingleIO(_, path, _) => path,
                Error::FromToIO(_, from, _, _) => from,
            }
        }

        pub fn io_error(&self) -> &io::Error {
            match self {
                Error::SingleIO(_, _, e) | Error::FromToIO(_, _, _, e) => e,
            }
        }
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

/// Reads a file as text, replacing invalid UTF-8 sequences instead of failing.
#[must_use]
pub fn read_to_string_lossy(filepath: impl AsRef<Path>) -> Result<String> {
    let bytes = fs::read(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

#[must_use]
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    fs::copy(&from, &to).map_err(|e| {
        Error::FromToIO(
            "Cannot copy file",
            from.as_ref().to_owned(),
            to.as_ref().to_owned(),
            e,
        )
    })
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// Lists the immediate entries of `dir` having the given kind, in listing order.
/// Entries whose type cannot be determined are skipped.
pub fn list_entries(dir: impl AsRef<Path>, kind: EntryKind) -> Result<Vec<PathBuf>> {
    let mut res = Vec::new();
    for entry in self::read_dir(&dir)?.filter_map(std::result::Result::ok) {
        let Ok(ft) = entry.file_type() else {
            log::warn!("Cannot get filetype of {:?}, skipped", entry.path());
            continue;
        };
        // follow symlinks so that linked fixture dirs are visited
        let is_dir = if ft.is_symlink() {
            entry.path().is_dir()
        } else {
            ft.is_dir()
        };
        match (kind, is_dir) {
            (EntryKind::Dir, true) | (EntryKind::File, false) => res.push(entry.path()),
            _ => (),
        }
    }
    Ok(res)
}

/// Splits a file name into its stem and the part after the last dot.
/// ```
/// use fsutil::split_ext;
///
/// assert_eq!(split_ext("1.in"), Some(("1", "in")));
/// assert_eq!(split_ext("a.b.sol"), Some(("a.b", "sol")));
/// assert_eq!(split_ext("Makefile"), None);
/// assert_eq!(split_ext(".hidden"), Some(("", "hidden")));
/// ```
pub fn split_ext(filename: &str) -> Option<(&str, &str)> {
    filename.rsplit_once('.')
}
