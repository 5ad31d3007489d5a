use std::path::Path;

use serde::Serialize;

/// Programming languages the judge knows how to run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    Python,
    C,
    Cpp,
    Java,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Php,
    Unknown,
}

impl Language {
    /// Detects the language from the extension of the last path component.
    /// Names without any `.` and unlisted extensions are `Unknown`.
    /// ```
    /// use dojo_core::Language;
    ///
    /// assert_eq!(Language::detect("postes.py"), Language::Python);
    /// assert_eq!(Language::detect("dir.v2/Main.JAVA"), Language::Java);
    /// assert_eq!(Language::detect("README"), Language::Unknown);
    /// ```
    pub fn detect(file_name: impl AsRef<Path>) -> Self {
        let Some(name) = file_name.as_ref().file_name() else {
            return Language::Unknown;
        };
        let name = name.to_string_lossy();
        let Some((_, ext)) = fsutil::split_ext(&name) else {
            return Language::Unknown;
        };
        Self::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Self {
        use Language::*;
        match ext.to_ascii_lowercase().as_str() {
            "py" => Python,
            "c" => C,
            "cpp" | "cc" | "cxx" => Cpp,
            "java" => Java,
            "js" => JavaScript,
            "ts" => TypeScript,
            "go" => Go,
            "rs" => Rust,
            "php" => Php,
            _ => Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Language::Unknown
    }

    /// Key used for this language in the `[toolchain]` table of the config file.
    pub fn config_key(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod test {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn detect_known_extensions() {
        let table = [
            ("a.py", Language::Python),
            ("a.c", Language::C),
            ("a.cpp", Language::Cpp),
            ("a.cc", Language::Cpp),
            ("Main.java", Language::Java),
            ("a.js", Language::JavaScript),
            ("a.ts", Language::TypeScript),
            ("a.go", Language::Go),
            ("a.rs", Language::Rust),
            ("a.php", Language::Php),
        ];
        for (name, want) in table {
            assert_eq!(Language::detect(name), want, "{}", name);
        }
    }

    #[test]
    fn detect_is_case_insensitive_and_prefix_independent() {
        for name in ["x.PY", "x.Py", "/tmp/a.b/x.py", "./dir/sub/x.py", "x.y.py"] {
            assert_eq!(Language::detect(name), Language::Python, "{}", name);
        }
    }

    #[test]
    fn detect_unknown() {
        for name in ["x.rb", "x", "py", "dir.py/x", "x.", ""] {
            assert_eq!(Language::detect(name), Language::Unknown, "{:?}", name);
        }
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Language::JavaScript.to_string(), "javascript");
        assert_eq!(Language::Cpp.config_key(), "cpp");
        for lang in Language::iter() {
            assert_eq!(lang.to_string(), lang.to_string().to_lowercase());
        }
    }
}
