//! `#{var}` command templates.
//!
//! A template is split on whitespace into argv words first and each word is
//! interpolated afterwards, so a variable whose value contains spaces stays a
//! single argument and no shell is involved. `##` produces a literal `#`.

use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
    fmt,
};

use serde::{
    de::{self, Visitor},
    Deserialize, Serialize,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("Undefined variable '{0}' in '{1}'")]
    UndefinedVar(String, String),

    #[error("Unclosed brace (found open brace at {})", .0+1)]
    UnclosedBrace(usize),

    #[error("Empty command template")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Lit(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    words: Vec<Vec<Piece>>,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self, InterpError> {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum State {
            Normal,
            HashMark,
            InsideBrace,
        }
        use State::*;

        let mut words = Vec::new();
        let mut offset = 0;
        for word in template.split_whitespace() {
            // position of this word inside the template, for error reporting
            let start = template[offset..].find(word).map_or(offset, |i| offset + i);
            offset = start + word.len();

            let mut pieces = Vec::new();
            let mut lit = String::new();
            let mut var_name = String::new();
            let mut state = Normal;
            let mut pos_open_brace = 0;

            for (i, c) in word.char_indices() {
                match (c, state) {
                    ('#', Normal) => {
                        state = HashMark;
                        lit.push(c);
                    }
                    ('#', HashMark) => {
                        state = Normal;
                    }
                    ('{', HashMark) => {
                        state = InsideBrace;
                        pos_open_brace = start + i - 1;
                        lit.pop(); // remove '#'
                        if !lit.is_empty() {
                            pieces.push(Piece::Lit(std::mem::take(&mut lit)));
                        }
                        var_name.clear();
                    }
                    ('}', InsideBrace) => {
                        state = Normal;
                        pieces.push(Piece::Var(std::mem::take(&mut var_name)));
                    }
                    (_, InsideBrace) => var_name.push(c),
                    _ => {
                        state = Normal;
                        lit.push(c);
                    }
                }
            }

            if state == InsideBrace {
                return Err(InterpError::UnclosedBrace(pos_open_brace));
            }
            if !lit.is_empty() {
                pieces.push(Piece::Lit(lit));
            }
            words.push(pieces);
        }

        if words.is_empty() {
            return Err(InterpError::Empty);
        }
        Ok(Self {
            source: template.to_owned(),
            words,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of every variable referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.words.iter().flatten().filter_map(|p| match p {
            Piece::Var(name) => Some(name.as_str()),
            Piece::Lit(_) => None,
        })
    }

    pub fn expand<V>(&self, variables: &HashMap<&str, V>) -> Result<Vec<OsString>, InterpError>
    where
        V: AsRef<OsStr>,
    {
        let mut argv = Vec::with_capacity(self.words.len());
        for pieces in &self.words {
            let mut arg = OsString::new();
            for p in pieces {
                match p {
                    Piece::Lit(s) => arg.push(s),
                    Piece::Var(name) => {
                        let Some(value) = variables.get(name.as_str()) else {
                            return Err(InterpError::UndefinedVar(name.clone(), self.source.clone()));
                        };
                        arg.push(value);
                    }
                }
            }
            argv.push(arg);
        }
        Ok(argv)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for CommandTemplate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CommandTemplate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct CommandTemplateVisitor;

        impl<'de> Visitor<'de> for CommandTemplateVisitor {
            type Value = CommandTemplate;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a command template string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                CommandTemplate::parse(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(CommandTemplateVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars() -> HashMap<&'static str, &'static str> {
        let mut m = HashMap::new();
        m.insert("src", "/tmp/my dir/Main.java");
        m.insert("exe", "/tmp/x/program");
        m.insert("unit", "Main");
        m
    }

    fn expand(t: &str) -> Vec<String> {
        CommandTemplate::parse(t)
            .unwrap()
            .expand(&vars())
            .unwrap()
            .into_iter()
            .map(|s| s.into_string().unwrap())
            .collect()
    }

    #[test]
    fn expand_ok() {
        assert_eq!(expand("python3 #{src}"), ["python3", "/tmp/my dir/Main.java"]);
        assert_eq!(
            expand("g++  -O2 -o #{exe}   #{src}"),
            ["g++", "-O2", "-o", "/tmp/x/program", "/tmp/my dir/Main.java"]
        );
        assert_eq!(expand("#{exe}"), ["/tmp/x/program"]);
        assert_eq!(expand("--out=#{exe}.bin"), ["--out=/tmp/x/program.bin"]);
        assert_eq!(expand("java #{unit}#{unit}"), ["java", "MainMain"]);
        assert_eq!(expand("echo {src}"), ["echo", "{src}"]);
        assert_eq!(expand("echo #src"), ["echo", "#src"]);
        assert_eq!(expand("echo ##{src}"), ["echo", "#{src}"]);
        assert_eq!(expand("echo ## #"), ["echo", "#", "#"]);
    }

    #[test]
    fn variables_in_order() {
        let t = CommandTemplate::parse("javac -d #{dir} #{src}").unwrap();
        assert_eq!(t.variables().collect::<Vec<_>>(), ["dir", "src"]);
    }

    #[test]
    fn expand_ng() {
        let t = CommandTemplate::parse("run #{nope}").unwrap();
        assert_eq!(
            t.expand(&vars()).unwrap_err(),
            InterpError::UndefinedVar("nope".to_owned(), "run #{nope}".to_owned())
        );
        assert_eq!(
            CommandTemplate::parse("run #{src").unwrap_err(),
            InterpError::UnclosedBrace(4)
        );
        // byte offset, 'é' takes two bytes
        assert_eq!(
            CommandTemplate::parse("é --x=é#{src").unwrap_err(),
            InterpError::UnclosedBrace(9)
        );
        assert_eq!(CommandTemplate::parse("   ").unwrap_err(), InterpError::Empty);
    }

    #[test]
    fn deserialize_validates() {
        let t: CommandTemplate = serde_json::from_str(r#""node #{src}""#).unwrap();
        assert_eq!(t.as_str(), "node #{src}");
        let res: Result<CommandTemplate, _> = serde_json::from_str(r#""node #{src""#);
        assert!(dbg!(res).is_err());
    }
}
