use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A programming language accepted for submissions
///
/// Every variant has exactly one row in [`LANGUAGES`]; the variant's
/// discriminant is its row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    C = 0,
    Cpp = 1,
    Java = 2,
    Python = 3,
}

/// Per-language facts needed to materialize and invoke a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    /// The language this row describes
    pub language: Language,

    /// Human-readable name (e.g., "C++")
    pub name: &'static str,

    /// Canonical source file name inside `src/`
    pub file_name: &'static str,

    /// Language argument understood by the sandbox image
    pub sandbox_tag: &'static str,

    /// File extension without the dot
    pub extension: &'static str,
}

/// Language lookup table, indexed by `Language as usize`
pub const LANGUAGES: [LanguageSpec; 4] = [
    LanguageSpec {
        language: Language::C,
        name: "C",
        file_name: "main.c",
        sandbox_tag: "C",
        extension: "c",
    },
    LanguageSpec {
        language: Language::Cpp,
        name: "C++",
        file_name: "main.cpp",
        sandbox_tag: "CPP",
        extension: "cpp",
    },
    LanguageSpec {
        language: Language::Java,
        name: "Java",
        file_name: "Main.java",
        sandbox_tag: "JAVA",
        extension: "java",
    },
    LanguageSpec {
        language: Language::Python,
        name: "Python 3",
        file_name: "main.py",
        sandbox_tag: "PYTHON",
        extension: "py",
    },
];

impl Language {
    /// All supported languages in table order
    pub const ALL: [Language; 4] = [Language::C, Language::Cpp, Language::Java, Language::Python];

    /// Look up this language's table row
    pub fn spec(self) -> &'static LanguageSpec {
        &LANGUAGES[self as usize]
    }

    /// Canonical source file name (e.g., "main.cpp")
    pub fn file_name(self) -> &'static str {
        self.spec().file_name
    }

    /// Argument passed to the sandbox image (e.g., "CPP")
    pub fn sandbox_tag(self) -> &'static str {
        self.spec().sandbox_tag
    }

    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        self.spec().extension
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let language = match lower.as_str() {
            "c" => Language::C,
            "cpp" | "c++" | "cxx" => Language::Cpp,
            "java" => Language::Java,
            "python" | "python3" | "py" => Language::Python,
            _ => return Err(ConfigError::UnsupportedLanguage(s.to_string())),
        };
        Ok(language)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sandbox_tag())
    }
}
