//! Problem metadata
//!
//! The subset of a problem definition the test runner consumes. It is
//! trusted as given; nothing here is revalidated against the rest of the
//! platform.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Language};
use crate::types::{ResourceLimits, TestCase};

/// How a problem expects submissions to be shaped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionType {
    /// One complete program
    #[default]
    SingleFile,
    /// Student code merged into an instructor template
    FunctionOnly,
    /// A ZIP of sources, optionally built with a Makefile
    MultiFile,
}

/// A published sample
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCase {
    pub input: String,
    #[serde(default)]
    pub output: String,
}

impl SampleCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,

    #[serde(default = "all_languages")]
    pub allowed_languages: Vec<Language>,

    #[serde(default)]
    pub submission_type: SubmissionType,

    #[serde(default)]
    pub samples: Vec<SampleCase>,

    /// Object key of the function template
    #[serde(default)]
    pub template_key: Option<String>,

    /// Object key of the instructor-provided Makefile
    #[serde(default)]
    pub build_file_key: Option<String>,

    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    #[serde(default)]
    pub memory_limit_kb: Option<u64>,
}

fn all_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

impl Problem {
    /// Create a single-file problem accepting every language
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            allowed_languages: all_languages(),
            submission_type: SubmissionType::default(),
            samples: Vec::new(),
            template_key: None,
            build_file_key: None,
            time_limit_ms: None,
            memory_limit_kb: None,
        }
    }

    pub fn with_submission_type(mut self, submission_type: SubmissionType) -> Self {
        self.submission_type = submission_type;
        self
    }

    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.allowed_languages = languages.into_iter().collect();
        self
    }

    pub fn with_sample(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.samples.push(SampleCase::new(input, output));
        self
    }

    pub fn with_template_key(mut self, key: impl Into<String>) -> Self {
        self.template_key = Some(key.into());
        self
    }

    pub fn with_build_file_key(mut self, key: impl Into<String>) -> Self {
        self.build_file_key = Some(key.into());
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_memory_limit_kb(mut self, kb: u64) -> Self {
        self.memory_limit_kb = Some(kb);
        self
    }

    /// Load a problem from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let problem = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;
        Ok(problem.try_deserialize()?)
    }

    /// Parse a problem from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let problem = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(problem.try_deserialize()?)
    }

    /// Check if submissions in `language` are accepted
    pub fn allows(&self, language: Language) -> bool {
        self.allowed_languages.contains(&language)
    }

    /// Run limits declared by the problem, layered over configured defaults
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            time_limit_ms: self.time_limit_ms,
            memory_limit_kb: self.memory_limit_kb,
            ..ResourceLimits::new()
        }
    }

    /// Build the cases for one test run
    ///
    /// A non-empty custom input replaces the samples with a single case
    /// that has no expected output.
    pub fn test_cases(&self, custom_input: Option<&str>) -> Vec<TestCase> {
        if let Some(input) = custom_input.filter(|input| !input.is_empty()) {
            return vec![TestCase::new("Custom Input", input)];
        }

        self.samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                TestCase::new(format!("Sample {}", index + 1), &sample.input)
                    .with_expected(&sample.output)
            })
            .collect()
    }
}
