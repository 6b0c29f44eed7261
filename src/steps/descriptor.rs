//! Declarative step dependencies.
//!
//! A [`DependencyDescriptor`] lists the files a step reads, the files it
//! promises to write and the configuration sections it depends on. Each
//! step owns its own descriptor; it is never mutated after construction.
//!
//! Describing a dependency and checking whether it currently holds are
//! separate: [`FileDependency::check`] classifies the file on disk into an
//! [`InputStatus`] instead of failing.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What an input must be newer than.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// The configuration file the step was loaded from.
    ConfigFile,

    /// Another path, resolved under the working directory when relative.
    Path(PathBuf),
}

impl Reference {
    /// Resolve the reference to a concrete path.
    pub fn resolve(&self, workdir: &Path, config_path: &Path) -> PathBuf {
        match self {
            Reference::ConfigFile => config_path.to_path_buf(),
            Reference::Path(path) => workdir.join(path),
        }
    }
}

/// A declared input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDependency {
    /// Path relative to the working directory.
    pub name: String,

    /// Whether the file must have a non-zero size.
    pub non_empty: bool,

    /// Optional recency constraint.
    pub newer_than: Option<Reference>,
}

/// Classification of an input file against its declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum InputStatus {
    /// The input satisfies every constraint.
    Valid,

    /// The input does not exist.
    Missing { path: PathBuf },

    /// The input exists but is empty while `non_empty` was requested.
    Empty { path: PathBuf },

    /// The input is not strictly newer than its reference.
    NotNewer {
        path: PathBuf,
        reference: PathBuf,
        modified: DateTime<Utc>,
        reference_modified: DateTime<Utc>,
    },
}

impl InputStatus {
    /// Check if the input satisfies its declaration.
    pub fn is_valid(&self) -> bool {
        matches!(self, InputStatus::Valid)
    }
}

impl FileDependency {
    /// Declare an input that must exist and be non-empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            non_empty: true,
            newer_than: None,
        }
    }

    /// Accept an empty file.
    pub fn allow_empty(mut self) -> Self {
        self.non_empty = false;
        self
    }

    /// Require the input to be newer than the configuration file.
    pub fn newer_than_config(mut self) -> Self {
        self.newer_than = Some(Reference::ConfigFile);
        self
    }

    /// Require the input to be newer than another path.
    pub fn newer_than(mut self, path: impl Into<PathBuf>) -> Self {
        self.newer_than = Some(Reference::Path(path.into()));
        self
    }

    /// Resolve this input under a working directory.
    pub fn path_in(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.name)
    }

    /// Classify the file on disk against this declaration.
    ///
    /// A missing reference counts as the oldest possible file, so only the
    /// input's own state can make this check fail.
    pub fn check(&self, workdir: &Path, config_path: &Path) -> InputStatus {
        let path = self.path_in(workdir);

        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => return InputStatus::Missing { path },
        };

        if self.non_empty && metadata.len() == 0 {
            return InputStatus::Empty { path };
        }

        if let Some(reference) = &self.newer_than {
            let reference = reference.resolve(workdir, config_path);
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let reference_modified = mtime_or_epoch(&reference);

            if modified <= reference_modified {
                return InputStatus::NotNewer {
                    path,
                    reference,
                    modified: modified.into(),
                    reference_modified: reference_modified.into(),
                };
            }
        }

        InputStatus::Valid
    }
}

impl From<&str> for FileDependency {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The inputs, outputs and dependent sections of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDescriptor {
    inputs: Vec<FileDependency>,
    outputs: Vec<String>,
    sections: Vec<String>,
}

impl DependencyDescriptor {
    /// Create a descriptor. Duplicate names are collapsed, first one wins.
    pub fn new<I, O, S>(inputs: I, outputs: O, sections: S) -> Self
    where
        I: IntoIterator<Item = FileDependency>,
        O: IntoIterator,
        O::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let mut descriptor = Self::default();
        for input in inputs {
            descriptor = descriptor.with_input(input);
        }
        for output in outputs {
            descriptor = descriptor.with_output(output);
        }
        for section in sections {
            descriptor = descriptor.with_section(section);
        }
        descriptor
    }

    /// Add an input.
    pub fn with_input(mut self, input: impl Into<FileDependency>) -> Self {
        let input = input.into();
        if !self.inputs.iter().any(|i| i.name == input.name) {
            self.inputs.push(input);
        }
        self
    }

    /// Add an output.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        push_unique(&mut self.outputs, output.into());
        self
    }

    /// Add a dependent section.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        push_unique(&mut self.sections, section.into());
        self
    }

    /// Declared inputs.
    pub fn inputs(&self) -> &[FileDependency] {
        &self.inputs
    }

    /// Declared outputs, relative to the working directory.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Dependent configuration sections.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Modification time of a path, or the epoch if it cannot be read.
pub(crate) fn mtime_or_epoch(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
