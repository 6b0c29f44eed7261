//! Steps declared in the configuration file.
//!
//! A `steps:` mapping at the top of the configuration declares command
//! steps: a shell command plus its inputs, outputs and dependent sections.
//!
//! ```yaml
//! steps:
//!   mesh:
//!     command: python mesh.py
//!     inputs:
//!       - geometry.json
//!       - { name: params.json, newer_than_config: true }
//!     outputs: [mesh.vtu]
//!     sections: [mesh]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::descriptor::{DependencyDescriptor, FileDependency};
use super::executor::{Step, StepContext};
use crate::config::ConfigTree;
use crate::error::{Result, StatesmanError};
use crate::shell::{execute, CommandOptions};

/// Top-level configuration key holding step declarations.
pub const STEPS_KEY: &str = "steps";

/// Configuration for a single command step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Step description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Shell command to execute
    pub command: String,

    /// Files the command reads
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputConfig>,

    /// Files the command must produce
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,

    /// Configuration sections the command depends on
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<String>,

    /// Extra environment variables for the command
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// An input declaration: a bare file name or a detailed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputConfig {
    /// File name; must exist and be non-empty.
    Name(String),

    /// File with explicit constraints.
    Detailed {
        name: String,
        #[serde(default = "default_true")]
        non_empty: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        newer_than: Option<String>,
        #[serde(default)]
        newer_than_config: bool,
    },
}

fn default_true() -> bool {
    true
}

impl InputConfig {
    /// Convert to a [`FileDependency`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if both `newer_than` and
    /// `newer_than_config` are set.
    pub fn to_dependency(&self) -> Result<FileDependency> {
        match self {
            InputConfig::Name(name) => Ok(FileDependency::new(name.as_str())),
            InputConfig::Detailed {
                name,
                non_empty,
                newer_than,
                newer_than_config,
            } => {
                let mut dep = FileDependency::new(name.as_str());
                dep.non_empty = *non_empty;
                match (newer_than, newer_than_config) {
                    (Some(_), true) => {
                        return Err(StatesmanError::ConfigValidationError {
                            message: format!(
                                "input '{}' sets both newer_than and newer_than_config",
                                name
                            ),
                        })
                    }
                    (Some(path), false) => dep = dep.newer_than(path),
                    (None, true) => dep = dep.newer_than_config(),
                    (None, false) => {}
                }
                Ok(dep)
            }
        }
    }
}

/// Parse every step declared in the configuration.
///
/// A configuration without a `steps:` key declares no steps.
pub fn step_definitions(config: &ConfigTree) -> Result<BTreeMap<String, StepConfig>> {
    match config.get(STEPS_KEY) {
        None | Some(serde_yaml::Value::Null) => Ok(BTreeMap::new()),
        Some(value) => serde_yaml::from_value(value.clone()).map_err(|e| {
            StatesmanError::ConfigValidationError {
                message: format!("invalid '{}' declaration: {}", STEPS_KEY, e),
            }
        }),
    }
}

/// A step whose work is a shell command.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: String,
    config: StepConfig,
    descriptor: DependencyDescriptor,
}

impl CommandStep {
    /// Build a step from its declaration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if the command is empty or an input
    /// declaration is contradictory.
    pub fn from_config(name: &str, config: &StepConfig) -> Result<Self> {
        if config.command.trim().is_empty() {
            return Err(StatesmanError::ConfigValidationError {
                message: format!("step '{}' has no command to execute", name),
            });
        }

        let inputs = config
            .inputs
            .iter()
            .map(InputConfig::to_dependency)
            .collect::<Result<Vec<_>>>()?;
        let descriptor = DependencyDescriptor::new(
            inputs,
            config.outputs.iter().cloned(),
            config.sections.iter().cloned(),
        );

        Ok(Self {
            name: name.to_string(),
            config: config.clone(),
            descriptor,
        })
    }

    /// Look up a declared step by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if no step with that name is declared.
    pub fn load(config: &ConfigTree, name: &str) -> Result<Self> {
        let definitions = step_definitions(config)?;
        let definition =
            definitions
                .get(name)
                .ok_or_else(|| StatesmanError::ConfigValidationError {
                    message: if definitions.is_empty() {
                        format!("unknown step '{}': no steps are declared", name)
                    } else {
                        format!(
                            "unknown step '{}' (declared: {})",
                            name,
                            definitions.keys().cloned().collect::<Vec<_>>().join(", ")
                        )
                    },
                })?;
        Self::from_config(name, definition)
    }

    /// The shell command.
    pub fn command(&self) -> &str {
        &self.config.command
    }

    /// The step's description, if any.
    pub fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }
}

impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> DependencyDescriptor {
        self.descriptor.clone()
    }

    fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
        std::fs::create_dir_all(ctx.workdir)?;

        let mut env = self.config.env.clone();
        env.insert(
            "STATESMAN_WORKDIR".to_string(),
            ctx.workdir.display().to_string(),
        );
        env.insert(
            "STATESMAN_CONFIG".to_string(),
            ctx.config_path.display().to_string(),
        );
        env.insert("STATESMAN_STEP".to_string(), self.name.clone());

        let options = CommandOptions {
            cwd: Some(ctx.workdir.to_path_buf()),
            env,
            ..Default::default()
        };

        let result = execute(&self.config.command, &options)?;
        if !result.success {
            return Err(StatesmanError::CommandFailed {
                command: self.config.command.clone(),
                code: result.exit_code,
            }
            .into());
        }

        tracing::debug!(step = %self.name, duration_ms = result.duration.as_millis() as u64, "command finished");
        Ok(())
    }
}
