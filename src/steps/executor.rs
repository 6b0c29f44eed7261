//! Step execution engine.
//!
//! [`StepRunner`] owns one step instance together with its configuration,
//! its descriptor and the section state of its working directory, and
//! sequences decision → execution → output validation → commit.

use std::fs;
use std::path::{Path, PathBuf};

use super::descriptor::DependencyDescriptor;
use super::events::{StepEvent, StepObserver, TracingObserver};
use super::staleness::{section_hashes, Staleness, StalenessCheck};
use crate::config::{load_config, ConfigTree, DEFAULT_WORKDIR_KEY};
use crate::error::{Result, StatesmanError};
use crate::state::SectionStateStore;

/// Everything a step's execute body may look at.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Working directory; inputs and outputs are relative to it.
    pub workdir: &'a Path,

    /// Path of the configuration file.
    pub config_path: &'a Path,

    /// The configuration as currently loaded.
    pub config: &'a ConfigTree,
}

/// A unit of domain work with declared dependencies.
pub trait Step {
    /// Step name, used in events and error messages.
    fn name(&self) -> &str;

    /// Inputs, outputs and dependent sections of this step.
    ///
    /// Called once, when the step is handed to a [`StepRunner`].
    fn descriptor(&self) -> DependencyDescriptor;

    /// Perform the step's work, writing its declared outputs.
    fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()>;
}

/// Where a step is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// No run in progress.
    Idle,

    /// Evaluating whether the step needs to run.
    Deciding,

    /// Nothing changed; the step was not run.
    Skipped,

    /// The execute body is running.
    Executing,

    /// Checking the declared outputs.
    Validating,

    /// Outputs validated and section hashes recorded.
    Committed,

    /// Execution or validation failed; nothing was recorded.
    Failed,
}

impl StepStatus {
    /// Check if this is a terminal state for the current run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Skipped | StepStatus::Committed | StepStatus::Failed
        )
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Idle => '○',
            StepStatus::Deciding | StepStatus::Executing | StepStatus::Validating => '◉',
            StepStatus::Committed => '✓',
            StepStatus::Failed => '✗',
            StepStatus::Skipped => '⊘',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Idle => "idle",
            StepStatus::Deciding => "deciding",
            StepStatus::Skipped => "skipped",
            StepStatus::Executing => "executing",
            StepStatus::Validating => "validating",
            StepStatus::Committed => "committed",
            StepStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Successful result of [`StepRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The step was up to date.
    Skipped,

    /// The step ran and these section hashes were recorded.
    Committed { sections: Vec<(String, String)> },
}

impl RunOutcome {
    /// Check if the execute body ran.
    pub fn executed(&self) -> bool {
        matches!(self, RunOutcome::Committed { .. })
    }
}

/// Options for constructing a [`StepRunner`].
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Dotted key path selecting the working directory in the config.
    pub workdir_key: String,

    /// Explicit working directory, overriding the config.
    pub workdir: Option<PathBuf>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            workdir_key: DEFAULT_WORKDIR_KEY.to_string(),
            workdir: None,
        }
    }
}

/// Runs one step instance against its configuration and state.
pub struct StepRunner<S: Step> {
    step: S,
    descriptor: DependencyDescriptor,
    config_path: PathBuf,
    config: ConfigTree,
    workdir: PathBuf,
    state: SectionStateStore,
    observer: Box<dyn StepObserver>,
    status: StepStatus,
}

impl<S: Step> StepRunner<S> {
    /// Load the config and section state for a step with default options.
    pub fn new(step: S, config_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(step, config_path, RunnerOptions::default())
    }

    /// Load the config and section state for a step.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound`/`ConfigParseError` if the config cannot be
    /// loaded, `ConfigValidationError` if the workdir key holds a
    /// non-string, and `StateParseError` for a corrupt state file.
    pub fn with_options(
        step: S,
        config_path: impl AsRef<Path>,
        options: RunnerOptions,
    ) -> Result<Self> {
        let config = load_config(config_path.as_ref())?;
        Self::with_config(step, config_path, config, options)
    }

    /// Build a runner around a configuration that is already loaded.
    ///
    /// `config` must be the parsed contents of `config_path`; it is the tree
    /// sections are hashed from until [`reload_config`](Self::reload_config).
    pub fn with_config(
        step: S,
        config_path: impl AsRef<Path>,
        config: ConfigTree,
        options: RunnerOptions,
    ) -> Result<Self> {
        let config_path = std::path::absolute(config_path.as_ref())?;

        let workdir = match options.workdir {
            Some(dir) => std::path::absolute(dir)?,
            None => config.resolve_workdir(&config_path, &options.workdir_key)?,
        };
        let state = SectionStateStore::load(&workdir)?;
        let descriptor = step.descriptor();

        tracing::debug!(
            step = step.name(),
            workdir = %workdir.display(),
            config = %config_path.display(),
            "step loaded"
        );

        Ok(Self {
            step,
            descriptor,
            config_path,
            config,
            workdir,
            state,
            observer: Box::new(TracingObserver),
            status: StepStatus::Idle,
        })
    }

    /// Replace the event observer.
    pub fn with_observer(mut self, observer: impl StepObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Re-read the configuration file.
    ///
    /// The working directory and section state are kept as they are.
    pub fn reload_config(&mut self) -> Result<()> {
        self.config = load_config(&self.config_path)?;
        Ok(())
    }

    /// Evaluate whether the step needs to run, with the reason.
    pub fn check(&self) -> Result<Staleness> {
        StalenessCheck::new(
            &self.descriptor,
            &self.workdir,
            &self.config_path,
            &self.config,
            &self.state,
        )
        .evaluate()
    }

    /// Check if the step needs to run.
    pub fn needs_run(&self) -> Result<bool> {
        Ok(self.check()?.needs_run())
    }

    /// Run the step if it is stale, or unconditionally when `force` is set.
    ///
    /// Section hashes are captured before the execute body runs and are
    /// recorded only after every declared output is present and non-empty.
    ///
    /// # Errors
    ///
    /// - `Callback` if the execute body fails
    /// - `OutputContractViolation` if an output is missing or empty afterwards
    /// - `InvalidKey` if a dependent section cannot be hashed
    pub fn run(&mut self, force: bool) -> Result<RunOutcome> {
        self.status = StepStatus::Deciding;

        let verdict = match self.check() {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };

        if let Staleness::Stale(reason) = &verdict {
            let event = StepEvent::from_reason(self.step.name(), reason);
            self.emit(event);
        } else if !force {
            self.status = StepStatus::Skipped;
            self.emit(StepEvent::Skipped {
                step: self.step.name().to_string(),
            });
            return Ok(RunOutcome::Skipped);
        }

        let snapshot = match section_hashes(&self.descriptor, &self.config) {
            Ok(s) => s,
            Err(e) => return Err(self.fail(e)),
        };

        self.status = StepStatus::Executing;
        self.emit(StepEvent::Executing {
            step: self.step.name().to_string(),
            forced: force,
        });

        let ctx = StepContext {
            workdir: &self.workdir,
            config_path: &self.config_path,
            config: &self.config,
        };
        if let Err(e) = self.step.execute(&ctx) {
            return Err(self.fail(StatesmanError::Callback(e)));
        }

        self.status = StepStatus::Validating;
        if let Err(e) = self.validate_outputs() {
            return Err(self.fail(e));
        }

        for (section, hash) in &snapshot {
            if let Err(e) = self.state.save(section, hash) {
                return Err(self.fail(e));
            }
        }

        self.status = StepStatus::Committed;
        self.emit(StepEvent::Committed {
            step: self.step.name().to_string(),
            sections: snapshot.iter().map(|(s, _)| s.clone()).collect(),
        });

        Ok(RunOutcome::Committed { sections: snapshot })
    }

    fn validate_outputs(&self) -> Result<()> {
        for output in self.descriptor.outputs() {
            let reason = match fs::metadata(self.workdir.join(output)) {
                Err(_) => "file does not exist",
                Ok(m) if m.len() == 0 => "file is empty",
                Ok(_) => continue,
            };

            return Err(StatesmanError::OutputContractViolation {
                step: self.step.name().to_string(),
                output: output.clone(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, error: StatesmanError) -> StatesmanError {
        self.status = StepStatus::Failed;
        self.emit(StepEvent::Failed {
            step: self.step.name().to_string(),
            message: error.to_string(),
        });
        error
    }

    fn emit(&mut self, event: StepEvent) {
        self.observer.on_event(&event);
    }

    /// Status of the current or most recent run.
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// The wrapped step.
    pub fn step(&self) -> &S {
        &self.step
    }

    /// The step's descriptor, as captured at construction.
    pub fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    /// Resolved working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Absolute path of the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The configuration as currently loaded.
    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    /// Recorded section hashes for the working directory.
    pub fn state(&self) -> &SectionStateStore {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::events::RecordingObserver;
    use crate::steps::FileDependency;
    use std::cell::Cell;
    use std::fs::File;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Writes `out.json` from the `geom` section and counts invocations.
    struct GeomStep {
        descriptor: DependencyDescriptor,
        runs: Rc<Cell<usize>>,
        write_output: bool,
        fail_with: Option<&'static str>,
    }

    impl GeomStep {
        fn new(runs: Rc<Cell<usize>>) -> Self {
            Self {
                descriptor: DependencyDescriptor::default()
                    .with_output("out.json")
                    .with_section("geom"),
                runs,
                write_output: true,
                fail_with: None,
            }
        }
    }

    impl Step for GeomStep {
        fn name(&self) -> &str {
            "geom_step"
        }

        fn descriptor(&self) -> DependencyDescriptor {
            self.descriptor.clone()
        }

        fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
            self.runs.set(self.runs.get() + 1);
            if let Some(message) = self.fail_with {
                anyhow::bail!(message);
            }
            if self.write_output {
                let geom = serde_json::to_string(&ctx.config.section("geom"))?;
                fs::create_dir_all(ctx.workdir)?;
                fs::write(ctx.workdir.join("out.json"), geom)?;
            }
            Ok(())
        }
    }

    fn setup(config: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, config).unwrap();
        (temp, path)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn first_run_executes_then_fresh() {
        let (_temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut runner = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();

        assert!(runner.needs_run().unwrap());
        let outcome = runner.run(false).unwrap();

        assert!(outcome.executed());
        assert_eq!(runner.status(), StepStatus::Committed);
        assert_eq!(runs.get(), 1);
        assert!(!runner.needs_run().unwrap());
    }

    #[test]
    fn repeated_run_is_idempotent() {
        let (_temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut runner = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();

        runner.run(false).unwrap();
        assert_eq!(runner.run(false).unwrap(), RunOutcome::Skipped);
        assert_eq!(runner.run(false).unwrap(), RunOutcome::Skipped);

        assert_eq!(runs.get(), 1);
        assert_eq!(runner.status(), StepStatus::Skipped);
    }

    #[test]
    fn force_runs_fresh_step() {
        let (_temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut runner = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();

        runner.run(false).unwrap();
        let outcome = runner.run(true).unwrap();

        assert!(outcome.executed());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn section_change_after_reload_triggers_rerun() {
        let (_temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut runner = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();

        runner.run(false).unwrap();
        let first = runner.state().get("geom").unwrap().to_string();

        fs::write(&config, "geom: {x: 2}").unwrap();
        assert!(!runner.needs_run().unwrap(), "reload is caller-driven");

        runner.reload_config().unwrap();
        assert!(runner.needs_run().unwrap());

        runner.run(false).unwrap();
        assert_eq!(runs.get(), 2);
        assert_ne!(runner.state().get("geom").unwrap(), first);
    }

    #[test]
    fn key_reorder_does_not_trigger_rerun() {
        let (_temp, config) = setup("geom: {x: 1, y: 2}");
        let runs = Rc::new(Cell::new(0));
        let mut runner = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();

        runner.run(false).unwrap();
        fs::write(&config, "geom:\n  y: 2\n  x: 1\n").unwrap();
        runner.reload_config().unwrap();

        assert!(!runner.needs_run().unwrap());
    }

    #[test]
    fn missing_output_after_execute_fails_without_commit() {
        let (_temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut step = GeomStep::new(runs.clone());
        step.write_output = false;
        let mut runner = StepRunner::new(step, &config).unwrap();

        let err = runner.run(false).unwrap_err();

        assert!(matches!(
            err,
            StatesmanError::OutputContractViolation { .. }
        ));
        assert_eq!(runner.status(), StepStatus::Failed);
        assert!(runner.state().get("geom").is_none());
        assert!(!runner.state().path().exists());
        assert!(runner.needs_run().unwrap());
    }

    #[test]
    fn failed_commit_keeps_previous_hash_and_retries() {
        let (temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut runner = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();
        runner.run(false).unwrap();
        let committed = runner.state().get("geom").unwrap().to_string();

        // Change the config and make the step stop producing its output.
        fs::write(&config, "geom: {x: 2}").unwrap();
        fs::remove_file(temp.path().join("out.json")).unwrap();
        let mut step = GeomStep::new(runs.clone());
        step.write_output = false;
        let mut broken = StepRunner::new(step, &config).unwrap();

        assert!(broken.run(false).is_err());
        let persisted = SectionStateStore::load(temp.path()).unwrap();
        assert_eq!(persisted.get("geom"), Some(committed.as_str()));

        let mut fixed = StepRunner::new(GeomStep::new(runs.clone()), &config).unwrap();
        assert!(fixed.run(false).unwrap().executed());
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn callback_error_propagates_unchanged() {
        let (_temp, config) = setup("geom: {x: 1}");
        let runs = Rc::new(Cell::new(0));
        let mut step = GeomStep::new(runs);
        step.fail_with = Some("solver diverged");
        let mut runner = StepRunner::new(step, &config).unwrap();

        let err = runner.run(false).unwrap_err();

        assert_eq!(err.to_string(), "solver diverged");
        assert!(matches!(err, StatesmanError::Callback(_)));
        assert_eq!(runner.status(), StepStatus::Failed);
        assert!(runner.state().sections().is_empty());
    }

    #[test]
    fn snapshot_is_taken_before_execute() {
        struct EditsConfig {
            config_path: PathBuf,
        }

        impl Step for EditsConfig {
            fn name(&self) -> &str {
                "edits_config"
            }

            fn descriptor(&self) -> DependencyDescriptor {
                DependencyDescriptor::default()
                    .with_output("out.json")
                    .with_section("geom")
            }

            fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
                fs::write(&self.config_path, "geom: {x: 99}")?;
                fs::write(ctx.workdir.join("out.json"), "{}")?;
                Ok(())
            }
        }

        let (_temp, config) = setup("geom: {x: 1}");
        let expected =
            crate::config::hash_section(&serde_yaml::from_str("{x: 1}").unwrap()).unwrap();
        let mut runner = StepRunner::new(
            EditsConfig {
                config_path: config.clone(),
            },
            &config,
        )
        .unwrap();

        runner.run(false).unwrap();
        assert_eq!(runner.state().get("geom"), Some(expected.as_str()));

        runner.reload_config().unwrap();
        assert!(runner.needs_run().unwrap());
    }

    #[test]
    fn input_newer_than_output_flips_verdict() {
        struct CopyStep;

        impl Step for CopyStep {
            fn name(&self) -> &str {
                "copy"
            }

            fn descriptor(&self) -> DependencyDescriptor {
                DependencyDescriptor::default()
                    .with_input("in.json")
                    .with_output("out.json")
            }

            fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
                fs::copy(ctx.workdir.join("in.json"), ctx.workdir.join("out.json"))?;
                Ok(())
            }
        }

        let (temp, config) = setup("a: 1");
        let input = temp.path().join("in.json");
        fs::write(&input, "{\"v\": 1}").unwrap();
        set_mtime(&input, SystemTime::now() - Duration::from_secs(60));

        let mut runner = StepRunner::new(CopyStep, &config).unwrap();
        runner.run(false).unwrap();
        assert!(!runner.needs_run().unwrap());

        set_mtime(&input, SystemTime::now() + Duration::from_secs(60));
        assert!(runner.needs_run().unwrap());
    }

    #[test]
    fn input_older_than_config_needs_run() {
        struct Reads;

        impl Step for Reads {
            fn name(&self) -> &str {
                "reads"
            }

            fn descriptor(&self) -> DependencyDescriptor {
                DependencyDescriptor::default()
                    .with_input(FileDependency::new("in.json").newer_than_config())
                    .with_output("out.json")
            }

            fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
                fs::write(ctx.workdir.join("out.json"), "{}")?;
                Ok(())
            }
        }

        let (temp, config) = setup("a: 1");
        let input = temp.path().join("in.json");
        fs::write(&input, "{}").unwrap();
        fs::write(temp.path().join("out.json"), "{}").unwrap();
        set_mtime(&input, SystemTime::now() - Duration::from_secs(600));

        let runner = StepRunner::new(Reads, &config).unwrap();
        assert!(runner.needs_run().unwrap());
    }

    #[test]
    fn observer_receives_decision_and_commit_events() {
        let (_temp, config) = setup("geom: {x: 1}");
        let recorder = RecordingObserver::new();
        let mut runner = StepRunner::new(GeomStep::new(Rc::new(Cell::new(0))), &config)
            .unwrap()
            .with_observer(recorder.clone());

        runner.run(false).unwrap();
        runner.run(false).unwrap();

        let events = recorder.events();
        assert!(matches!(events[0], StepEvent::OutputStale { .. }));
        assert!(matches!(events[1], StepEvent::Executing { forced: false, .. }));
        assert_eq!(
            events[2],
            StepEvent::Committed {
                step: "geom_step".to_string(),
                sections: vec!["geom".to_string()],
            }
        );
        assert!(matches!(events[3], StepEvent::Skipped { .. }));
    }

    #[test]
    fn observer_sees_section_change() {
        let (_temp, config) = setup("geom: {x: 1}");
        let recorder = RecordingObserver::new();
        let mut runner = StepRunner::new(GeomStep::new(Rc::new(Cell::new(0))), &config)
            .unwrap()
            .with_observer(recorder.clone());
        runner.run(false).unwrap();
        recorder.clear();

        fs::write(&config, "geom: {x: 3}").unwrap();
        runner.reload_config().unwrap();
        runner.run(false).unwrap();

        match &recorder.events()[0] {
            StepEvent::SectionChanged {
                section, previous, ..
            } => {
                assert_eq!(section, "geom");
                assert!(previous.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn workdir_comes_from_config() {
        let (temp, config) = setup("general: {workdir: run}\ngeom: {x: 1}");
        let mut runner = StepRunner::new(GeomStep::new(Rc::new(Cell::new(0))), &config).unwrap();

        assert_eq!(runner.workdir(), temp.path().join("run"));
        runner.run(false).unwrap();
        assert!(temp.path().join("run").join("out.json").exists());
        assert!(temp
            .path()
            .join("run")
            .join(crate::state::STATE_FILE_NAME)
            .exists());
    }

    #[test]
    fn explicit_workdir_overrides_config() {
        let (temp, config) = setup("general: {workdir: run}\ngeom: {x: 1}");
        let options = RunnerOptions {
            workdir: Some(temp.path().join("elsewhere")),
            ..Default::default()
        };
        let runner =
            StepRunner::with_options(GeomStep::new(Rc::new(Cell::new(0))), &config, options)
                .unwrap();

        assert_eq!(runner.workdir(), temp.path().join("elsewhere"));
    }

    #[test]
    fn missing_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = StepRunner::new(
            GeomStep::new(Rc::new(Cell::new(0))),
            temp.path().join("missing.yml"),
        );
        assert!(matches!(result, Err(StatesmanError::ConfigNotFound { .. })));
    }

    #[test]
    fn step_status_is_terminal() {
        assert!(!StepStatus::Idle.is_terminal());
        assert!(!StepStatus::Deciding.is_terminal());
        assert!(!StepStatus::Executing.is_terminal());
        assert!(!StepStatus::Validating.is_terminal());
        assert!(StepStatus::Skipped.is_terminal());
        assert!(StepStatus::Committed.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
    }

    #[test]
    fn step_status_display() {
        assert_eq!(format!("{}", StepStatus::Idle), "idle");
        assert_eq!(format!("{}", StepStatus::Committed), "committed");
        assert_eq!(StepStatus::Failed.display_char(), '✗');
    }
}
