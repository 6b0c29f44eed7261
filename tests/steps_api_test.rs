//! Integration tests for the steps public API.

use statesman::config::hash_section;
use statesman::state::SectionStateStore;
use statesman::steps::{
    CommandStep, DependencyDescriptor, FileDependency, RecordingObserver, RunOutcome,
    StaleReason, Staleness, Step, StepContext, StepEvent, StepRunner, StepStatus,
};
use statesman::StatesmanError;
use std::cell::Cell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Copies `in.json` to `out.json`, optionally skipping the write.
struct CopyInput {
    descriptor: DependencyDescriptor,
    runs: Rc<Cell<usize>>,
    produce: Rc<Cell<bool>>,
}

impl CopyInput {
    fn new(input: FileDependency) -> Self {
        Self {
            descriptor: DependencyDescriptor::new([input], ["out.json"], ["solver"]),
            runs: Rc::new(Cell::new(0)),
            produce: Rc::new(Cell::new(true)),
        }
    }
}

impl Step for CopyInput {
    fn name(&self) -> &str {
        "copy"
    }

    fn descriptor(&self) -> DependencyDescriptor {
        self.descriptor.clone()
    }

    fn execute(&mut self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
        self.runs.set(self.runs.get() + 1);
        if self.produce.get() {
            let content = fs::read(ctx.workdir.join("in.json"))?;
            fs::write(ctx.workdir.join("out.json"), content)?;
        }
        Ok(())
    }
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("config.yml");
    fs::write(&path, content).unwrap();
    path
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn ago(secs: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(secs)
}

const GEOM_STEP: &str = r#"
steps:
  s1:
    command: echo done > out.json
    outputs: [out.json]
    sections: [geom]
"#;

#[test]
fn section_change_forces_rerun() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), &format!("geom: {{x: 1}}\n{}", GEOM_STEP));
    let config = statesman::config::load_config(&config_path).unwrap();
    let step = CommandStep::load(&config, "s1").unwrap();
    let mut runner = StepRunner::new(step, &config_path).unwrap();

    assert!(runner.needs_run().unwrap());
    assert!(runner.run(false).unwrap().executed());
    assert!(temp.path().join("out.json").exists());
    assert!(!runner.needs_run().unwrap());
    let first = runner.state().get("geom").unwrap().to_string();

    write_config(temp.path(), &format!("geom: {{x: 2}}\n{}", GEOM_STEP));
    assert!(!runner.needs_run().unwrap(), "reload is caller-driven");
    runner.reload_config().unwrap();

    match runner.check().unwrap() {
        Staleness::Stale(StaleReason::SectionChanged {
            section, previous, ..
        }) => {
            assert_eq!(section, "geom");
            assert_eq!(previous.as_deref(), Some(first.as_str()));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }

    assert!(runner.run(false).unwrap().executed());
    let second = runner.state().get("geom").unwrap();
    assert_ne!(first, second);

    let expected: serde_yaml::Value = serde_yaml::from_str("{x: 2}").unwrap();
    assert_eq!(second, hash_section(&expected).unwrap());
}

#[test]
fn input_older_than_config_always_needs_run() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), "solver: {tol: 1.0e-6}\n");
    fs::write(temp.path().join("in.json"), "{}").unwrap();
    set_mtime(&temp.path().join("in.json"), ago(3600));

    let step = CopyInput::new(FileDependency::new("in.json").newer_than_config());
    let mut runner = StepRunner::new(step, &config_path).unwrap();

    match runner.check().unwrap() {
        Staleness::Stale(StaleReason::InputNotNewer { input, .. }) => assert_eq!(input, "in.json"),
        other => panic!("unexpected verdict: {other:?}"),
    }

    // Even with outputs and sections recorded, the verdict stands.
    runner.run(true).unwrap();
    assert!(temp.path().join("out.json").exists());
    assert!(runner.state().get("solver").is_some());
    assert!(runner.needs_run().unwrap());
}

#[test]
fn input_mtime_bump_makes_step_stale() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), "solver: {tol: 0.1}\n");
    let input = temp.path().join("in.json");
    fs::write(&input, "{\"a\": 1}").unwrap();
    set_mtime(&input, ago(60));

    let mut runner = StepRunner::new(CopyInput::new("in.json".into()), &config_path).unwrap();
    runner.run(false).unwrap();
    assert!(!runner.needs_run().unwrap());

    set_mtime(&input, SystemTime::now() + Duration::from_secs(60));
    match runner.check().unwrap() {
        Staleness::Stale(StaleReason::InputNewerThanOutput { input, output, .. }) => {
            assert_eq!(input, "in.json");
            assert_eq!(output, "out.json");
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[test]
fn run_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), "solver: {tol: 0.1}\n");
    fs::write(temp.path().join("in.json"), "{}").unwrap();
    set_mtime(&temp.path().join("in.json"), ago(60));

    let step = CopyInput::new("in.json".into());
    let runs = Rc::clone(&step.runs);
    let mut runner = StepRunner::new(step, &config_path).unwrap();

    assert!(runner.run(false).unwrap().executed());
    assert_eq!(runner.run(false).unwrap(), RunOutcome::Skipped);
    assert_eq!(runner.run(false).unwrap(), RunOutcome::Skipped);
    assert_eq!(runs.get(), 1);
    assert_eq!(runner.status(), StepStatus::Skipped);
}

#[test]
fn missing_output_after_execute_keeps_state_and_retries() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), "solver: {tol: 0.1}\n");
    fs::write(temp.path().join("in.json"), "{}").unwrap();
    set_mtime(&temp.path().join("in.json"), ago(60));

    let step = CopyInput::new("in.json".into());
    let runs = Rc::clone(&step.runs);
    let produce = Rc::clone(&step.produce);
    produce.set(false);

    let recorder = RecordingObserver::new();
    let mut runner = StepRunner::new(step, &config_path)
        .unwrap()
        .with_observer(recorder.clone());

    let err = runner.run(false).unwrap_err();
    assert!(matches!(err, StatesmanError::OutputContractViolation { .. }));
    assert_eq!(runner.status(), StepStatus::Failed);
    assert!(runner.state().get("solver").is_none());
    assert!(SectionStateStore::load(temp.path())
        .unwrap()
        .sections()
        .is_empty());
    assert!(matches!(
        recorder.events().last(),
        Some(StepEvent::Failed { .. })
    ));

    produce.set(true);
    assert!(runner.run(false).unwrap().executed());
    assert_eq!(runs.get(), 2);
    assert!(runner.state().get("solver").is_some());
}

#[test]
fn observer_sees_decision_points_in_order() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), &format!("geom: {{x: 1}}\n{}", GEOM_STEP));
    let config = statesman::config::load_config(&config_path).unwrap();
    let recorder = RecordingObserver::new();
    let mut runner = StepRunner::new(CommandStep::load(&config, "s1").unwrap(), &config_path)
        .unwrap()
        .with_observer(recorder.clone());

    runner.run(false).unwrap();
    runner.run(false).unwrap();

    let events = recorder.events();
    assert!(matches!(events[0], StepEvent::OutputStale { .. }));
    assert!(matches!(events[1], StepEvent::Executing { forced: false, .. }));
    assert!(matches!(events[2], StepEvent::Committed { .. }));
    assert!(matches!(events[3], StepEvent::Skipped { .. }));
    assert!(events.iter().all(|e| e.step() == "s1"));
}

#[test]
fn failing_command_surfaces_callback_error() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(
        temp.path(),
        "geom: {x: 1}\nsteps:\n  bad:\n    command: exit 4\n    sections: [geom]\n",
    );
    let config = statesman::config::load_config(&config_path).unwrap();
    let mut runner =
        StepRunner::new(CommandStep::load(&config, "bad").unwrap(), &config_path).unwrap();

    match runner.run(false).unwrap_err() {
        StatesmanError::Callback(inner) => assert!(matches!(
            inner.downcast_ref::<StatesmanError>(),
            Some(StatesmanError::CommandFailed { code: Some(4), .. })
        )),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(runner.state().get("geom").is_none());
}
