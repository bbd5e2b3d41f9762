// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Spec executor
//!
//! Materializes the workspace, walks the step graph and drives the
//! shared [`State`] as steps run. Teardown (final state, stage report,
//! workspace removal) happens on every path.

use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dag::Dag;
use super::replacer::Replacer;
use super::reporter::Reporter;
use super::state::State;
use super::streamer::Streamer;
use super::SKIP_ALL_EXIT_CODE;
use crate::engine::{Engine, RunPolicy, Spec};
use crate::environ;
use crate::errors::{ErrorList, RunnerError, RunnerResult};

/// Runs compiled specs
#[derive(Clone)]
pub struct Execer {
    engine: Arc<dyn Engine>,
    reporter: Arc<dyn Reporter>,
    streamer: Arc<dyn Streamer>,
}

/// Everything a step task needs, shared between tasks
struct Run {
    engine: Arc<dyn Engine>,
    reporter: Arc<dyn Reporter>,
    streamer: Arc<dyn Streamer>,
    spec: Arc<Spec>,
    state: Arc<State>,
    cancel: CancellationToken,
}

impl Execer {
    pub fn new(
        engine: Arc<dyn Engine>,
        reporter: Arc<dyn Reporter>,
        streamer: Arc<dyn Streamer>,
    ) -> Self {
        Self {
            engine,
            reporter,
            streamer,
        }
    }

    /// Execute `spec` to completion, recording progress in `state`.
    ///
    /// Step outcomes live in `state`; the returned error only carries
    /// infrastructure problems: setup, graph, reporting and log streams.
    /// Cancellation is not an error.
    pub async fn exec(
        &self,
        cancel: CancellationToken,
        spec: Arc<Spec>,
        state: Arc<State>,
    ) -> RunnerResult<()> {
        let mut errors = ErrorList::new();

        if let Err(e) = self.engine.setup(&spec).await {
            error!(root = %spec.root.display(), error = %e, "cannot set up workspace");
            state.fail_all(&e.to_string());
            errors.push(e);
            errors.absorb(self.reporter.report_stage(&state).await);
            self.destroy(&spec).await;
            return errors.into_result();
        }

        match Dag::from_spec(&spec) {
            Ok(dag) => {
                let run = Arc::new(Run {
                    engine: self.engine.clone(),
                    reporter: self.reporter.clone(),
                    streamer: self.streamer.clone(),
                    spec: spec.clone(),
                    state: state.clone(),
                    cancel,
                });
                let result = dag
                    .run(|name| {
                        let run = run.clone();
                        async move { run.exec_step(&name).await }
                    })
                    .await;
                errors.absorb(result);
            }
            Err(e) => {
                error!(error = %e, "invalid step graph");
                state.fail_all(&e.to_string());
                errors.push(e);
            }
        }

        state.finish_all();
        errors.absorb(self.reporter.report_stage(&state).await);
        self.destroy(&spec).await;

        let stage = state.stage();
        info!(stage.name = %stage.name, stage.status = %stage.status, "pipeline finished");
        errors.into_result()
    }

    async fn destroy(&self, spec: &Spec) {
        if let Err(e) = self.engine.destroy(spec).await {
            warn!(root = %spec.root.display(), error = %e, "cannot remove workspace");
        }
    }
}

impl Run {
    async fn exec_step(&self, name: &str) -> RunnerResult<()> {
        let Some(step) = self.spec.step(name) else {
            return Err(RunnerError::Graph {
                vertex: name.to_string(),
                message: "no such step".to_string(),
            });
        };
        let state = &self.state;

        if self.cancel.is_cancelled() {
            state.cancel();
            return Ok(());
        }
        if state.skipped() || state.cancelled() {
            return Ok(());
        }

        match step.run_policy {
            RunPolicy::Never => return Ok(()),
            RunPolicy::Always => {}
            RunPolicy::OnFailure if !state.failed() => {
                state.skip(name);
                return self.reporter.report_step(state, name).await;
            }
            RunPolicy::OnSuccess if state.failed() => {
                state.skip(name);
                return self.reporter.report_step(state, name).await;
            }
            _ => {}
        }

        if !state.start(name) {
            return Ok(());
        }
        debug!(step.name = %name, "step started");

        let mut errors = ErrorList::new();
        errors.absorb(self.reporter.report_step(state, name).await);

        let mut copy = step.clone();
        copy.envs = environ::combine([std::mem::take(&mut copy.envs), state.environ(name)]);

        let mut sink = Replacer::wrap(self.streamer.stream(state, name), &step.secrets);
        let result = self
            .engine
            .run(&self.cancel, &self.spec, &copy, &mut sink as &mut (dyn Write + Send))
            .await;
        errors.absorb(sink.close());

        match result {
            Ok(exited) => {
                debug!(step.name = %name, process.exit = exited.exit_code, "step finished");
                state.finish(name, exited.exit_code);
                errors.absorb(self.reporter.report_step(state, name).await);
                if exited.exit_code == SKIP_ALL_EXIT_CODE {
                    info!(step.name = %name, "step requested to skip remaining steps");
                    state.skip_all();
                }
            }
            Err(e) if e.is_cancellation() => {
                debug!(step.name = %name, "step cancelled");
                state.cancel();
            }
            Err(e) => {
                warn!(step.name = %name, error = %e, "step failed");
                state.fail(name, &e.to_string());
                errors.absorb(self.reporter.report_step(state, name).await);
            }
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ProcessState, Secret, Step};
    use crate::environ::Environ;
    use crate::metadata::{Build, Stage, Status};
    use crate::runtime::streamer::LogSink;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedEngine {
        fail_setup: bool,
        exits: HashMap<String, i32>,
        broken: HashSet<String>,
        blocking: HashSet<String>,
        output: HashMap<String, String>,
        ran: Mutex<Vec<String>>,
        envs: Mutex<HashMap<String, Environ>>,
        destroyed: Mutex<bool>,
    }

    #[async_trait]
    impl Engine for ScriptedEngine {
        async fn setup(&self, _spec: &Spec) -> RunnerResult<()> {
            if self.fail_setup {
                return Err(RunnerError::SetupFailed {
                    path: "/nowhere".into(),
                    error: "permission denied".into(),
                });
            }
            Ok(())
        }

        async fn run(
            &self,
            cancel: &CancellationToken,
            _spec: &Spec,
            step: &Step,
            output: &mut (dyn Write + Send),
        ) -> RunnerResult<ProcessState> {
            self.ran.lock().unwrap().push(step.name.clone());
            self.envs
                .lock()
                .unwrap()
                .insert(step.name.clone(), step.envs.clone());
            if let Some(text) = self.output.get(&step.name) {
                output.write_all(text.as_bytes())?;
            }
            if self.broken.contains(&step.name) {
                return Err(RunnerError::SpawnFailed {
                    step: step.name.clone(),
                    error: "exec format error".into(),
                });
            }
            if self.blocking.contains(&step.name) {
                cancel.cancelled().await;
                return Err(RunnerError::Cancelled);
            }
            let code = self.exits.get(&step.name).copied().unwrap_or(0);
            Ok(ProcessState::exited(code))
        }

        async fn destroy(&self, _spec: &Spec) -> RunnerResult<()> {
            *self.destroyed.lock().unwrap() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<(String, Status)>>,
    }

    impl RecordingReporter {
        fn statuses(&self, step: &str) -> Vec<Status> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == step)
                .map(|(_, status)| *status)
                .collect()
        }
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn report_stage(&self, state: &State) -> RunnerResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(("<stage>".into(), state.stage().status));
            Ok(())
        }

        async fn report_step(&self, state: &State, step: &str) -> RunnerResult<()> {
            let status = state.step(step).map(|s| s.status).unwrap_or_default();
            self.events.lock().unwrap().push((step.into(), status));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CaptureStreamer {
        logs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    struct CaptureSink {
        step: String,
        logs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Write for CaptureSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.logs
                .lock()
                .unwrap()
                .entry(self.step.clone())
                .or_default()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogSink for CaptureSink {
        fn close(&mut self) -> RunnerResult<()> {
            Ok(())
        }
    }

    impl Streamer for CaptureStreamer {
        fn stream(&self, _state: &State, step: &str) -> Box<dyn LogSink> {
            Box::new(CaptureSink {
                step: step.to_string(),
                logs: self.logs.clone(),
            })
        }
    }

    impl CaptureStreamer {
        fn log(&self, step: &str) -> String {
            let logs = self.logs.lock().unwrap();
            String::from_utf8_lossy(logs.get(step).map(Vec::as_slice).unwrap_or_default())
                .into_owned()
        }
    }

    fn step(name: &str, deps: &[&str], policy: RunPolicy) -> Step {
        Step {
            name: name.into(),
            command: "/bin/sh".into(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            run_policy: policy,
            envs: [("STATIC".to_string(), "1".to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    struct Harness {
        engine: Arc<ScriptedEngine>,
        reporter: Arc<RecordingReporter>,
        streamer: Arc<CaptureStreamer>,
        spec: Arc<Spec>,
        state: Arc<State>,
    }

    impl Harness {
        fn new(engine: ScriptedEngine, steps: Vec<Step>) -> Self {
            let spec = Spec {
                root: "/tmp/drone-test".into(),
                steps,
                ..Default::default()
            };
            let state = State::new(Build::default(), Stage::default(), &spec);
            Self {
                engine: Arc::new(engine),
                reporter: Arc::new(RecordingReporter::default()),
                streamer: Arc::new(CaptureStreamer::default()),
                spec: Arc::new(spec),
                state: Arc::new(state),
            }
        }

        async fn exec(&self, cancel: CancellationToken) -> RunnerResult<()> {
            let execer = Execer::new(
                self.engine.clone(),
                self.reporter.clone(),
                self.streamer.clone(),
            );
            execer
                .exec(cancel, self.spec.clone(), self.state.clone())
                .await
        }

        fn status(&self, name: &str) -> Status {
            self.state.step(name).unwrap().status
        }

        fn ran(&self) -> Vec<String> {
            self.engine.ran.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_serial_pipeline_succeeds() {
        let h = Harness::new(
            ScriptedEngine::default(),
            vec![
                step("clone", &[], RunPolicy::Always),
                step("build", &["clone"], RunPolicy::OnSuccess),
                step("test", &["build"], RunPolicy::OnSuccess),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        assert_eq!(h.ran(), vec!["clone", "build", "test"]);
        for name in ["clone", "build", "test"] {
            assert_eq!(h.status(name), Status::Success);
            assert_eq!(
                h.reporter.statuses(name),
                vec![Status::Running, Status::Success]
            );
        }
        assert_eq!(h.state.stage().status, Status::Success);
        assert_eq!(h.reporter.statuses("<stage>"), vec![Status::Success]);
        assert!(*h.engine.destroyed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_policies_after_failure() {
        let engine = ScriptedEngine {
            exits: [("build".to_string(), 2)].into_iter().collect(),
            ..Default::default()
        };
        let h = Harness::new(
            engine,
            vec![
                step("build", &[], RunPolicy::OnSuccess),
                step("test", &["build"], RunPolicy::OnSuccess),
                step("rollback", &["test"], RunPolicy::OnFailure),
                step("notify", &["rollback"], RunPolicy::Always),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        assert_eq!(h.status("build"), Status::Failure);
        assert_eq!(h.state.step("build").unwrap().exit_code, 2);
        assert_eq!(h.status("test"), Status::Skipped);
        assert_eq!(h.reporter.statuses("test"), vec![Status::Skipped]);
        assert_eq!(h.status("rollback"), Status::Success);
        assert_eq!(h.status("notify"), Status::Success);
        assert_eq!(h.ran(), vec!["build", "rollback", "notify"]);
        assert_eq!(h.state.stage().status, Status::Failure);
    }

    #[tokio::test]
    async fn test_on_failure_skipped_when_pipeline_passes() {
        let h = Harness::new(
            ScriptedEngine::default(),
            vec![
                step("build", &[], RunPolicy::OnSuccess),
                step("rollback", &["build"], RunPolicy::OnFailure),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        assert_eq!(h.status("rollback"), Status::Skipped);
        assert_eq!(h.reporter.statuses("rollback"), vec![Status::Skipped]);
        assert_eq!(h.ran(), vec!["build"]);
    }

    #[tokio::test]
    async fn test_exit_78_skips_remaining_steps() {
        let engine = ScriptedEngine {
            exits: [("check".to_string(), 78)].into_iter().collect(),
            ..Default::default()
        };
        let h = Harness::new(
            engine,
            vec![
                step("check", &[], RunPolicy::OnSuccess),
                step("build", &["check"], RunPolicy::OnSuccess),
                step("notify", &["build"], RunPolicy::Always),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        assert_eq!(h.status("check"), Status::Success);
        assert_eq!(h.status("build"), Status::Skipped);
        assert_eq!(h.status("notify"), Status::Skipped);
        assert_eq!(h.ran(), vec!["check"]);
        assert_eq!(h.state.stage().status, Status::Success);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let h = Harness::new(
            ScriptedEngine::default(),
            vec![
                step("clone", &[], RunPolicy::Always),
                step("build", &["clone"], RunPolicy::OnSuccess),
            ],
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        h.exec(cancel).await.unwrap();

        assert!(h.ran().is_empty());
        assert_eq!(h.status("clone"), Status::Cancelled);
        assert_eq!(h.status("build"), Status::Cancelled);
        assert!(!h.state.failed());
        assert_eq!(h.state.stage().status, Status::Cancelled);
        assert!(*h.engine.destroyed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_cancel_while_running() {
        let engine = ScriptedEngine {
            blocking: ["deploy".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let h = Harness::new(
            engine,
            vec![
                step("deploy", &[], RunPolicy::OnSuccess),
                step("verify", &["deploy"], RunPolicy::Always),
            ],
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), h.exec(cancel))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(h.status("deploy"), Status::Cancelled);
        assert_eq!(h.status("verify"), Status::Cancelled);
        assert_eq!(h.ran(), vec!["deploy"]);
        assert_eq!(h.state.stage().status, Status::Cancelled);
    }

    #[tokio::test]
    async fn test_setup_failure_fails_every_step() {
        let engine = ScriptedEngine {
            fail_setup: true,
            ..Default::default()
        };
        let h = Harness::new(
            engine,
            vec![
                step("clone", &[], RunPolicy::Always),
                step("build", &["clone"], RunPolicy::OnSuccess),
            ],
        );
        let result = h.exec(CancellationToken::new()).await;

        assert!(matches!(result, Err(RunnerError::SetupFailed { .. })));
        assert!(h.ran().is_empty());
        assert_eq!(h.status("clone"), Status::Failure);
        assert_eq!(h.status("build"), Status::Failure);
        assert_eq!(h.reporter.statuses("<stage>"), vec![Status::Failure]);
        assert!(*h.engine.destroyed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_step_names_fail_the_run() {
        let h = Harness::new(
            ScriptedEngine::default(),
            vec![
                step("clone", &["setup"], RunPolicy::Always),
                step("setup", &[], RunPolicy::Always),
                step("clone", &[], RunPolicy::Always),
            ],
        );
        let result = h.exec(CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(RunnerError::DuplicateStep { ref step }) if step == "clone"
        ));
        assert!(h.ran().is_empty());
        assert_eq!(h.status("setup"), Status::Failure);
        assert_eq!(h.status("clone"), Status::Failure);
        assert_eq!(h.state.stage().status, Status::Failure);
        assert!(*h.engine.destroyed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_engine_error_fails_only_that_branch() {
        let engine = ScriptedEngine {
            broken: ["backend".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let h = Harness::new(
            engine,
            vec![
                step("backend", &[], RunPolicy::OnSuccess),
                step("frontend", &[], RunPolicy::Always),
                step("publish", &["backend"], RunPolicy::OnSuccess),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        let backend = h.state.step("backend").unwrap();
        assert_eq!(backend.status, Status::Failure);
        assert!(backend.error.contains("exec format error"));
        assert_eq!(h.status("frontend"), Status::Success);
        assert_eq!(h.status("publish"), Status::Skipped);
        assert!(h.state.failed());
    }

    #[tokio::test]
    async fn test_secrets_redacted_in_logs() {
        let engine = ScriptedEngine {
            output: [(
                "publish".to_string(),
                "login with s3cret-token\ndone\n".to_string(),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let mut publish = step("publish", &[], RunPolicy::OnSuccess);
        publish.secrets = vec![Secret {
            name: "token".into(),
            env: "TOKEN".into(),
            data: Some(b"s3cret-token".to_vec()),
            mask: true,
        }];
        let h = Harness::new(engine, vec![publish]);
        h.exec(CancellationToken::new()).await.unwrap();

        assert_eq!(h.streamer.log("publish"), "login with ********\ndone\n");
    }

    #[tokio::test]
    async fn test_live_environment_is_added_to_a_copy() {
        let h = Harness::new(
            ScriptedEngine::default(),
            vec![
                step("build", &[], RunPolicy::OnSuccess),
                step("test", &["build"], RunPolicy::OnSuccess),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        let envs = h.engine.envs.lock().unwrap();
        let test = &envs["test"];
        assert_eq!(test["STATIC"], "1");
        assert_eq!(test["DRONE_STEP_NAME"], "test");
        assert_eq!(test["DRONE_STEP_NUMBER"], "2");
        assert!(!h.spec.step("test").unwrap().envs.contains_key("DRONE_STEP_NAME"));
    }

    #[tokio::test]
    async fn test_never_steps_do_not_run() {
        let h = Harness::new(
            ScriptedEngine::default(),
            vec![
                step("build", &[], RunPolicy::OnSuccess),
                step("deploy", &["build"], RunPolicy::Never),
                step("notify", &["deploy"], RunPolicy::OnSuccess),
            ],
        );
        h.exec(CancellationToken::new()).await.unwrap();

        assert_eq!(h.ran(), vec!["build", "notify"]);
        assert!(h.state.step("deploy").is_none());
        assert!(h.reporter.statuses("deploy").is_empty());
    }
}
