// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Pipeline compiler
//!
//! Lowers a pipeline definition into a self-contained [`Spec`]: the
//! workspace layout, one shell script per step, fully merged
//! environments, resolved secrets, run policies and dependency edges.

pub mod clone;
pub mod shell;

use rand::{distributions::Alphanumeric, Rng};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::engine::{File, Link, Platform, RunPolicy, Secret, Spec, Step};
use crate::environ::{
    self, provider, Environ, EnvironProvider, EnvironRequest, Getenv, StaticEnviron, HOST_VARS,
};
use crate::metadata::{Build, Netrc, Repo, Stage, System};
use crate::pipeline::{MatchContext, Pipeline};
use crate::secret::{CombinedSecrets, SecretProvider, SecretRequest, StaticSecrets};

use self::clone::CloneArgs;
use self::shell::Slugger;

/// Name of the synthesized clone step
pub const CLONE_STEP: &str = "clone";

const NETRC: &str = ".netrc";

/// Inputs for a single compilation
#[derive(Clone, Copy)]
pub struct CompilerArgs<'a> {
    pub pipeline: &'a Pipeline,
    pub build: &'a Build,
    pub stage: &'a Stage,
    pub repo: &'a Repo,
    pub system: &'a System,
    /// Credentials for the workspace netrc file
    pub netrc: Option<&'a Netrc>,
    /// Request-scoped secrets, consulted before the compiler's own
    pub secret: Option<&'a dyn SecretProvider>,
}

/// Compiles pipeline definitions into execution specs
pub struct Compiler {
    environ: Box<dyn EnvironProvider>,
    secret: Box<dyn SecretProvider>,
    root: Option<PathBuf>,
    symlinks: BTreeMap<String, String>,
    host_vars: Vec<String>,
    random: fn() -> String,
    tempdir: fn() -> PathBuf,
    getenv: Getenv,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            environ: Box::new(StaticEnviron::default()),
            secret: Box::new(StaticSecrets::default()),
            root: None,
            symlinks: BTreeMap::new(),
            host_vars: HOST_VARS.iter().map(|v| v.to_string()).collect(),
            random: random_token,
            tempdir: std::env::temp_dir,
            getenv: environ::host_getenv,
        }
    }

    /// Global variables added to every step
    pub fn with_environ(mut self, provider: impl EnvironProvider + 'static) -> Self {
        self.environ = Box::new(provider);
        self
    }

    /// Pipeline-wide secret source
    pub fn with_secrets(mut self, provider: impl SecretProvider + 'static) -> Self {
        self.secret = Box::new(provider);
        self
    }

    /// Base directory for workspaces instead of the temp directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Links created in the workspace: host source → path under root
    pub fn with_symlinks(mut self, symlinks: BTreeMap<String, String>) -> Self {
        self.symlinks = symlinks;
        self
    }

    /// Additional host variables passed to steps
    pub fn with_host_vars(mut self, names: impl IntoIterator<Item = String>) -> Self {
        for name in names {
            if !self.host_vars.contains(&name) {
                self.host_vars.push(name);
            }
        }
        self
    }

    pub fn with_random(mut self, random: fn() -> String) -> Self {
        self.random = random;
        self
    }

    pub fn with_tempdir(mut self, tempdir: fn() -> PathBuf) -> Self {
        self.tempdir = tempdir;
        self
    }

    pub fn with_getenv(mut self, getenv: Getenv) -> Self {
        self.getenv = getenv;
        self
    }

    /// Compile the pipeline. Provider failures are logged and treated
    /// as empty results; unresolved secrets stay unset.
    pub async fn compile(&self, args: &CompilerArgs<'_>) -> Spec {
        let pipeline = args.pipeline;
        let base = self.root.clone().unwrap_or_else(self.tempdir);
        let root = base.join(format!("drone-{}", (self.random)()));

        let homedir = root.join("home").join("drone");
        let sourcedir = root.join("drone").join("src");
        let optdir = root.join("opt");

        let mut spec = Spec {
            platform: Platform {
                os: pipeline.platform.os.clone(),
                arch: pipeline.platform.arch.clone(),
                variant: pipeline.platform.variant.clone(),
                version: pipeline.platform.version.clone(),
            },
            root: root.clone(),
            files: vec![
                File::dir(homedir.clone()),
                File::dir(sourcedir.clone()),
                File::dir(optdir.clone()),
            ],
            ..Default::default()
        };

        if let Some(netrc) = args.netrc {
            let data = format!(
                "machine {} login {} password {}",
                netrc.machine, netrc.login, netrc.password
            );
            spec.files.push(File::new(homedir.join(NETRC), 0o600, data));
        }

        for (source, target) in &self.symlinks {
            spec.links.push(Link {
                source: PathBuf::from(source),
                target: root.join(target.trim_start_matches('/')),
            });
        }

        let request = EnvironRequest {
            build: args.build,
            repo: args.repo,
        };
        let globals = match self.environ.list(&request).await {
            Ok(vars) => vars,
            Err(e) => {
                warn!(error = %e, "cannot list global environment");
                Vec::new()
            }
        };

        let home = homedir.to_string_lossy().into_owned();
        let workspace = sourcedir.to_string_lossy().into_owned();
        let envs = environ::combine([
            environ::host(&self.host_vars, self.getenv),
            provider::unmasked_map(&globals),
            args.build.params.clone(),
            environ::proxy(self.getenv),
            environ::system(args.system),
            environ::repo(args.repo),
            environ::build(args.build),
            environ::stage(args.stage),
            environ::link(args.repo, args.build, args.system),
            clone::environ(
                &pipeline.clone,
                &args.build.author_name,
                &args.build.author_email,
            ),
            fixed_environ(&home, &workspace),
        ]);

        let mut slugger = Slugger::default();

        if !pipeline.clone.disable {
            slugger = Slugger::new([CLONE_STEP]);
            let remote = if args.repo.http_url.is_empty() {
                &args.repo.ssh_url
            } else {
                &args.repo.http_url
            };
            let script = shell::script(&clone::commands(&CloneArgs {
                remote,
                branch: &args.build.target,
                commit: &args.build.after,
                reference: &args.build.reference,
                depth: pipeline.clone.depth,
            }));
            let path = optdir.join(CLONE_STEP);
            let (command, mut cmd_args) = shell::command();
            cmd_args.push(path.to_string_lossy().into_owned());

            spec.steps.push(Step {
                name: CLONE_STEP.to_string(),
                command,
                args: cmd_args,
                envs: envs.clone(),
                files: vec![File::new(path, 0o700, script)],
                run_policy: RunPolicy::Always,
                working_dir: sourcedir.clone(),
                ..Default::default()
            });
        }

        let ctx = MatchContext {
            action: &args.build.action,
            branch: &args.build.target,
            cron: &args.build.cron,
            event: &args.build.event,
            instance: &args.system.host,
            reference: &args.build.reference,
            repo: &args.repo.slug,
            target: &args.build.deploy_to,
        };

        for src in &pipeline.steps {
            let path = optdir.join(slugger.slug(&src.name));
            let (command, mut cmd_args) = shell::command();
            cmd_args.push(path.to_string_lossy().into_owned());

            let statics: Environ = src
                .environment
                .iter()
                .filter_map(|(k, v)| v.value().map(|v| (k.clone(), v.to_string())))
                .collect();
            let scope = environ::combine([envs.clone(), statics.clone()]);

            let secrets = src
                .environment
                .iter()
                .filter_map(|(k, v)| {
                    v.secret().map(|name| Secret {
                        name: name.to_string(),
                        env: k.clone(),
                        data: None,
                        mask: true,
                    })
                })
                .collect();

            let mut run_policy = if src.when.runs_always() {
                RunPolicy::Always
            } else if src.when.runs_on_failure() {
                RunPolicy::OnFailure
            } else {
                RunPolicy::OnSuccess
            };
            if !src.when.matches(&ctx) {
                run_policy = RunPolicy::Never;
            }

            spec.steps.push(Step {
                name: src.name.clone(),
                command,
                args: cmd_args,
                detach: src.detach,
                depends_on: src.depends_on.clone(),
                envs: environ::combine([envs.clone(), environ::expand(&statics, &scope)]),
                files: vec![File::new(path, 0o700, shell::script(&src.commands))],
                ignore_err: src.ignores_failure(),
                run_policy,
                secrets,
                working_dir: sourcedir.clone(),
            });
        }

        if !spec.is_graph() {
            configure_serial(&mut spec);
        } else if !pipeline.clone.disable {
            configure_clone_deps(&mut spec);
        } else {
            remove_clone_deps(&mut spec);
        }

        let masked = provider::masked(&globals);
        for step in &mut spec.steps {
            for var in &masked {
                step.secrets.push(Secret {
                    name: var.name.clone(),
                    env: var.name.clone(),
                    data: Some(var.data.clone().into_bytes()),
                    mask: true,
                });
            }
        }

        let mut chain: Vec<&dyn SecretProvider> = Vec::with_capacity(2);
        if let Some(scoped) = args.secret {
            chain.push(scoped);
        }
        chain.push(self.secret.as_ref());
        let secrets = CombinedSecrets::new(chain);

        for step in &mut spec.steps {
            for secret in step.secrets.iter_mut().filter(|s| s.data.is_none()) {
                let request = SecretRequest {
                    name: &secret.name,
                    build: args.build,
                    repo: args.repo,
                };
                match secrets.find(&request).await {
                    Ok(Some(value)) => secret.data = Some(value.into_bytes()),
                    Ok(None) => {
                        debug!(step.name = %step.name, secret = %secret.name, "secret not found")
                    }
                    Err(e) => {
                        warn!(step.name = %step.name, secret = %secret.name, error = %e, "cannot find secret")
                    }
                }
            }
        }

        debug!(
            root = %spec.root.display(),
            steps = spec.steps.len(),
            build.number = args.build.number,
            "pipeline compiled"
        );
        spec
    }
}

/// Well-known variables every step sees last
fn fixed_environ(home: &str, workspace: &str) -> Environ {
    [
        ("HOME", home),
        ("HOMEPATH", home),
        ("USERPROFILE", home),
        ("DRONE_HOME", workspace),
        ("DRONE_WORKSPACE", workspace),
        ("GIT_TERMINAL_PROMPT", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Chain steps in declaration order
fn configure_serial(spec: &mut Spec) {
    let mut prev: Option<String> = None;
    for step in &mut spec.steps {
        step.depends_on = prev.iter().cloned().collect();
        prev = Some(step.name.clone());
    }
}

/// Root steps of a graph wait for the clone
fn configure_clone_deps(spec: &mut Spec) {
    for step in &mut spec.steps {
        if step.name != CLONE_STEP && step.depends_on.is_empty() {
            step.depends_on.push(CLONE_STEP.to_string());
        }
    }
}

fn remove_clone_deps(spec: &mut Spec) {
    for step in &mut spec.steps {
        step.depends_on.retain(|d| d != CLONE_STEP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::EnvVar;
    use crate::pipeline::Manifest;
    use std::path::Path;

    fn fixed_random() -> String {
        "abc123".to_string()
    }

    fn fixed_tempdir() -> PathBuf {
        PathBuf::from("/tmp")
    }

    fn test_getenv(name: &str) -> Option<String> {
        match name {
            "PATH" => Some("/usr/bin:/bin".to_string()),
            "USER" => Some("ci".to_string()),
            "SECRET_HOST_TOKEN" => Some("leak".to_string()),
            _ => None,
        }
    }

    fn compiler() -> Compiler {
        Compiler::new()
            .with_random(fixed_random)
            .with_tempdir(fixed_tempdir)
            .with_getenv(test_getenv)
    }

    fn pipeline(yaml: &str) -> Pipeline {
        Manifest::from_yaml(yaml)
            .unwrap()
            .lookup("")
            .unwrap()
            .clone()
    }

    struct Fixture {
        build: Build,
        stage: Stage,
        repo: Repo,
        system: System,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                build: Build {
                    number: 7,
                    event: "push".into(),
                    target: "main".into(),
                    after: "a1b2c3".into(),
                    reference: "refs/heads/main".into(),
                    ..Default::default()
                },
                stage: Stage {
                    name: "default".into(),
                    ..Default::default()
                },
                repo: Repo {
                    slug: "octocat/hello-world".into(),
                    http_url: "https://github.com/octocat/hello-world.git".into(),
                    ssh_url: "git@github.com:octocat/hello-world.git".into(),
                    ..Default::default()
                },
                system: System {
                    proto: "https".into(),
                    host: "ci.example.com".into(),
                    ..Default::default()
                },
            }
        }

        fn args<'a>(&'a self, pipeline: &'a Pipeline) -> CompilerArgs<'a> {
            CompilerArgs {
                pipeline,
                build: &self.build,
                stage: &self.stage,
                repo: &self.repo,
                system: &self.system,
                netrc: None,
                secret: None,
            }
        }
    }

    const SERIAL: &str = r#"
kind: pipeline
type: exec
name: default
steps:
  - name: build
    commands: [go build]
  - name: test
    commands: [go test]
"#;

    const GRAPH: &str = r#"
kind: pipeline
type: exec
name: default
steps:
  - name: backend
    commands: [go build]
  - name: frontend
    commands: [npm run build]
  - name: publish
    commands: [./publish]
    depends_on: [backend, frontend, clone]
"#;

    fn depends(spec: &Spec, name: &str) -> Vec<String> {
        spec.step(name).unwrap().depends_on.clone()
    }

    #[tokio::test]
    async fn test_workspace_layout() {
        let fixture = Fixture::new();
        let pipeline = pipeline(SERIAL);
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        let root = Path::new("/tmp/drone-abc123");
        assert_eq!(spec.root, root);
        let dirs: Vec<_> = spec.files.iter().filter(|f| f.is_dir).map(|f| f.path.clone()).collect();
        assert_eq!(
            dirs,
            vec![
                root.join("home/drone"),
                root.join("drone/src"),
                root.join("opt")
            ]
        );

        let build = spec.step("build").unwrap();
        assert_eq!(build.command, "/bin/sh");
        assert_eq!(build.args, vec!["-e", "/tmp/drone-abc123/opt/build"]);
        assert_eq!(build.working_dir, root.join("drone/src"));
        assert_eq!(build.files[0].mode, 0o700);
        assert!(String::from_utf8_lossy(&build.files[0].data).contains("go build"));
    }

    #[tokio::test]
    async fn test_serial_pipeline_is_chained() {
        let fixture = Fixture::new();
        let pipeline = pipeline(SERIAL);
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        let names: Vec<_> = spec.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["clone", "build", "test"]);
        assert!(depends(&spec, "clone").is_empty());
        assert_eq!(depends(&spec, "build"), vec!["clone"]);
        assert_eq!(depends(&spec, "test"), vec!["build"]);
        assert_eq!(spec.step("clone").unwrap().run_policy, RunPolicy::Always);
    }

    #[tokio::test]
    async fn test_graph_roots_depend_on_clone() {
        let fixture = Fixture::new();
        let pipeline = pipeline(GRAPH);
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        assert_eq!(depends(&spec, "backend"), vec!["clone"]);
        assert_eq!(depends(&spec, "frontend"), vec!["clone"]);
        assert_eq!(depends(&spec, "publish"), vec!["backend", "frontend", "clone"]);
    }

    #[tokio::test]
    async fn test_graph_without_clone_strips_clone_edges() {
        let fixture = Fixture::new();
        let pipeline = pipeline(&format!("clone:\n  disable: true\n{}", GRAPH));
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        assert!(spec.step("clone").is_none());
        assert!(depends(&spec, "backend").is_empty());
        assert_eq!(depends(&spec, "publish"), vec!["backend", "frontend"]);
        assert!(spec.steps.iter().all(|s| !s.depends_on.iter().any(|d| d == "clone")));
    }

    #[tokio::test]
    async fn test_clone_step_script_and_remote_fallback() {
        let mut fixture = Fixture::new();
        fixture.repo.http_url.clear();
        let pipeline = pipeline(SERIAL);
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        let clone = spec.step("clone").unwrap();
        assert!(clone.secrets.is_empty());
        let script = String::from_utf8_lossy(&clone.files[0].data).into_owned();
        assert!(script.contains("git remote add origin 'git@github.com:octocat/hello-world.git'"));
        assert!(script.contains("git checkout 'a1b2c3' -b 'main'"));
        assert_eq!(clone.args[1], "/tmp/drone-abc123/opt/clone");
    }

    #[tokio::test]
    async fn test_run_policies() {
        let fixture = Fixture::new();
        let pipeline = pipeline(
            r#"
steps:
  - name: notify
    commands: [./notify]
    when:
      status: [success, failure]
  - name: rollback
    commands: [./rollback]
    when:
      status: failure
  - name: deploy
    commands: [./deploy]
    when:
      event: tag
  - name: alert
    commands: [./alert]
    when:
      event: tag
      status: [success, failure]
  - name: build
    commands: [make]
"#,
        );
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        let policy = |name: &str| spec.step(name).unwrap().run_policy;
        assert_eq!(policy("notify"), RunPolicy::Always);
        assert_eq!(policy("rollback"), RunPolicy::OnFailure);
        assert_eq!(policy("deploy"), RunPolicy::Never);
        assert_eq!(policy("alert"), RunPolicy::Never);
        assert_eq!(policy("build"), RunPolicy::OnSuccess);
    }

    #[tokio::test]
    async fn test_environment_precedence() {
        let mut fixture = Fixture::new();
        fixture.build.params.insert("DRONE_BRANCH".into(), "overridden".into());
        fixture.build.params.insert("DEPLOY_ENV".into(), "staging".into());
        let pipeline = pipeline(
            r#"
steps:
  - name: build
    commands: [make]
    environment:
      GREETING: hello $DEPLOY_ENV
      HOME: /elsewhere
      VERBOSE: true
"#,
        );
        let compiler = compiler().with_environ(StaticEnviron::new(vec![
            EnvVar {
                name: "REGION".into(),
                data: "eu".into(),
                mask: false,
            },
            EnvVar {
                name: "API_KEY".into(),
                data: "topsecret".into(),
                mask: true,
            },
        ]));
        let spec = compiler.compile(&fixture.args(&pipeline)).await;
        let envs = &spec.step("build").unwrap().envs;

        assert_eq!(envs["PATH"], "/usr/bin:/bin");
        assert!(!envs.contains_key("SECRET_HOST_TOKEN"));
        assert_eq!(envs["REGION"], "eu");
        assert!(!envs.contains_key("API_KEY"));
        // metadata is applied after build parameters
        assert_eq!(envs["DRONE_BRANCH"], "main");
        assert_eq!(envs["DRONE_WORKSPACE"], "/tmp/drone-abc123/drone/src");
        assert_eq!(envs["GIT_TERMINAL_PROMPT"], "0");
        assert_eq!(envs["GREETING"], "hello staging");
        assert_eq!(envs["HOME"], "/elsewhere");
        assert_eq!(envs["VERBOSE"], "true");
        assert_eq!(
            spec.step("clone").unwrap().envs["HOME"],
            "/tmp/drone-abc123/home/drone"
        );
    }

    #[tokio::test]
    async fn test_secrets_are_resolved_and_masked() {
        let fixture = Fixture::new();
        let pipeline = pipeline(
            r#"
steps:
  - name: publish
    commands: [./publish]
    environment:
      TOKEN:
        from_secret: docker_token
      PASSWORD:
        from_secret: docker_password
      MISSING:
        from_secret: nowhere
"#,
        );
        let global = StaticSecrets::new(
            [
                ("docker_token".to_string(), "global-token".to_string()),
                ("docker_password".to_string(), "hunter2".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let scoped = StaticSecrets::new(
            [("docker_token".to_string(), "scoped-token".to_string())]
                .into_iter()
                .collect(),
        );
        let compiler = compiler()
            .with_secrets(global)
            .with_environ(StaticEnviron::new(vec![EnvVar {
                name: "API_KEY".into(),
                data: "topsecret".into(),
                mask: true,
            }]));

        let mut args = fixture.args(&pipeline);
        args.secret = Some(&scoped as &dyn SecretProvider);
        let spec = compiler.compile(&args).await;

        let publish = spec.step("publish").unwrap();
        let secret = |env: &str| publish.secrets.iter().find(|s| s.env == env).unwrap();
        assert_eq!(secret("TOKEN").value(), "scoped-token");
        assert_eq!(secret("PASSWORD").value(), "hunter2");
        assert_eq!(secret("MISSING").data, None);
        assert!(publish.secrets.iter().all(|s| s.mask));
        assert!(!publish.envs.contains_key("TOKEN"));

        // masked globals are attached to every step, clone included
        for step in &spec.steps {
            let api_key = step.secrets.iter().find(|s| s.name == "API_KEY").unwrap();
            assert_eq!(api_key.value(), "topsecret");
        }
    }

    #[tokio::test]
    async fn test_netrc_and_symlinks() {
        let fixture = Fixture::new();
        let pipeline = pipeline(SERIAL);
        let netrc = Netrc {
            machine: "github.com".into(),
            login: "octocat".into(),
            password: "pat".into(),
        };
        let mut args = fixture.args(&pipeline);
        args.netrc = Some(&netrc);

        let symlinks = [("/var/cache/go".to_string(), "/drone/cache".to_string())]
            .into_iter()
            .collect();
        let spec = compiler()
            .with_root("/var/lib/drover")
            .with_symlinks(symlinks)
            .compile(&args)
            .await;

        assert_eq!(spec.root, Path::new("/var/lib/drover/drone-abc123"));
        let netrc = spec
            .files
            .iter()
            .find(|f| f.path.ends_with(".netrc"))
            .unwrap();
        assert_eq!(netrc.mode, 0o600);
        assert_eq!(netrc.data, b"machine github.com login octocat password pat");

        assert_eq!(spec.links.len(), 1);
        assert_eq!(spec.links[0].source, Path::new("/var/cache/go"));
        assert_eq!(
            spec.links[0].target,
            Path::new("/var/lib/drover/drone-abc123/drone/cache")
        );
    }

    #[tokio::test]
    async fn test_no_netrc_without_credentials() {
        let fixture = Fixture::new();
        let pipeline = pipeline(SERIAL);
        let spec = compiler().compile(&fixture.args(&pipeline)).await;
        assert!(spec.files.iter().all(|f| !f.path.ends_with(".netrc")));
    }

    #[tokio::test]
    async fn test_colliding_step_names_get_distinct_scripts() {
        let fixture = Fixture::new();
        let pipeline = pipeline(
            r#"
steps:
  - name: Build App
    commands: [make]
  - name: build-app
    commands: [make again]
  - name: clone
    commands: [echo clone]
"#,
        );
        let spec = compiler().compile(&fixture.args(&pipeline)).await;

        let script = |i: usize| spec.steps[i].args.last().unwrap().clone();
        assert_eq!(script(1), "/tmp/drone-abc123/opt/build-app");
        assert_eq!(script(2), "/tmp/drone-abc123/opt/build-app-2");
        assert_eq!(script(3), "/tmp/drone-abc123/opt/clone-2");
    }

    #[tokio::test]
    async fn test_compile_is_deterministic() {
        let fixture = Fixture::new();
        let pipeline = pipeline(GRAPH);
        let first = compiler().compile(&fixture.args(&pipeline)).await;
        let second = compiler().compile(&fixture.args(&pipeline)).await;
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
