// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for drover.

pub mod compile;
pub mod exec;
pub mod graph;
pub mod lint;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use miette::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::compiler::{Compiler, CompilerArgs};
use crate::config::{RunnerConfig, DEFAULT_CONFIG_FILE};
use crate::engine::Spec;
use crate::environ::{self, provider::unmasked_map, EnvVar, Environ, StaticEnviron};
use crate::errors::RunnerError;
use crate::metadata::{Build, Netrc, Repo, Stage, System};
use crate::pipeline::{Manifest, Pipeline, PipelineValidator, ValidationResult};
use crate::secret::StaticSecrets;

/// Host-process CI pipeline runner
///
/// Compiles `.drone.yml` pipelines and runs their steps on this machine.
#[derive(Parser, Debug)]
#[clap(
    name = "drover",
    version,
    about = "Run CI pipelines as plain processes on the host",
    long_about = None,
    after_help = "Examples:\n\
        drover lint                     Check .drone.yml for mistakes\n\
        drover compile                  Print the compiled execution spec\n\
        drover exec --branch main       Run the pipeline locally\n\
        drover graph -f mermaid         Show step dependencies\n\n\
        See 'drover <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the pipeline and print the execution spec as JSON
    Compile {
        #[clap(flatten)]
        args: PipelineArgs,
    },

    /// Execute the pipeline on this machine
    Exec {
        #[clap(flatten)]
        args: PipelineArgs,

        /// Prefix log lines with colored step names (defaults to terminal detection)
        #[clap(long, value_name = "BOOL")]
        pretty: Option<bool>,
    },

    /// Show the compiled steps as a dependency graph
    Graph {
        #[clap(flatten)]
        args: PipelineArgs,

        /// Output format
        #[clap(short, long, default_value = "text", value_name = "text|dot|mermaid")]
        format: GraphFormat,
    },

    /// Check pipeline definitions for structural mistakes
    Lint {
        /// Pipeline file to lint
        #[clap(default_value = ".drone.yml")]
        source: PathBuf,
    },
}

/// Pipeline selection, runner settings and build metadata shared by
/// the commands that compile a pipeline
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Pipeline file
    #[clap(default_value = ".drone.yml")]
    pub source: PathBuf,

    /// Runner configuration file
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Name of the pipeline to run (defaults to the first one)
    #[clap(long, env = "DRONE_STAGE_NAME", default_value = "")]
    pub stage_name: String,

    /// Base directory for the build workspace
    #[clap(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Global environment variable
    #[clap(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub environ: Vec<(String, String)>,

    /// Secret available to `from_secret`
    #[clap(short, long = "secret", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub secrets: Vec<(String, String)>,

    /// Build parameter
    #[clap(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    #[clap(flatten)]
    pub metadata: MetadataArgs,
}

/// Build, repository and system metadata
#[derive(Args, Debug, Clone, Default)]
pub struct MetadataArgs {
    #[clap(long, env = "DRONE_REPO_NAMESPACE", default_value = "")]
    pub repo_namespace: String,

    #[clap(long, env = "DRONE_REPO_NAME", default_value = "")]
    pub repo_name: String,

    /// Clone URL
    #[clap(long, env = "DRONE_REMOTE_URL", default_value = "")]
    pub remote_url: String,

    #[clap(long, env = "DRONE_REPO_LINK", default_value = "")]
    pub repo_link: String,

    #[clap(long, env = "DRONE_REPO_BRANCH", default_value = "master")]
    pub default_branch: String,

    /// Pipeline timeout in minutes (0 uses the runner configuration)
    #[clap(long, default_value_t = 0)]
    pub timeout: u64,

    #[clap(long, env = "DRONE_BUILD_NUMBER", default_value_t = 1)]
    pub build_number: i64,

    #[clap(long, env = "DRONE_BUILD_EVENT", default_value = "push")]
    pub event: String,

    #[clap(long, env = "DRONE_BUILD_ACTION", default_value = "")]
    pub action: String,

    #[clap(long, env = "DRONE_CRON", default_value = "")]
    pub cron: String,

    #[clap(long, env = "DRONE_DEPLOY_TO", default_value = "")]
    pub deploy_to: String,

    /// Target branch
    #[clap(long, env = "DRONE_COMMIT_BRANCH", default_value = "master")]
    pub branch: String,

    /// Source branch (defaults to the target branch)
    #[clap(long, env = "DRONE_SOURCE_BRANCH")]
    pub source_branch: Option<String>,

    #[clap(long = "ref", env = "DRONE_COMMIT_REF")]
    pub reference: Option<String>,

    #[clap(long, env = "DRONE_COMMIT_SHA", default_value = "")]
    pub commit: String,

    #[clap(long, env = "DRONE_COMMIT_BEFORE", default_value = "")]
    pub commit_before: String,

    #[clap(long, env = "DRONE_COMMIT_MESSAGE", default_value = "")]
    pub message: String,

    #[clap(long, env = "DRONE_COMMIT_AUTHOR", default_value = "")]
    pub author_login: String,

    #[clap(long, env = "DRONE_COMMIT_AUTHOR_NAME", default_value = "")]
    pub author_name: String,

    #[clap(long, env = "DRONE_COMMIT_AUTHOR_EMAIL", default_value = "")]
    pub author_email: String,

    #[clap(long, env = "DRONE_SYSTEM_PROTO", default_value = "http")]
    pub system_proto: String,

    #[clap(long, env = "DRONE_SYSTEM_HOST", default_value = "localhost")]
    pub system_host: String,

    #[clap(long, env = "DRONE_NETRC_MACHINE")]
    pub netrc_machine: Option<String>,

    #[clap(long, env = "DRONE_NETRC_USERNAME", default_value = "")]
    pub netrc_username: String,

    #[clap(long, env = "DRONE_NETRC_PASSWORD", default_value = "", hide_env_values = true)]
    pub netrc_password: String,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

impl MetadataArgs {
    fn build(&self, params: &[(String, String)]) -> Build {
        let now = chrono::Utc::now().timestamp();
        let source = self
            .source_branch
            .clone()
            .unwrap_or_else(|| self.branch.clone());
        let reference = self
            .reference
            .clone()
            .unwrap_or_else(|| format!("refs/heads/{}", self.branch));
        Build {
            number: self.build_number,
            event: self.event.clone(),
            action: self.action.clone(),
            cron: self.cron.clone(),
            deploy_to: self.deploy_to.clone(),
            reference,
            source,
            target: self.branch.clone(),
            before: self.commit_before.clone(),
            after: self.commit.clone(),
            message: self.message.clone(),
            author_login: self.author_login.clone(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
            params: params.iter().cloned().collect(),
            created: now,
            started: now,
            ..Default::default()
        }
    }

    fn repo(&self) -> Repo {
        let slug = match (self.repo_namespace.is_empty(), self.repo_name.is_empty()) {
            (false, false) => format!("{}/{}", self.repo_namespace, self.repo_name),
            _ => self.repo_name.clone(),
        };
        Repo {
            namespace: self.repo_namespace.clone(),
            name: self.repo_name.clone(),
            slug,
            scm: "git".to_string(),
            http_url: self.remote_url.clone(),
            link: self.repo_link.clone(),
            branch: self.default_branch.clone(),
            timeout: self.timeout,
            ..Default::default()
        }
    }

    fn system(&self) -> System {
        System {
            proto: self.system_proto.clone(),
            host: self.system_host.clone(),
            link: format!("{}://{}", self.system_proto, self.system_host),
            version: crate::VERSION.to_string(),
        }
    }

    fn netrc(&self) -> Option<Netrc> {
        self.netrc_machine.as_ref().map(|machine| Netrc {
            machine: machine.clone(),
            login: self.netrc_username.clone(),
            password: self.netrc_password.clone(),
        })
    }
}

/// A pipeline selected from its manifest, together with everything
/// needed to compile it
#[derive(Debug, Clone)]
pub struct Loaded {
    pub config: RunnerConfig,
    pub pipeline: Pipeline,
    pub build: Build,
    pub repo: Repo,
    pub stage: Stage,
    pub system: System,
    pub netrc: Option<Netrc>,
    pub environ: Vec<EnvVar>,
    pub secrets: BTreeMap<String, String>,
    pub root: Option<PathBuf>,
}

impl PipelineArgs {
    /// Read the configuration and pipeline file, substitute variables,
    /// select the pipeline and lint it.
    pub fn load(&self, verbose: bool) -> Result<Loaded> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if self.config.is_some() && !config_path.exists() {
            return Err(RunnerError::FileReadError {
                path: config_path,
                error: "file not found".to_string(),
            }
            .into());
        }
        let config = RunnerConfig::load(&config_path)?;

        let mut environ = config.environ_vars();
        environ.extend(self.environ.iter().map(|(name, data)| EnvVar {
            name: name.clone(),
            data: data.clone(),
            mask: false,
        }));
        let mut secrets = config.secrets.clone();
        secrets.extend(self.secrets.iter().cloned());

        let build = self.metadata.build(&self.params);
        let repo = self.metadata.repo();
        let system = self.metadata.system();
        let mut stage = Stage {
            number: 1,
            name: self.stage_name.clone(),
            ..Default::default()
        };

        let raw = read_source(&self.source)?;
        let scope = environ::combine([
            unmasked_map(&environ),
            environ::system(&system),
            environ::repo(&repo),
            environ::build(&build),
            environ::stage(&stage),
            environ::link(&repo, &build, &system),
            build.params.clone(),
        ]);
        let manifest = Manifest::from_yaml(&substitute_config(&raw, &scope))?;
        let pipeline = manifest.lookup(&self.stage_name)?.clone();

        report_lint(&PipelineValidator::validate(&pipeline), verbose)?;

        stage.name = pipeline.name.clone();
        stage.kind = pipeline.kind.clone();
        stage.kind_type = pipeline.kind_type.clone();
        stage.os = pipeline.platform.os.clone();
        stage.arch = pipeline.platform.arch.clone();
        stage.variant = pipeline.platform.variant.clone();
        stage.depends_on = pipeline.depends_on.clone();

        Ok(Loaded {
            root: self.root.clone().or_else(|| config.root.clone()),
            netrc: self.metadata.netrc(),
            config,
            pipeline,
            build,
            repo,
            stage,
            system,
            environ,
            secrets,
        })
    }
}

impl Loaded {
    pub fn compiler(&self) -> Compiler {
        let mut compiler = Compiler::new()
            .with_environ(StaticEnviron::new(self.environ.clone()))
            .with_secrets(StaticSecrets::new(self.secrets.clone()))
            .with_symlinks(self.config.symlinks.clone())
            .with_host_vars(self.config.host_vars.iter().cloned());
        if let Some(root) = &self.root {
            compiler = compiler.with_root(root);
        }
        compiler
    }

    pub async fn compile(&self) -> Spec {
        let args = CompilerArgs {
            pipeline: &self.pipeline,
            build: &self.build,
            stage: &self.stage,
            repo: &self.repo,
            system: &self.system,
            netrc: self.netrc.as_ref(),
            secret: None,
        };
        self.compiler().compile(&args).await
    }
}

fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RunnerError::PipelineFileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    std::fs::read_to_string(path).map_err(|e| {
        RunnerError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        }
        .into()
    })
}

/// Substitute variables in raw configuration text. Multi-line values
/// are quoted so they stay on one YAML line.
pub fn substitute_config(raw: &str, scope: &Environ) -> String {
    environ::substitute(raw, |name| {
        scope.get(name).map(|value| {
            if value.contains('\n') {
                format!("{:?}", value)
            } else {
                value.clone()
            }
        })
    })
}

/// Print lint findings; errors abort the command
fn report_lint(validation: &ValidationResult, verbose: bool) -> Result<()> {
    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(RunnerError::InvalidPipeline {
            reason: validation.errors.join("; "),
            help: Some("Run 'drover lint' for details".to_string()),
        }
        .into());
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }
    Ok(())
}
