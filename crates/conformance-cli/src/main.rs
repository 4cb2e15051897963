// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conformance CLI
//!
//! Waits for the conformance pod to start, relays its log to stdout and
//! exits with the exit code of the conformance container. Diagnostics go
//! to stderr so stdout carries nothing but the pod log.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conformance_config::{
	load_config_with_cli,
	runtime::{LogFormat, LogLevel, LoggingConfig},
	CliOverrides, RunnerConfig,
};
use conformance_k8s::{K8sClient, KubeClient};
use conformance_runner::{
	BackoffPolicy, Coordinator, CoordinatorSettings, LineSink, PodRef, RunResult, TeeSink,
	WriterSink,
};

const LOG_FILE_NAME: &str = "conformance.log";

/// Conformance - follow a Kubernetes conformance pod to completion
#[derive(Parser, Debug)]
#[command(name = "conformance", version, about, long_about = None)]
struct Args {
	/// Path to a TOML configuration file
	#[arg(short, long, env = "CONFORMANCE_CONFIG")]
	config: Option<PathBuf>,

	/// Kubeconfig to use (default: $KUBECONFIG, then ~/.kube/config)
	#[arg(long)]
	kubeconfig: Option<PathBuf>,

	/// Namespace of the conformance pod
	#[arg(short, long)]
	namespace: Option<String>,

	/// Name of the conformance pod
	#[arg(long)]
	pod_name: Option<String>,

	/// Container whose exit code decides the run
	#[arg(long)]
	container: Option<String>,

	/// How long to wait for the pod to start, e.g. "5m"
	#[arg(long, value_name = "DURATION")]
	startup_timeout: Option<String>,

	/// Give up on the whole run after this long, e.g. "2h"
	#[arg(long, value_name = "DURATION")]
	run_timeout: Option<String>,

	/// Directory that receives a copy of the pod log
	#[arg(long)]
	output_dir: Option<PathBuf>,

	/// Prefix each relayed log line with its timestamp
	#[arg(long)]
	timestamps: bool,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Log format: pretty, compact or json (overrides config)
	#[arg(long)]
	log_format: Option<String>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
	/// Stream the pod log and exit with the container's exit code (default)
	Run,
	/// Stream the pod log until it ends
	Logs,
	/// Wait for the container to finish and print its exit code
	ExitCode,
}

impl From<&Args> for CliOverrides {
	fn from(args: &Args) -> Self {
		CliOverrides {
			config_file: args.config.clone(),
			kubeconfig: args.kubeconfig.clone(),
			namespace: args.namespace.clone(),
			pod_name: args.pod_name.clone(),
			container: args.container.clone(),
			startup_timeout: args.startup_timeout.clone(),
			run_timeout: args.run_timeout.clone(),
			output_dir: args.output_dir.clone(),
			log_level: args.log_level.clone(),
			log_format: args.log_format.clone(),
		}
	}
}

fn log_level_to_tracing(level: LogLevel) -> tracing::Level {
	match level {
		LogLevel::Trace => tracing::Level::TRACE,
		LogLevel::Debug => tracing::Level::DEBUG,
		LogLevel::Info => tracing::Level::INFO,
		LogLevel::Warn => tracing::Level::WARN,
		LogLevel::Error => tracing::Level::ERROR,
	}
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(format!(
			"conformance={}",
			log_level_to_tracing(logging.level)
		))
	});

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

fn coordinator_settings(config: &RunnerConfig) -> CoordinatorSettings {
	CoordinatorSettings {
		startup_timeout: config.startup_timeout,
		log_drain_timeout: config.log_drain_timeout,
		backoff: BackoffPolicy {
			initial_interval: config.poll.initial_interval,
			max_interval: config.poll.max_interval,
			multiplier: config.poll.multiplier,
			jitter: config.poll.jitter,
			max_lookup_failures: config.poll.max_lookup_failures,
		},
		..CoordinatorSettings::default()
	}
}

async fn connect(config: &RunnerConfig) -> Result<Arc<dyn K8sClient>> {
	let client = match config.kubeconfig_path() {
		Ok(path) if path.exists() => {
			info!(kubeconfig = %path.display(), "loading kubeconfig");
			KubeClient::from_kubeconfig(&path).await?
		}
		Ok(path) if config.kubeconfig.is_some() => {
			anyhow::bail!("kubeconfig {} does not exist", path.display());
		}
		_ => {
			info!("no kubeconfig file found, inferring cluster configuration");
			KubeClient::new().await?
		}
	};
	Ok(Arc::new(client))
}

/// Stdout, mirrored to a log file when an output directory is configured.
fn build_sink(output_dir: Option<&Path>) -> Result<Box<dyn LineSink>> {
	let stdout: Box<dyn LineSink> = Box::new(WriterSink::stdout());
	let Some(dir) = output_dir else {
		return Ok(stdout);
	};

	std::fs::create_dir_all(dir)
		.with_context(|| format!("failed to create output directory {}", dir.display()))?;
	let path = dir.join(LOG_FILE_NAME);
	let file =
		File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
	info!(path = %path.display(), "writing pod log copy");

	Ok(Box::new(TeeSink::new(
		stdout,
		Box::new(WriterSink::new(BufWriter::new(file))),
	)))
}

fn setup_ctrlc_handler(cancel: CancellationToken) -> Result<()> {
	ctrlc::set_handler(move || {
		info!("received Ctrl+C, requesting shutdown");
		cancel.cancel();
	})
	.context("failed to set Ctrl+C handler")?;

	Ok(())
}

fn spawn_run_deadline(timeout: Duration, cancel: CancellationToken) {
	tokio::spawn(async move {
		tokio::select! {
			_ = cancel.cancelled() => {}
			_ = tokio::time::sleep(timeout) => {
				warn!(
					timeout = %humantime::format_duration(timeout),
					"run timeout expired, cancelling"
				);
				cancel.cancel();
			}
		}
	});
}

/// Process exit status for a run: the low byte of the exit code, the way a
/// shell reports it, so an undetermined result exits with 255.
fn exit_status(result: RunResult) -> ExitCode {
	ExitCode::from(result.process_status())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let args = Args::parse();

	let cli_overrides = CliOverrides::from(&args);
	let config = load_config_with_cli(cli_overrides).context("failed to load configuration")?;

	init_tracing(&config.logging);

	let pod = PodRef::new(config.namespace.clone(), config.pod_name.clone());
	info!(
		pod = %pod,
		container = %config.container,
		startup_timeout = %humantime::format_duration(config.startup_timeout),
		"starting conformance run"
	);

	let cancel = CancellationToken::new();
	setup_ctrlc_handler(cancel.clone())?;
	if let Some(timeout) = config.run_timeout {
		spawn_run_deadline(timeout, cancel.clone());
	}

	let client = connect(&config)
		.await
		.context("failed to connect to the cluster")?;
	let mut settings = coordinator_settings(&config);
	settings.log_options.timestamps = args.timestamps;
	let coordinator = Coordinator::new(client, settings);

	match args.command.unwrap_or(Command::Run) {
		Command::Run => {
			let sink = build_sink(config.output_dir.as_deref())?;
			let result = coordinator
				.run(&pod, &config.container, sink, &cancel)
				.await
				.context("conformance run failed")?;
			if !result.is_determined() {
				warn!(pod = %pod, "exit code could not be determined");
			}
			Ok(exit_status(result))
		}
		Command::Logs => {
			let sink = build_sink(config.output_dir.as_deref())?;
			let lines = coordinator
				.print_running_logs(&pod, &config.container, sink, &cancel)
				.await
				.context("failed to stream pod logs")?;
			info!(pod = %pod, lines, "log stream ended");
			Ok(ExitCode::SUCCESS)
		}
		Command::ExitCode => {
			let result = coordinator
				.await_exit_code(&pod, &config.container, &cancel)
				.await
				.context("failed to watch pod")?;
			println!("{}", result.exit_code);
			Ok(exit_status(result))
		}
	}
}
