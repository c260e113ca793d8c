use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use node_cycler::cycling::config::{ConfigOverrides, RunConfig};
use node_cycler::cycling::request::CycleRequest;
use node_cycler::gateway::runner::{CommandRunner, ProcessRunner};
use node_cycler::logger::{self, LogSink};
use node_cycler::loader::parser::load_config;
use node_cycler::{SUCCESS_MARKER, cycle_nodes, setup};

/// Replaces every node of a cluster role by doubling its instance group,
/// draining the old nodes and deleting their instances.
#[derive(Parser, Debug)]
#[clap(name = "node-cycler", version)]
struct Args {
    /// kubectl context to act on. Must be given together with --project.
    #[clap(long, env = "KUBE_CONTEXT")]
    context: Option<String>,

    /// Cloud project owning the instance groups. Must be given together with --context.
    #[clap(long, env = "CLOUDSDK_CORE_PROJECT")]
    project: Option<String>,

    /// Cycle only this role (master or worker). Both are cycled, masters first, when omitted.
    #[clap(long)]
    role: Option<String>,

    /// Drain the nodes an interrupted run tagged with this retirement tag. Requires --role.
    #[clap(long, value_name = "TAG")]
    resume: Option<String>,

    /// Seconds a cooperative drain may take before pods are deleted forcibly.
    #[clap(long, value_name = "SECS")]
    drain_timeout: Option<u64>,

    /// Optional JSON configuration file.
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds between convergence checks.
    #[clap(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Give up waiting for the cluster to converge after this many seconds.
    #[clap(long, value_name = "SECS")]
    convergence_timeout: Option<u64>,

    #[clap(long, default_value = "logs")]
    log_dir: PathBuf,

    #[clap(long, default_value = "node-cycler.log")]
    log_file: String,

    /// Log to the console only.
    #[clap(long)]
    no_log_file: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(&LogSink { dir: args.log_dir.clone(), file_name: args.log_file.clone(), enabled: !args.no_log_file });

    match run(args).await {
        Ok(()) => {
            println!("{}", SUCCESS_MARKER);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("node-cycler failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let request = CycleRequest::from_args(args.role.as_deref(), args.resume.as_deref())?;
    let file = load_config(args.config.as_deref()).context("loading configuration file")?;

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    setup::preflight(runner.as_ref()).await?;

    let (context, project) = setup::resolve_target(runner.as_ref(), args.context.or(file.context.clone()), args.project.or(file.project.clone())).await?;
    let overrides = ConfigOverrides { drain_timeout_secs: args.drain_timeout, poll_interval_secs: args.poll_interval, convergence_timeout_secs: args.convergence_timeout };
    let config = RunConfig::from_sources(context, project, &file, &overrides)?;

    let reports = cycle_nodes(runner, config, &request).await?;
    for report in &reports {
        log::info!(
            "{}: tag {}, {} node(s) drained ({} forced), {} instance(s) deleted.",
            report.role,
            report.tag,
            report.drains.len(),
            report.forced_drains(),
            report.deleted_instances.len()
        );
    }
    Ok(())
}
