use anyhow::Context;
use clap::Parser;
use snapshot_reaper_core::config::{parse_concurrency, DELETE_CONCURRENCY_ENV};
use snapshot_reaper_core::{
    InstanceState, InstanceStateFilter, ReaperConfig, ReconcileOptions, Reconciler,
};
use snapshot_reaper_lambda::adapters::ec2::Ec2ComputeProvider;
use snapshot_reaper_lambda::logging::init_cli_tracing;
use tokio::sync::watch;

#[derive(Parser)]
#[command(
    name = "snapshot_reaper_cli",
    about = "Delete EBS snapshots whose source volume is no longer attached to a live instance",
    long_about = "Runs one reconciliation pass against the account and region of the current\n\
                  AWS environment. Settings default to the SNAPSHOT_REAPER_* environment\n\
                  variables; flags override them."
)]
struct Cli {
    /// Report what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,
    /// Instance state whose volumes count as active (repeatable)
    #[arg(long = "state", value_name = "STATE")]
    states: Vec<String>,
    /// Maximum number of concurrent delete requests
    #[arg(long, value_name = "N")]
    concurrency: Option<String>,
    /// AWS region, overriding the environment
    #[arg(long)]
    region: Option<String>,
    /// Log each snapshot as it is checked
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<ReaperConfig> {
    let mut config = ReaperConfig::from_env().context("invalid SNAPSHOT_REAPER_* environment")?;

    if cli.dry_run {
        config.dry_run = true;
    }
    if !cli.states.is_empty() {
        config.states =
            InstanceStateFilter::new(cli.states.iter().map(|raw| InstanceState::parse(raw)))
                .context("invalid --state")?;
    }
    if let Some(raw) = &cli.concurrency {
        config.delete_concurrency =
            parse_concurrency(DELETE_CONCURRENCY_ENV, raw).context("invalid --concurrency")?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose);

    let config = resolve_config(&cli)?;

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = cli.region.clone() {
        loader = loader.region(aws_config::Region::new(region));
    }
    let sdk_config = loader.load().await;
    let provider = Ec2ComputeProvider::from_sdk_config(&sdk_config);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing in-flight deletions");
            cancel_tx.send_replace(true);
        }
    });

    let options = ReconcileOptions::from(&config).with_cancellation(cancel_rx);
    let summary = Reconciler::new(&provider, options)
        .run()
        .await
        .with_context(|| "reconciliation aborted before any deletion")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    eprintln!("{}", summary.headline());

    Ok(())
}
