use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use snapshot_reaper_core::ReaperConfig;
use snapshot_reaper_lambda::adapters::ec2::Ec2ComputeProvider;
use snapshot_reaper_lambda::handlers::scheduled::{
    cancellation_budget, deadline_margin_from_lookup, handle_scheduled_event, InvocationResponse,
};
use snapshot_reaper_lambda::logging::init_lambda_tracing;
use tokio::sync::watch;

struct RuntimeDependencies {
    provider: Ec2ComputeProvider,
    config: ReaperConfig,
    deadline_margin: Duration,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<InvocationResponse, Error> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let budget = cancellation_budget(event.context.deadline, now_ms(), deps.deadline_margin);
    let watchdog = tokio::spawn(async move {
        tokio::time::sleep(budget).await;
        tracing::warn!("invocation deadline approaching, cancelling remaining deletions");
        cancel_tx.send_replace(true);
    });

    let result = handle_scheduled_event(
        event.payload,
        &deps.provider,
        &deps.config,
        Some(cancel_rx),
    )
    .await;
    watchdog.abort();

    match result {
        Ok(response) => Ok(response),
        Err(failure) => {
            tracing::error!(
                step = failure.step,
                status_code = failure.status_code,
                error = %failure.message,
                "invocation failed"
            );
            Err(Error::from(failure))
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_lambda_tracing();

    let config = ReaperConfig::from_env()?;
    let deadline_margin = deadline_margin_from_lookup(|key| std::env::var(key).ok())?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    tracing::info!(
        states = ?config.states.names(),
        delete_concurrency = config.delete_concurrency,
        dry_run = config.dry_run,
        "snapshot reaper initialised"
    );

    let deps = RuntimeDependencies {
        provider: Ec2ComputeProvider::from_sdk_config(&aws_config),
        config,
        deadline_margin,
    };
    let deps = &deps;

    lambda_runtime::run(service_fn(move |event| handle_request(event, deps))).await
}
