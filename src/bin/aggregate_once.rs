//! Runs one aggregation from the command line and prints the JSON result.
//!
//! Usage: `aggregate_once <group> [key=value ...]`

use api_aggregator::error::AggregationFailurePayload;
use api_aggregator::{AggregatorError, AggregatorRuntime, AppConfig, PathVariables};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(group) = args.next() else {
        anyhow::bail!("usage: aggregate_once <group> [key=value ...]");
    };
    let vars: PathVariables = args
        .filter_map(|a| a.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect();

    let cfg = AppConfig::load_default()?;
    let runtime = AggregatorRuntime::from_config(&cfg)?;
    let result = runtime.aggregator.aggregate(&group, &vars).await;
    runtime.shutdown().await;

    match result {
        Ok(merged) => {
            println!("{}", serde_json::to_string_pretty(&merged)?);
            Ok(())
        }
        Err(AggregatorError::AggregationFailed(failures)) => {
            let payload = AggregationFailurePayload::from_failures(&failures);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
