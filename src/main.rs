use chrono::Local;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ccgp_scrap::config::RunConfig;
use ccgp_scrap::process::process_site;
use ccgp_scrap::{info_time, logging};

#[tokio::main]
async fn main() {
    let config = RunConfig::parse();
    logging::init(config.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current step");
                cancel.cancel();
            }
        }
    });

    let start_time = Local::now();
    match process_site(&config, cancel).await {
        Ok(summary) => {
            info!(
                matched = summary.matched,
                screenshots = summary.screenshots,
                "found {} matching records out of {}",
                summary.matched,
                summary.hits_found
            );
            info_time!(start_time, "Full program time:");
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
