use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{info, warn};

use crate::client::{ApiClient, ClientError};
use crate::model::IndexStatus;

#[derive(Clone, Debug)]
pub struct WatchOptions {
    pub interval: Duration,
    /// Consecutive failed polls tolerated before giving up.
    pub max_failures: u32,
    /// Polls to wait for a freshly triggered run to report itself active.
    pub start_polls: u32,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_failures: 5,
            start_polls: 0,
        }
    }
}

pub fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template(
            ":: Reindex: [{pos}/{len}] :: {percent}% :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(r#"#>-"#),
    );
    pb
}

fn update_bar(bar: &ProgressBar, status: &IndexStatus) {
    bar.set_length(status.grand_total);
    bar.set_position(status.total_done.min(status.grand_total));
    match status.busiest_category() {
        Some(category) => bar.set_message(category.to_string()),
        None => bar.set_message(String::new()),
    }
}

/// Polls the index progress endpoint until the backend reports the run as
/// finished, mirroring each status onto `bar`.
pub async fn watch(
    client: &ApiClient,
    options: &WatchOptions,
    bar: &ProgressBar,
) -> Result<IndexStatus, ClientError> {
    let mut failures = 0u32;
    let mut start_polls_left = options.start_polls;
    let mut seen_active = false;

    loop {
        match client.index_progress().await {
            Ok(status) => {
                failures = 0;
                update_bar(bar, &status);
                if status.active {
                    seen_active = true;
                } else if seen_active || start_polls_left == 0 {
                    bar.finish_with_message("done");
                    info!(
                        done = status.total_done,
                        total = status.grand_total,
                        "reindex finished"
                    );
                    return Ok(status);
                } else {
                    start_polls_left -= 1;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "index progress poll failed");
                if failures >= options.max_failures.max(1) {
                    bar.abandon_with_message("progress unavailable");
                    return Err(e);
                }
            }
        }
        tokio::time::sleep(options.interval).await;
    }
}

/// Starts a reindex run and waits for it to complete.
pub async fn trigger_and_watch(
    client: &ApiClient,
    options: &WatchOptions,
    bar: &ProgressBar,
) -> Result<IndexStatus, ClientError> {
    client.trigger_reindex().await?;
    info!("reindex triggered");
    let options = WatchOptions {
        start_polls: options.start_polls.max(1),
        ..options.clone()
    };
    watch(client, &options, bar).await
}
