use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use monitor::{
    MonitorSession, ReconciledView,
    api::CampaignsClient,
    snapshot::SnapshotSource,
    transport::{SseTransport, Transport},
};
use shared::{config::Config, models::StreamError};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use crate::format;

#[derive(Args, Debug)]
#[command(about = "Stream live metrics for one campaign")]
pub struct WatchArgs {
    /// Campaign identifier to watch
    pub id: String,

    /// Stop after this many metric updates
    #[arg(long, value_name = "N")]
    pub max_updates: Option<usize>,

    /// Reconnect this many seconds after the stream fails instead of exiting
    #[arg(long, value_name = "SECS")]
    pub retry_after: Option<u64>,
}

pub async fn watch(config: &Config, args: WatchArgs) -> Result<()> {
    let transport = SseTransport::from_config(config)?;
    let client = Arc::new(CampaignsClient::from_config(config)?);
    let mut session = MonitorSession::from_config(transport, client, config);

    println!(
        "Watching campaign {}... (press Ctrl+C to stop)",
        args.id
    );
    session.select(Some(args.id.as_str().into()));
    println!("{}", format::view_line(&args.id, &session.view()));

    let result = tokio::select! {
        result = follow(&mut session, &args) => result,
        _ = tokio::signal::ctrl_c() => {
            info!(campaign = %args.id, "interrupted");
            Ok(())
        }
    };
    session.dispose();
    result
}

/// Prints every view change until `max_updates` metric views were shown.
async fn follow<T, S>(session: &mut MonitorSession<T, S>, args: &WatchArgs) -> Result<()>
where
    T: Transport,
    S: SnapshotSource + 'static,
{
    let mut updates = 0;
    loop {
        let view = session.next_view().await;
        println!("{}", format::view_line(&args.id, &view));

        match &view {
            ReconciledView::Value { .. } => {
                updates += 1;
                if args.max_updates.is_some_and(|max| updates >= max) {
                    return Ok(());
                }
            }
            ReconciledView::Errored { error, .. } => {
                let channel_open = session.subscriptions().is_open();
                match on_error(session.state().stream_error(), channel_open, args.retry_after) {
                    ErrorAction::Keep => {}
                    ErrorAction::Retry(delay) => {
                        warn!(campaign = %args.id, channel_open, ?delay, "retrying");
                        sleep(delay).await;
                        session.retry();
                    }
                    ErrorAction::Fail => {
                        bail!("live stream for {} closed: {}", args.id, error.message);
                    }
                }
            }
            ReconciledView::Empty | ReconciledView::Loading => {}
        }
    }
}

/// What `watch` does about an errored view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorAction {
    /// Keep following; more updates may still arrive.
    Keep,
    /// Wait, then retry whatever failed.
    Retry(Duration),
    /// Give up.
    Fail,
}

/// Decides from the stream error itself, not from older snapshot state.
///
/// An undecodable frame never closes the channel, so it is shown and skipped. A closed
/// channel is retried when `retry_after` is set and fatal otherwise. Without a stream
/// error the view comes from a failed snapshot while live values may still arrive.
fn on_error(
    stream_error: Option<&StreamError>,
    channel_open: bool,
    retry_after: Option<u64>,
) -> ErrorAction {
    let retry = retry_after.map(|secs| ErrorAction::Retry(Duration::from_secs(secs)));
    match stream_error {
        Some(error) if error.is_parse_failure() => ErrorAction::Keep,
        Some(_) if !channel_open => retry.unwrap_or(ErrorAction::Fail),
        Some(_) | None => retry.unwrap_or(ErrorAction::Keep),
    }
}
