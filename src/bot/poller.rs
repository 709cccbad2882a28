use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::events::event_from_update;
use super::router::CommandRouter;
use crate::notifications::senders::telegram::TelegramSender;

const POLL_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 1;
const MAX_RETRY_DELAY_SECONDS: u64 = 60;

/// Long-polls Telegram for operator input and hands each event to the router
/// on its own task, so a slow restart never blocks the next command.
pub async fn run_update_loop(
    telegram: Arc<TelegramSender>,
    router: Arc<CommandRouter>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut offset: i64 = 0;
    let mut retry_delay_seconds = DEFAULT_RETRY_DELAY_SECONDS;
    info!("Telegram update loop started.");

    loop {
        let updates = tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received, stopping update loop.");
                break;
            }
            result = telegram.get_updates(offset, POLL_TIMEOUT_SECONDS) => result,
        };

        let updates = match updates {
            Ok(updates) => {
                retry_delay_seconds = DEFAULT_RETRY_DELAY_SECONDS;
                updates
            }
            Err(e) => {
                error!(
                    error = %e,
                    delay_seconds = retry_delay_seconds,
                    "Failed to fetch updates. Will retry."
                );
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(Duration::from_secs(retry_delay_seconds)) => {}
                }
                retry_delay_seconds = (retry_delay_seconds * 2).min(MAX_RETRY_DELAY_SECONDS);
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            match event_from_update(&update) {
                Some(event) => {
                    let router = Arc::clone(&router);
                    tokio::spawn(async move {
                        router.handle(event).await;
                    });
                }
                None => {
                    debug!(
                        update_id = update.update_id,
                        "Ignoring update without a recognised command."
                    );
                }
            }
        }
    }
    info!("Telegram update loop ended.");
}
