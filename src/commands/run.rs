//! The `run` command: connect to the homeserver and serve away-mode replies

use crate::commands::open_store;
use crate::config::Config;
use crate::engine::{metrics, AwaySessionManager};
use crate::error::Result;
use crate::transport::matrix::MatrixTransport;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bootstrap the engine and process inbound events until interrupted.
///
/// On first startup (no management-room binding for the account yet) the
/// management room is created and the binding persisted; afterwards the
/// existing binding is reused across restarts.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    metrics::init_metrics_exporter();

    let config = Arc::new(config);
    let store = Arc::new(open_store(&config)?);
    let transport = Arc::new(MatrixTransport::new(&config.transport, &config.room));

    let account = transport.account_id().await?;
    info!(account = %account, "Authenticated");

    let management_room = match store.management_room(&account)? {
        Some(room) => room,
        None => {
            let room = transport.create_management_room().await?;
            store.store_management_room(&account, &room)?;
            room
        }
    };
    info!(management_room = %management_room, "Management room ready");

    let manager = Arc::new(AwaySessionManager::new(
        store,
        transport.clone(),
        config.clone(),
        management_room,
    )?);

    if manager.is_away().await {
        info!("Starting in away state");
    }

    loop {
        match transport.next_events().await {
            Ok(batch) => {
                for msg in batch {
                    // One task per message: per-conversation ordering is
                    // enforced inside the manager, not by the loop.
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        let conversation_id = msg.conversation_id.clone();
                        if let Err(e) = manager.handle_inbound(msg).await {
                            error!(
                                conversation_id = %conversation_id,
                                error = %e,
                                "Failed to handle inbound message"
                            );
                        }
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "Sync failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
