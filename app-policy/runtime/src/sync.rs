use app_policy_core::Update;
use app_policy_store::SharedManager;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
};

/// An event delivered by the control-plane feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    Update(Update),

    /// The feed was interrupted and will resend a complete snapshot.
    Reconnecting,
}

/// Applies feed events to the store until the channel closes.
///
/// This task is the only writer of the store.
pub async fn process(
    manager: SharedManager,
    store_staged: bool,
    mut events: mpsc::Receiver<SyncEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Update(update) => manager.apply_update(update, store_staged),
            SyncEvent::Reconnecting => manager.on_reconnecting(),
        }
    }
    tracing::debug!("Control feed closed");
}

/// Reads newline-delimited JSON updates and forwards them as feed events.
///
/// Lines that fail to decode are logged and skipped. Returns when the input
/// ends or the receiver is dropped.
pub async fn read_updates<R>(reader: R, events: mpsc::Sender<SyncEvent>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let update = match serde_json::from_str::<Update>(line) {
            Ok(update) => update,
            Err(error) => {
                tracing::warn!(%error, "Skipping undecodable update");
                continue;
            }
        };
        if events.send(SyncEvent::Update(update)).await.is_err() {
            tracing::debug!("Control feed consumer stopped");
            return Ok(());
        }
    }
    Ok(())
}
