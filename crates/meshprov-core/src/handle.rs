// ── Provisioner actor ──
//
// Moves a `Provisioner` into a single tokio task and serializes every
// command through an mpsc channel. Cheaply cloneable; all clones talk to
// the same task.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::error::CoreError;
use crate::event::ProvisionerEvent;
use crate::model::SettingsId;
use crate::provisioner::Provisioner;

const COMMAND_CHANNEL_SIZE: usize = 64;

/// Async entry point for consumers.
#[derive(Clone)]
pub struct ProvisionerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    event_tx: broadcast::Sender<Arc<ProvisionerEvent>>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<Provisioner>>>,
}

impl std::fmt::Debug for ProvisionerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionerHandle")
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ProvisionerHandle {
    /// Start the command processor task. Must be called inside a tokio
    /// runtime.
    pub fn spawn(provisioner: Provisioner) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let event_tx = provisioner.event_sender();
        let task = tokio::spawn(command_processor_task(
            provisioner,
            command_rx,
            cancel.clone(),
        ));
        debug!("provisioner task spawned");

        Self {
            inner: Arc::new(HandleInner {
                event_tx,
                command_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    // ── Command execution ────────────────────────────────────────────

    /// Send a command to the task and wait for its result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let (tx, rx) = oneshot::channel();

        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ActorStopped)?;

        rx.await.map_err(|_| CoreError::ActorStopped)?
    }

    /// Subscribe to the event broadcast stream.
    pub fn events(&self) -> broadcast::Receiver<Arc<ProvisionerEvent>> {
        self.inner.event_tx.subscribe()
    }

    /// Stop the task and hand back the provisioner it owned.
    ///
    /// Returns `None` if another clone already shut the task down.
    pub async fn shutdown(&self) -> Option<Provisioner> {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take()?;
        match task.await {
            Ok(provisioner) => {
                debug!("provisioner task stopped");
                Some(provisioner)
            }
            Err(e) => {
                warn!(error = %e, "provisioner task ended abnormally");
                None
            }
        }
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: open and restore `id`, run the closure, then release
    /// (writing the live state back) and close.
    ///
    /// The session is released and closed even when the closure fails;
    /// the closure's error wins over cleanup errors. The closure may use
    /// any error type that core errors convert into.
    pub async fn oneshot<F, Fut, T, E>(
        provisioner: Provisioner,
        id: SettingsId,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(ProvisionerHandle) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let handle = Self::spawn(provisioner);
        let result = handle.run_in_session(&id, f).await;
        handle.shutdown().await;
        result
    }

    async fn run_in_session<F, Fut, T, E>(&self, id: &SettingsId, f: F) -> Result<T, E>
    where
        F: FnOnce(ProvisionerHandle) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        self.execute(Command::OpenSettings(id.clone())).await?;
        if let Err(e) = self.execute(Command::RestoreSettings(id.clone())).await {
            let _ = self.execute(Command::CloseSettings(id.clone())).await;
            return Err(e.into());
        }

        let result = f(self.clone()).await;

        let released = self
            .execute(Command::ReleaseSettings {
                id: id.clone(),
                erase: false,
            })
            .await;
        let closed = self.execute(Command::CloseSettings(id.clone())).await;

        let value = result?;
        released?;
        closed?;
        Ok(value)
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Process commands from the mpsc channel until cancelled or every sender
/// is gone, then hand the provisioner back.
async fn command_processor_task(
    mut provisioner: Provisioner,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) -> Provisioner {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&mut provisioner, envelope.command);
                let _ = envelope.response_tx.send(result);
            }
        }
    }
    provisioner
}

// ── Command routing ──────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
fn route_command(p: &mut Provisioner, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        // ── Keys ─────────────────────────────────────────────────────
        Command::AddNetKey { value, index } => {
            p.add_net_key(value, index).map(CommandResult::KeyIndex)
        }
        Command::UpdateNetKey { value, index } => {
            p.update_net_key(value, index)?;
            Ok(CommandResult::Ok)
        }
        Command::GetNetKey { index } => p.net_key(index).map(CommandResult::Key),
        Command::ListNetKeys => Ok(CommandResult::NetKeys(p.net_key_indexes())),
        Command::AddAppKey {
            value,
            net_index,
            app_index,
        } => p
            .add_app_key(value, net_index, app_index)
            .map(CommandResult::KeyIndex),
        Command::UpdateAppKey {
            value,
            net_index,
            app_index,
        } => {
            p.update_app_key(value, net_index, app_index)?;
            Ok(CommandResult::Ok)
        }
        Command::GetAppKey {
            net_index,
            app_index,
        } => p.app_key(net_index, app_index).map(CommandResult::Key),
        Command::ListAppKeys => Ok(CommandResult::AppKeys(p.app_key_indexes())),
        Command::BindAppKey {
            element,
            app_index,
            model,
        } => {
            p.bind_app_key_to_local_model(element, app_index, model)?;
            Ok(CommandResult::Ok)
        }
        Command::ListBindings => Ok(CommandResult::Bindings(p.bindings().to_vec())),

        // ── Nodes ────────────────────────────────────────────────────
        Command::ProvisioningComplete(node) => p
            .provisioning_complete(node)
            .map(|i| CommandResult::NodeIndex(Some(i))),
        Command::StoreCompositionData { addr, data } => {
            p.store_composition_data(addr, data)?;
            Ok(CommandResult::Ok)
        }
        Command::SetNodeName { index, name } => {
            p.set_node_name(index, &name)?;
            Ok(CommandResult::Ok)
        }
        Command::GetNodeName { index } => p.node_name(index).map(CommandResult::NodeName),
        Command::GetNodeIndexByName { name } => {
            Ok(CommandResult::NodeIndex(p.node_index_by_name(&name)))
        }
        Command::GetNodeByUuid { uuid } => Ok(CommandResult::Node(
            p.node_by_uuid(uuid).cloned().map(Box::new),
        )),
        Command::GetNodeByAddress { addr } => Ok(CommandResult::Node(
            p.node_by_address(addr).cloned().map(Box::new),
        )),
        Command::DeleteNodeByUuid { uuid } => p
            .delete_node_by_uuid(uuid)
            .map(|n| CommandResult::Node(Some(Box::new(n)))),
        Command::DeleteNodeByAddress { addr } => p
            .delete_node_by_address(addr)
            .map(|n| CommandResult::Node(Some(Box::new(n)))),
        Command::GetNodeCount => Ok(CommandResult::Count(p.node_count())),
        Command::GetNodeTable => Ok(CommandResult::NodeTable(p.node_table().to_vec())),

        // ── Heartbeat filter ─────────────────────────────────────────
        Command::StartHeartbeatReceiving => {
            p.start_heartbeat_receiving();
            Ok(CommandResult::Ok)
        }
        Command::StopHeartbeatReceiving => {
            p.stop_heartbeat_receiving();
            Ok(CommandResult::Ok)
        }
        Command::SetHeartbeatFilterType(filter_type) => {
            p.set_heartbeat_filter_type(filter_type);
            Ok(CommandResult::Ok)
        }
        Command::SetHeartbeatFilterInfo { op, info } => {
            p.set_heartbeat_filter_info(op, info)?;
            Ok(CommandResult::Ok)
        }
        Command::ListHeartbeatFilter => Ok(CommandResult::FilterEntries {
            entries: p.heartbeat_filter_entries(),
            filter_type: p.heartbeat_filter_type(),
            receiving: p.is_receiving_heartbeats(),
        }),
        Command::EvaluateHeartbeat { src, dst } => {
            Ok(CommandResult::Passed(p.evaluate_heartbeat(src, dst)))
        }
        Command::Heartbeat(heartbeat) => Ok(CommandResult::Passed(p.on_heartbeat(heartbeat))),

        // ── Settings sessions ────────────────────────────────────────
        Command::OpenSettings(id) => p.open_settings(&id).map(CommandResult::Slot),
        Command::RestoreSettings(id) => p.restore_settings(&id).map(CommandResult::Slot),
        Command::ReleaseSettings { id, erase } => {
            p.release_settings(&id, erase).map(CommandResult::Slot)
        }
        Command::CloseSettings(id) => p.close_settings(&id).map(CommandResult::Slot),
        Command::DeleteSettings(id) => p.delete_settings(&id).map(CommandResult::Slot),
        Command::EraseAllSettings => {
            p.erase_all_settings()?;
            Ok(CommandResult::Ok)
        }
        Command::CommitSettings => p.commit_settings().map(CommandResult::Slot),
        Command::GetSettingsUserId { index } => {
            p.settings_user_id(index).map(CommandResult::UserId)
        }
        Command::GetSettingsIndex { user_id } => {
            Ok(CommandResult::SettingsIndex(p.settings_index_of(&user_id)))
        }
        Command::GetFreeSettingsUserIdCount => {
            Ok(CommandResult::Count(p.free_settings_user_id_count()))
        }
        Command::GetSettingsState(id) => p.settings_state(&id).map(CommandResult::State),
        Command::GetActiveSettings => Ok(CommandResult::Active(p.active_settings())),
        Command::ListSettings => Ok(CommandResult::Settings(p.settings_slots())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ProvisionerConfig;
    use crate::model::{IndexRequest, KeyIndex, KeyValue};
    use crate::settings::{MemoryStorage, SettingsSnapshot};

    fn provisioner(storage: &MemoryStorage) -> Provisioner {
        Provisioner::new(ProvisionerConfig::default(), Box::new(storage.clone())).unwrap()
    }

    #[tokio::test]
    async fn commands_round_trip_through_the_task() {
        let storage = MemoryStorage::new();
        let handle = ProvisionerHandle::spawn(provisioner(&storage));
        let mut events = handle.events();

        let result = handle
            .execute(Command::AddNetKey {
                value: None,
                index: IndexRequest::Generate,
            })
            .await
            .unwrap();
        let CommandResult::KeyIndex(index) = result else {
            panic!("unexpected result {result:?}");
        };
        assert_eq!(index, KeyIndex::new(0).unwrap());
        assert_eq!(
            *events.recv().await.unwrap(),
            ProvisionerEvent::NetKeyIndexGenerated { net_index: index }
        );

        let err = handle
            .execute(Command::GetNetKey {
                index: KeyIndex::new(9).unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));

        let provisioner = handle.shutdown().await.unwrap();
        assert_eq!(provisioner.net_key_indexes(), vec![index]);
    }

    #[tokio::test]
    async fn execute_after_shutdown_fails() {
        let storage = MemoryStorage::new();
        let handle = ProvisionerHandle::spawn(provisioner(&storage));
        handle.shutdown().await.unwrap();
        assert!(handle.shutdown().await.is_none());
        assert!(matches!(
            handle.execute(Command::ListNetKeys).await,
            Err(CoreError::ActorStopped)
        ));
    }

    #[tokio::test]
    async fn oneshot_persists_the_session() {
        let storage = MemoryStorage::new();
        let key = KeyValue::new([0x5A; 16]);
        let id = SettingsId::user_id("cli");

        let stored = key.clone();
        ProvisionerHandle::oneshot(provisioner(&storage), id.clone(), |h| async move {
            h.execute(Command::AddNetKey {
                value: Some(stored),
                index: IndexRequest::Exact(KeyIndex::new(0x10).unwrap()),
            })
            .await
        })
        .await
        .unwrap();

        assert!(!storage.is_open(0));
        let snapshot = SettingsSnapshot::decode(&storage.region(0).unwrap()).unwrap();
        assert_eq!(snapshot.net_keys[0].value, key);

        let read = ProvisionerHandle::oneshot(provisioner(&storage), id, |h| async move {
            h.execute(Command::GetNetKey {
                index: KeyIndex::new(0x10).unwrap(),
            })
            .await
        })
        .await
        .unwrap();
        assert!(matches!(read, CommandResult::Key(k) if k == key));
    }

    #[tokio::test]
    async fn oneshot_closes_session_on_failure() {
        let storage = MemoryStorage::new();
        let err = ProvisionerHandle::oneshot(provisioner(&storage), SettingsId::Index(1), |h| async move {
            h.execute(Command::GetNetKey {
                index: KeyIndex::new(1).unwrap(),
            })
            .await
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(!storage.is_open(1));
    }
}
