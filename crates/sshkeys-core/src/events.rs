use crate::error::CoreError;
use crate::reconcile::{ToggleAction, ToggleOutcome};
use sshkeys_keychain::{AgentIdentity, AgentManager, IdentityAgent, Key, KeychainError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

/// Results of background work, applied one at a time by the event loop.
pub enum AppEvent {
    KeysScanned(Result<Vec<Key>, KeychainError>),
    AgentReady(Result<(AgentManager, Vec<AgentIdentity>), KeychainError>),
    Toggled(Result<ToggleOutcome, CoreError>),
}

#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<AppEvent>,
}

impl EventSender {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AppEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub async fn send(&self, event: AppEvent) {
        // The receiver is gone once the UI has quit; nothing left to update.
        let _ = self.sender.send(event).await;
    }

    pub fn spawn_scan(&self, root: PathBuf) {
        let events = self.clone();
        tokio::spawn(async move {
            let path = root.clone();
            let result = tokio::task::spawn_blocking(move || sshkeys_keychain::scan(&root))
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "key scan task failed");
                    Err(KeychainError::io(path, std::io::Error::other(e.to_string())))
                });
            events.send(AppEvent::KeysScanned(result)).await;
        });
    }

    pub fn spawn_agent(&self, endpoint: Option<PathBuf>) {
        let events = self.clone();
        tokio::spawn(async move {
            let result = async {
                let mut agent = AgentManager::connect(endpoint.as_deref()).await?;
                let identities = agent.list().await?;
                Ok::<_, KeychainError>((agent, identities))
            }
            .await;
            events.send(AppEvent::AgentReady(result)).await;
        });
    }

    pub fn spawn_toggle<A>(&self, action: ToggleAction, agent: Arc<Mutex<A>>)
    where
        A: IdentityAgent + 'static,
    {
        let events = self.clone();
        tokio::spawn(async move {
            let mut agent = agent.lock().await;
            let result = action.execute(&mut *agent).await.map_err(CoreError::from);
            drop(agent);
            events.send(AppEvent::Toggled(result)).await;
        });
    }
}
