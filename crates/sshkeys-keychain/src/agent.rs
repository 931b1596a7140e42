use crate::error::KeychainError;
use crate::key::AgentIdentity;
use async_trait::async_trait;
use ssh_agent_lib::agent::Session;
use ssh_agent_lib::client::Client;
use ssh_agent_lib::proto::{AddIdentity, Credential as PrivateCredential, RemoveIdentity};
use ssh_encoding::Encode;
use ssh_key::{PrivateKey, PublicKey};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the agent socket.
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// The three agent requests the application relies on.
///
/// Implementations do not de-duplicate or pre-check anything; what happens
/// when a key is added twice or a missing key is removed is up to the agent.
/// A FAILURE reply from the agent is an `AgentProtocol` error.
#[async_trait]
pub trait IdentityAgent: Send {
    async fn list(&mut self) -> Result<Vec<AgentIdentity>, KeychainError>;

    async fn add(&mut self, key: &PrivateKey, comment: &str) -> Result<(), KeychainError>;

    async fn remove(&mut self, key: &PublicKey) -> Result<(), KeychainError>;
}

pub struct AgentManager {
    client: Box<dyn Session + Send + Sync>,
    endpoint: PathBuf,
}

impl AgentManager {
    /// Connects to `endpoint`, or to `$SSH_AUTH_SOCK` when none is given.
    pub async fn connect(endpoint: Option<&Path>) -> Result<Self, KeychainError> {
        let endpoint = match endpoint {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(SSH_AUTH_SOCK)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| KeychainError::AgentConnect(format!("{SSH_AUTH_SOCK} is not set")))?,
        };

        #[cfg(unix)]
        let client: Box<dyn Session + Send + Sync> = {
            let stream = tokio::net::UnixStream::connect(&endpoint)
                .await
                .map_err(|e| KeychainError::AgentConnect(format!("{}: {e}", endpoint.display())))?;
            Box::new(Client::new(stream))
        };

        #[cfg(windows)]
        let client: Box<dyn Session + Send + Sync> = {
            use tokio::net::windows::named_pipe::ClientOptions;
            let stream = ClientOptions::new()
                .open(&endpoint)
                .map_err(|e| KeychainError::AgentConnect(format!("{}: {e}", endpoint.display())))?;
            Box::new(Client::new(stream))
        };

        debug!(endpoint = %endpoint.display(), "connected to ssh-agent");
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }
}

fn protocol_error(err: impl std::fmt::Display) -> KeychainError {
    KeychainError::AgentProtocol(err.to_string())
}

#[async_trait]
impl IdentityAgent for AgentManager {
    async fn list(&mut self) -> Result<Vec<AgentIdentity>, KeychainError> {
        let identities = self
            .client
            .request_identities()
            .await
            .map_err(protocol_error)?;
        let mut out = Vec::with_capacity(identities.len());
        for identity in identities {
            let mut blob = Vec::new();
            match identity.pubkey.encode(&mut blob).map(|()| blob) {
                Ok(blob) => out.push(AgentIdentity::new(blob, identity.comment)),
                Err(err) => warn!(error = %err, "agent reported a key that cannot be encoded"),
            }
        }
        debug!(count = out.len(), "listed agent identities");
        Ok(out)
    }

    async fn add(&mut self, key: &PrivateKey, comment: &str) -> Result<(), KeychainError> {
        // The agent needs the decrypted key and we never ask for a passphrase.
        if key.is_encrypted() {
            return Err(KeychainError::AgentProtocol(
                "passphrase required to load an encrypted key".to_string(),
            ));
        }
        let request = AddIdentity {
            credential: PrivateCredential::Key {
                privkey: key.key_data().clone(),
                comment: comment.to_string(),
            },
        };
        self.client
            .add_identity(request)
            .await
            .map_err(protocol_error)
    }

    async fn remove(&mut self, key: &PublicKey) -> Result<(), KeychainError> {
        let request = RemoveIdentity {
            pubkey: key.key_data().clone().into(),
        };
        self.client
            .remove_identity(request)
            .await
            .map_err(protocol_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("agent.sock");
        let err = match AgentManager::connect(Some(&socket)).await {
            Ok(_) => panic!("connected to a socket that does not exist"),
            Err(err) => err,
        };
        assert!(matches!(err, KeychainError::AgentConnect(_)));
        assert!(err.to_string().contains("agent.sock"));
    }

    #[cfg(unix)]
    mod openssh {
        use super::*;
        use crate::fixtures;
        use std::process::Stdio;
        use std::time::Duration;
        use tokio::process::{Child, Command};

        /// An `ssh-agent -D` bound to a socket inside a temp dir.
        struct SshAgent {
            _child: Child,
            _dir: TempDir,
            socket: PathBuf,
        }

        impl SshAgent {
            fn start() -> Option<Self> {
                let dir = TempDir::new().unwrap();
                let socket = dir.path().join("agent.sock");
                let child = match Command::new("ssh-agent")
                    .arg("-D")
                    .arg("-a")
                    .arg(&socket)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                {
                    Ok(child) => child,
                    Err(err) => {
                        eprintln!("SKIPPED: ssh-agent is not available ({err})");
                        return None;
                    }
                };
                Some(Self {
                    _child: child,
                    _dir: dir,
                    socket,
                })
            }

            async fn connect(&self) -> AgentManager {
                for _ in 0..100 {
                    if let Ok(agent) = AgentManager::connect(Some(&self.socket)).await {
                        return agent;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                panic!("ssh-agent never listened on {}", self.socket.display());
            }
        }

        #[tokio::test]
        async fn add_list_remove_round_trip() {
            let Some(ssh_agent) = SshAgent::start() else {
                return;
            };
            let mut agent = ssh_agent.connect().await;
            let key = PrivateKey::from_openssh(fixtures::ED25519).unwrap();
            let public_key = key.public_key().clone();
            let blob = public_key.to_bytes().unwrap();

            assert!(agent.list().await.unwrap().is_empty());

            agent.add(&key, "alice@workstation").await.unwrap();
            let identities = agent.list().await.unwrap();
            assert_eq!(
                identities,
                vec![AgentIdentity::new(blob.clone(), "alice@workstation")]
            );

            agent.remove(&public_key).await.unwrap();
            let identities = agent.list().await.unwrap();
            assert!(identities.iter().all(|identity| identity.blob != blob));
        }

        #[tokio::test]
        async fn failure_reply_is_a_protocol_error() {
            let Some(ssh_agent) = SshAgent::start() else {
                return;
            };
            let mut agent = ssh_agent.connect().await;
            let key = PrivateKey::from_openssh(fixtures::ECDSA).unwrap();

            let err = agent.remove(key.public_key()).await.unwrap_err();
            assert!(matches!(err, KeychainError::AgentProtocol(_)), "{err}");
            assert!(agent.list().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn encrypted_key_is_refused_before_sending() {
            let Some(ssh_agent) = SshAgent::start() else {
                return;
            };
            let mut agent = ssh_agent.connect().await;
            let key = PrivateKey::from_openssh(fixtures::ED25519_WITH_PASSPHRASE).unwrap();

            let err = agent.add(&key, "locked").await.unwrap_err();
            assert!(matches!(err, KeychainError::AgentProtocol(_)));
            assert!(err.to_string().contains("passphrase required"));
            assert!(agent.list().await.unwrap().is_empty());
        }
    }
}
