//! Keeps the on-disk key list and the cached agent identities in step.
//!
//! The identity cache is filled once from the agent and afterwards only
//! changes through [`Reconciler::record`]. It is never re-listed, so it can
//! drift if another process talks to the same agent.

use crate::error::CoreError;
use ssh_key::{PrivateKey, PublicKey};
use sshkeys_keychain::{AgentIdentity, IdentityAgent, Key, KeychainError};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Agent call needed to flip the selected key, detached from the state so
/// it can run on another task.
#[derive(Clone, Debug)]
pub enum ToggleAction {
    Load {
        index: usize,
        private_key: PrivateKey,
        comment: String,
        blob: Vec<u8>,
    },
    Unload {
        index: usize,
        public_key: PublicKey,
        blob: Vec<u8>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    Loaded { index: usize, identity: AgentIdentity },
    Unloaded { index: usize, blob: Vec<u8> },
}

impl ToggleOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Loaded { index, .. } | Self::Unloaded { index, .. } => *index,
        }
    }
}

impl ToggleAction {
    pub fn index(&self) -> usize {
        match self {
            Self::Load { index, .. } | Self::Unload { index, .. } => *index,
        }
    }

    pub async fn execute<A>(self, agent: &mut A) -> Result<ToggleOutcome, KeychainError>
    where
        A: IdentityAgent + ?Sized,
    {
        match self {
            Self::Load {
                index,
                private_key,
                comment,
                blob,
            } => {
                agent.add(&private_key, &comment).await?;
                Ok(ToggleOutcome::Loaded {
                    index,
                    identity: AgentIdentity::new(blob, comment),
                })
            }
            Self::Unload {
                index,
                public_key,
                blob,
            } => {
                agent.remove(&public_key).await?;
                Ok(ToggleOutcome::Unloaded { index, blob })
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    keys: Vec<Key>,
    identities: Vec<AgentIdentity>,
    selected: usize,
}

impl Reconciler {
    pub fn new(keys: Vec<Key>, identities: Vec<AgentIdentity>) -> Self {
        let mut reconciler = Self {
            keys,
            identities,
            selected: 0,
        };
        reconciler.refresh_loaded();
        reconciler
    }

    pub fn set_keys(&mut self, keys: Vec<Key>) {
        self.keys = keys;
        if self.selected >= self.keys.len() {
            self.selected = 0;
        }
        self.refresh_loaded();
    }

    pub fn set_identities(&mut self, identities: Vec<AgentIdentity>) {
        self.identities = identities;
        self.refresh_loaded();
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn identities(&self) -> &[AgentIdentity] {
        &self.identities
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_key(&self) -> Option<&Key> {
        self.keys.get(self.selected)
    }

    pub fn move_cursor(&mut self, direction: Direction) {
        let len = self.keys.len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = match direction {
            Direction::Up => (self.selected + len - 1) % len,
            Direction::Down => (self.selected + 1) % len,
        };
    }

    pub fn is_loaded(&self, key: &Key) -> bool {
        self.identities.iter().any(|identity| identity.matches(key))
    }

    /// Recomputes the `loaded` flag of every key from the identity cache.
    pub fn refresh_loaded(&mut self) {
        let identities = &self.identities;
        for key in &mut self.keys {
            key.loaded = identities.iter().any(|identity| identity.matches(key));
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.keys.iter().filter(|key| self.is_loaded(key)).count()
    }

    pub fn plan_toggle(&self) -> Option<ToggleAction> {
        let index = self.selected;
        let key = self.keys.get(index)?;
        let action = if self.is_loaded(key) {
            ToggleAction::Unload {
                index,
                public_key: key.public_key.clone(),
                blob: key.blob.clone(),
            }
        } else {
            ToggleAction::Load {
                index,
                private_key: key.private_key.clone(),
                comment: key.comment.clone(),
                blob: key.blob.clone(),
            }
        };
        Some(action)
    }

    /// Applies a finished agent call to the local cache.
    pub fn record(&mut self, outcome: ToggleOutcome) {
        match outcome {
            ToggleOutcome::Loaded { index, identity } => {
                info!(index, "key loaded into agent");
                self.identities.push(identity);
            }
            ToggleOutcome::Unloaded { index, blob } => {
                info!(index, "key removed from agent");
                let position = self
                    .identities
                    .iter()
                    .position(|identity| identity.blob == blob);
                match position {
                    Some(position) => {
                        self.identities.remove(position);
                    }
                    None => debug!(index, "removed key was not in the identity cache"),
                }
            }
        }
        self.refresh_loaded();
    }

    /// Loads or unloads the selected key and updates the cache on success.
    pub async fn toggle<A>(&mut self, agent: &mut A) -> Result<ToggleOutcome, CoreError>
    where
        A: IdentityAgent + ?Sized,
    {
        let action = self.plan_toggle().ok_or(CoreError::NoSelection)?;
        let outcome = action.execute(agent).await?;
        self.record(outcome.clone());
        Ok(outcome)
    }
}
