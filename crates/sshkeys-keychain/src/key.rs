use ssh_key::{PrivateKey, PublicKey};
use std::fmt;
use std::path::PathBuf;

/// A private key found on disk.
#[derive(Clone, Debug)]
pub struct Key {
    /// Path relative to the scan root.
    pub name: String,
    pub path: PathBuf,
    /// Algorithm of the public half, e.g. `ssh-ed25519`.
    pub format: String,
    /// Comment from the sibling `.pub` file, empty when there is none.
    pub comment: String,
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
    /// Wire encoding of `public_key`, the identity used for comparisons.
    pub blob: Vec<u8>,
    /// Presentation cache, recomputed before every render.
    pub loaded: bool,
}

impl Key {
    /// Returns `None` when the public half cannot be encoded.
    pub fn new(
        name: String,
        path: PathBuf,
        private_key: PrivateKey,
        comment: String,
    ) -> Option<Self> {
        let public_key = private_key.public_key().clone();
        let blob = public_key.to_bytes().ok()?;
        Some(Self {
            name,
            path,
            format: public_key.algorithm().as_str().to_string(),
            comment,
            private_key,
            public_key,
            blob,
            loaded: false,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.private_key.is_encrypted()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.comment)
    }
}

/// An identity as reported by the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentIdentity {
    pub blob: Vec<u8>,
    pub comment: String,
}

impl AgentIdentity {
    pub fn new(blob: Vec<u8>, comment: impl Into<String>) -> Self {
        Self {
            blob,
            comment: comment.into(),
        }
    }

    pub fn matches(&self, key: &Key) -> bool {
        self.blob == key.blob
    }
}
