use sshkeys_keychain::KeychainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Keychain(#[from] KeychainError),
    #[error("no key selected")]
    NoSelection,
}
