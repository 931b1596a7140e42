pub mod agent;
pub mod classify;
pub mod error;
pub mod key;
pub mod scan;

pub use agent::{AgentManager, IdentityAgent, SSH_AUTH_SOCK};
pub use classify::{classify, Classification};
pub use error::KeychainError;
pub use key::{AgentIdentity, Key};
pub use scan::scan;
