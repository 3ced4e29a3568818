// Authentication module
// Credential storage, token refresh, and session lifecycle

pub mod gate;
pub mod refresh;
pub mod session;
pub mod store;
pub mod types;

pub use gate::RefreshGate;
pub use session::{authorize, Access, Session};
pub use store::{CredentialStore, MemoryStore, SqliteStore};
pub use types::{CredentialPolicy, Credentials, StorageOptions, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
