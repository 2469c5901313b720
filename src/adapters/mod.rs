pub mod anylist;
pub mod credentials;
pub mod drive;
pub mod google_oauth;
pub mod memory;

pub use anylist::{AnyListClient, BridgeCommand, NodeBridge};
pub use credentials::CredentialVault;
pub use drive::GoogleDriveStore;
pub use google_oauth::{GoogleOAuth, OAuthGrant, OAuthToken};
pub use memory::MemoryStore;
