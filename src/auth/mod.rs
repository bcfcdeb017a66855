//! Authentication core: checkers, tokens, sessions and the realm/portal
//! bridge. Keep the public surface thin and split implementation across
//! sub-modules.

pub mod checker;
pub mod counter;
pub mod identity;
pub mod password;
pub mod portal;
pub mod realm;
pub mod session;
pub mod token;

pub use checker::{CredentialKind, Credentials, CredentialsChecker};
pub use counter::TokenCounter;
pub use identity::{create_identifier, create_identifier_from, Identity};
pub use password::PasswordChecker;
pub use portal::Portal;
pub use realm::{Avatar, Capability, ChannelEndpoint, IdentityResolver, Realm, StoreIdentityResolver};
pub use session::SessionManager;
pub use token::{Token, TokenSet, TOKEN_SOURCE_PASSWORD};
