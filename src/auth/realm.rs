//! The realm: adapts a resolved identity into a capability-scoped
//! communication channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AuthError, AuthResult, CommandError, CommandResult};
use crate::store::{SharedRootStore, SharedUserStore};

use super::identity::Identity;

/// Channel capabilities an avatar can be scoped to. Only the RPC channel is
/// defined; requesting anything else fails with
/// [`CommandError::UnsupportedCapability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RpcChannel,
}

/// An RPC-capable endpoint bound to one authenticated identity.
pub trait ChannelEndpoint: Send + Sync {
    fn identity(&self) -> &Identity;
}

/// Resolves an opaque identity to its private-store handle. Injected into
/// the realm so identity lookup stays a replaceable collaborator.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, identity: &Identity) -> AuthResult<SharedUserStore>;
}

/// Resolver backed by the root store's identifier map.
pub struct StoreIdentityResolver {
    root: SharedRootStore,
}

impl StoreIdentityResolver {
    pub fn new(root: SharedRootStore) -> Arc<Self> {
        Arc::new(StoreIdentityResolver { root })
    }
}

#[async_trait]
impl IdentityResolver for StoreIdentityResolver {
    async fn resolve(&self, identity: &Identity) -> AuthResult<SharedUserStore> {
        self.root
            .read()
            .user_store(identity)
            .ok_or_else(|| AuthError::unauthorized("unknown user"))
    }
}

/// Default channel implementation: the identity plus its store handle.
pub struct UserChannel {
    identity: Identity,
    store: SharedUserStore,
}

impl UserChannel {
    pub fn new(identity: Identity, store: SharedUserStore) -> Self {
        UserChannel { identity, store }
    }

    pub fn store(&self) -> &SharedUserStore {
        &self.store
    }
}

impl ChannelEndpoint for UserChannel {
    fn identity(&self) -> &Identity {
        &self.identity
    }
}

pub type LogoutCallback = Box<dyn FnOnce() + Send>;

/// The result of a successful avatar request: the granted capability, the
/// channel implementation and a logout callback.
pub struct Avatar {
    pub capability: Capability,
    pub endpoint: Box<dyn ChannelEndpoint>,
    pub logout: LogoutCallback,
}

/// Adapts validated identities into channel endpoints.
pub struct Realm {
    resolver: Arc<dyn IdentityResolver>,
}

impl Realm {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Realm { resolver }
    }

    /// Resolves the identity and adapts it to the RPC channel capability.
    /// The logout callback revokes the identity's outstanding tokens:
    /// single-use proof material must not outlive the avatar.
    pub async fn request_avatar(
        &self,
        identity: &Identity,
        capabilities: &[Capability],
    ) -> CommandResult<Avatar> {
        if !capabilities.contains(&Capability::RpcChannel) {
            return Err(CommandError::UnsupportedCapability);
        }
        let store = self.resolver.resolve(identity).await?;
        debug!(target: "portcullis::auth", "avatar granted for {}", identity);

        let logout_store = store.clone();
        let logout: LogoutCallback = Box::new(move || {
            let revoked = logout_store.write().clear_tokens();
            debug!(target: "portcullis::auth", "logout revoked {} tokens", revoked);
        });

        Ok(Avatar {
            capability: Capability::RpcChannel,
            endpoint: Box::new(UserChannel::new(identity.clone(), store)),
            logout,
        })
    }
}
