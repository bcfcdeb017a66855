//! The portal: one login entry point composed from the registered checkers
//! and a realm.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::{CommandError, CommandResult};

use super::checker::{CredentialKind, Credentials, CredentialsChecker};
use super::identity::Identity;
use super::realm::{Avatar, Capability, Realm};

/// Dispatches presented credentials to the checker accepting their variant,
/// then feeds the resolved identity into the realm. The dispatch table is
/// built once at construction and keyed by [`CredentialKind`].
pub struct Portal {
    checkers: HashMap<CredentialKind, Arc<dyn CredentialsChecker>>,
    realm: Realm,
}

impl Portal {
    pub fn new(realm: Realm, checkers: Vec<Arc<dyn CredentialsChecker>>) -> Self {
        let checkers = checkers
            .into_iter()
            .map(|checker| (checker.accepts(), checker))
            .collect();
        Portal { checkers, realm }
    }

    /// Resolves credentials to an identity without producing an avatar.
    /// Used by commands whose response is the raw identifier.
    pub async fn resolve(&self, credentials: &Credentials) -> CommandResult<Identity> {
        let Some(checker) = self.checkers.get(&credentials.kind()) else {
            warn!(
                target: "portcullis::auth",
                "no checker registered for credential kind {:?}", credentials.kind()
            );
            return Err(CommandError::BadCredentials);
        };
        Ok(checker.resolve_identity(credentials).await?)
    }

    /// Full login: checker dispatch, then avatar adaptation.
    pub async fn login(
        &self,
        credentials: &Credentials,
        capabilities: &[Capability],
    ) -> CommandResult<Avatar> {
        let identity = self.resolve(credentials).await?;
        self.realm.request_avatar(&identity, capabilities).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::counter::TokenCounter;
    use crate::auth::password::PasswordChecker;
    use crate::auth::realm::StoreIdentityResolver;
    use crate::auth::token::{Token, TokenSet};
    use crate::directory::LocalLockDirectory;
    use crate::store::{RootStore, SharedRootStore};

    fn portal_for(root: &SharedRootStore) -> Portal {
        let directory = LocalLockDirectory::new(root.clone());
        let realm = Realm::new(StoreIdentityResolver::new(root.clone()));
        Portal::new(
            realm,
            vec![
                Arc::new(PasswordChecker::new(root.clone(), directory)),
                Arc::new(TokenCounter::new(root.clone())),
            ],
        )
    }

    #[tokio::test]
    async fn dispatches_password_credentials_to_the_password_checker() {
        let root = RootStore::new();
        let portal = portal_for(&root);
        let directory = LocalLockDirectory::new(root.clone());
        let registrar = PasswordChecker::new(root.clone(), directory);
        let identity = registrar.register("alice", "pw").await.unwrap();

        let credentials = Credentials::UsernamePassword {
            username: "alice".into(),
            password: "pw".into(),
        };
        let avatar = portal
            .login(&credentials, &[Capability::RpcChannel])
            .await
            .unwrap();
        assert_eq!(avatar.endpoint.identity(), &identity);
    }

    #[tokio::test]
    async fn dispatches_token_credentials_to_the_counter() {
        let root = RootStore::new();
        let portal = portal_for(&root);
        let (identity, store) = root.write().create_user().unwrap();
        store.write().insert_token(Token::with_identifier("t1", "password"));

        let credentials = Credentials::Tokens(TokenSet::new(["t1"]).unwrap());
        let avatar = portal
            .login(&credentials, &[Capability::RpcChannel])
            .await
            .unwrap();
        assert_eq!(avatar.endpoint.identity(), &identity);
    }

    #[tokio::test]
    async fn missing_checker_kind_is_bad_credentials() {
        let root = RootStore::new();
        let realm = Realm::new(StoreIdentityResolver::new(root.clone()));
        let portal = Portal::new(realm, vec![Arc::new(TokenCounter::new(root.clone()))]);

        let credentials = Credentials::UsernamePassword {
            username: "alice".into(),
            password: "pw".into(),
        };
        let err = portal
            .login(&credentials, &[Capability::RpcChannel])
            .await
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, CommandError::BadCredentials);
    }

    #[tokio::test]
    async fn checker_rejection_surfaces_as_bad_credentials() {
        let root = RootStore::new();
        let portal = portal_for(&root);
        let credentials = Credentials::UsernamePassword {
            username: "nobody".into(),
            password: "pw".into(),
        };
        let err = portal
            .login(&credentials, &[Capability::RpcChannel])
            .await
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, CommandError::BadCredentials);
    }
}
