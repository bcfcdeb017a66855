//! RPC command contracts and the service object that implements them
//! against the authentication core. Wire framing and dispatch live in the
//! transport; this module owns the argument/response shapes and the
//! boundary error translation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::checker::{Credentials, CredentialsChecker};
use crate::auth::counter::TokenCounter;
use crate::auth::password::PasswordChecker;
use crate::auth::portal::Portal;
use crate::auth::realm::{Avatar, Capability, Realm, StoreIdentityResolver};
use crate::auth::session::SessionManager;
use crate::auth::token::{self, TokenSet, TOKEN_SOURCE_PASSWORD};
use crate::auth::Identity;
use crate::config::AuthConfig;
use crate::directory::{LocalLockDirectory, LockDirectory};
use crate::error::{CommandError, CommandResult};
use crate::scheduler::Scheduler;
use crate::store::SharedRootStore;

// ---- command argument / response shapes ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub user_identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogIn {
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateWithPassword {
    pub user_identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateWithPasswordResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPassword {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPasswordResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUsernamePassword {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUsernamePasswordResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUsernamePassword {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUsernamePasswordResponse {
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSession {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSessionResponse {
    pub session_identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginWithSession {
    pub user_identifier: String,
    pub session_identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginWithSessionResponse {
    pub session_identifier: String,
}

/// Serialized error response for a failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<CommandError> for ErrorResponse {
    fn from(err: CommandError) -> Self {
        ErrorResponse { error: err.wire_code().to_string() }
    }
}

// ---- the service object ----

/// Implements every command against one service root. Built once: the
/// portal's checker table, the realm and the session manager are assembled
/// here and never swapped afterwards.
pub struct CommandSet {
    root: SharedRootStore,
    portal: Portal,
    password: Arc<PasswordChecker>,
    sessions: SessionManager,
    scheduler: Arc<dyn Scheduler>,
    config: AuthConfig,
}

impl CommandSet {
    /// Assembles the full stack over a root store: local lock directory,
    /// password checker, token counter, realm and portal.
    pub fn assemble(root: SharedRootStore, scheduler: Arc<dyn Scheduler>, config: AuthConfig) -> Self {
        let directory: Arc<dyn LockDirectory> = LocalLockDirectory::new(root.clone());
        let password = Arc::new(PasswordChecker::new(root.clone(), directory));
        let counter = Arc::new(TokenCounter::with_required_tokens(
            root.clone(),
            config.required_tokens,
        ));
        let realm = Realm::new(StoreIdentityResolver::new(root.clone()));
        let checkers: Vec<Arc<dyn CredentialsChecker>> = vec![password.clone(), counter];
        let portal = Portal::new(realm, checkers);
        let sessions = SessionManager::new(root.clone());
        CommandSet { root, portal, password, sessions, scheduler, config }
    }

    pub fn portal(&self) -> &Portal {
        &self.portal
    }

    /// CreateUser: mints a fresh identity with an empty private store.
    pub async fn create_user(&self, _req: CreateUser) -> CommandResult<CreateUserResponse> {
        let (identity, _) = self.root.write().create_user()?;
        Ok(CreateUserResponse { user_identifier: identity.as_str().to_string() })
    }

    /// LogIn: full login using previously acquired tokens. The avatar is
    /// returned alongside the (empty) wire response so the transport can
    /// bind it to the connection.
    pub async fn log_in(&self, req: LogIn) -> CommandResult<(LogInResponse, Avatar)> {
        let tokens = TokenSet::new(req.tokens)?;
        let credentials = Credentials::Tokens(tokens);
        let avatar = self.portal.login(&credentials, &[Capability::RpcChannel]).await?;
        Ok((LogInResponse {}, avatar))
    }

    /// AuthenticateWithPassword: partial authentication. A valid password
    /// mints a short-lived token the caller can later spend on LogIn.
    pub async fn authenticate_with_password(
        &self,
        req: AuthenticateWithPassword,
    ) -> CommandResult<AuthenticateWithPasswordResponse> {
        let credentials = Credentials::UsernamePassword {
            username: req.user_identifier,
            password: req.password,
        };
        let identity = self.portal.resolve(&credentials).await?;
        let store = self
            .root
            .read()
            .user_store(&identity)
            .ok_or(CommandError::BadCredentials)?;
        let token = token::issue(&store, TOKEN_SOURCE_PASSWORD, &self.config, &self.scheduler)?;
        Ok(AuthenticateWithPasswordResponse { token: token.identifier })
    }

    /// SetPassword: for the already-authenticated caller bound to
    /// `identity`.
    pub async fn set_password(&self, identity: &Identity, req: SetPassword) -> CommandResult<SetPasswordResponse> {
        self.password.set_password(identity, &req.password).await?;
        Ok(SetPasswordResponse {})
    }

    /// RegisterUsernamePassword: registration with a unique username.
    pub async fn register_username_password(
        &self,
        req: RegisterUsernamePassword,
    ) -> CommandResult<RegisterUsernamePasswordResponse> {
        self.password.register(&req.username, &req.password).await?;
        Ok(RegisterUsernamePasswordResponse {})
    }

    /// LoginUsernamePassword: resolves the credentials and answers with the
    /// opaque identifier.
    pub async fn login_username_password(
        &self,
        req: LoginUsernamePassword,
    ) -> CommandResult<LoginUsernamePasswordResponse> {
        let credentials = Credentials::UsernamePassword {
            username: req.username,
            password: req.password,
        };
        let identity = self.portal.resolve(&credentials).await?;
        Ok(LoginUsernamePasswordResponse { uid: identity.as_str().to_string() })
    }

    /// RequestSession: for the already-authenticated caller bound to
    /// `identity`.
    pub async fn request_session(&self, identity: &Identity, _req: RequestSession) -> CommandResult<RequestSessionResponse> {
        let session_identifier = self.sessions.request_session(identity)?;
        Ok(RequestSessionResponse { session_identifier })
    }

    /// LoginWithSession: single-use session login with atomic rotation.
    pub async fn login_with_session(&self, req: LoginWithSession) -> CommandResult<LoginWithSessionResponse> {
        let identity = Identity::new(req.user_identifier);
        let session_identifier = self.sessions.login(&identity, &req.session_identifier)?;
        Ok(LoginWithSessionResponse { session_identifier })
    }
}
