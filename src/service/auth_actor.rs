use crate::db::models::Credential;
use crate::error::RollcallError;
use crate::service::credential_service::{CredentialService, ServiceState};
use crate::types::auth::AuthRequest;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::sync::Arc;
use tracing::{error, info};

/// Public messages handled by the auth actor.
#[derive(Debug)]
pub enum AuthActorMessage {
    /// Verify credentials; replies with the stored username.
    Login(AuthRequest, RpcReplyPort<Result<String, RollcallError>>),
    /// Create a new account.
    Signup(AuthRequest, RpcReplyPort<Result<Credential, RollcallError>>),
    /// Current lifecycle state of the credential service.
    Status(RpcReplyPort<ServiceState>),
}

/// Handle for interacting with the auth actor. Callers await replies instead
/// of touching the store from their own thread.
#[derive(Clone)]
pub struct AuthHandle {
    actor: ActorRef<AuthActorMessage>,
}

impl AuthHandle {
    pub async fn login(&self, request: AuthRequest) -> Result<String, RollcallError> {
        ractor::call!(self.actor, AuthActorMessage::Login, request)
            .map_err(|e| RollcallError::RactorError(format!("Login RPC failed: {e}")))?
    }

    pub async fn signup(&self, request: AuthRequest) -> Result<Credential, RollcallError> {
        ractor::call!(self.actor, AuthActorMessage::Signup, request)
            .map_err(|e| RollcallError::RactorError(format!("Signup RPC failed: {e}")))?
    }

    pub async fn status(&self) -> Result<ServiceState, RollcallError> {
        ractor::call!(self.actor, AuthActorMessage::Status)
            .map_err(|e| RollcallError::RactorError(format!("Status RPC failed: {e}")))
    }

    pub fn stop(&self) {
        self.actor.stop(Some("shutdown".to_string()));
    }
}

/// ractor-based auth actor owning the credential service
struct AuthActor;

#[ractor::async_trait]
impl Actor for AuthActor {
    type Msg = AuthActorMessage;
    type State = Arc<CredentialService>;
    type Arguments = Arc<CredentialService>;

    /// Runs the startup sequence. A failure is logged and leaves the service
    /// not ready; auth requests then answer `NotReady` instead of the process dying.
    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        service: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        match service.start().await {
            Ok(seed) => info!(?seed, "AuthActor started; credential service ready"),
            Err(e) => error!(
                error = %e,
                state = %service.state(),
                "credential bootstrap failed; auth requests will be refused"
            ),
        }
        Ok(service)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        service: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            AuthActorMessage::Login(request, reply) => {
                let result = service.login(&request.username, &request.password).await;
                let _ = reply.send(result);
            }
            AuthActorMessage::Signup(request, reply) => {
                let result = service.signup(&request.username, &request.password).await;
                let _ = reply.send(result);
            }
            AuthActorMessage::Status(reply) => {
                let _ = reply.send(service.state());
            }
        }
        Ok(())
    }
}

/// Spawn the auth actor around `service` and return a handle.
pub async fn spawn(service: Arc<CredentialService>) -> Result<AuthHandle, RollcallError> {
    let (actor, _jh) = Actor::spawn(None, AuthActor, service)
        .await
        .map_err(|e| RollcallError::RactorError(format!("spawn AuthActor failed: {e}")))?;
    Ok(AuthHandle { actor })
}
