//! Recovery subsystem – maps a failed remote call onto what the session
//! does next.
//!
//! | Failure                 | Side effect                     | Outcome                |
//! |-------------------------|---------------------------------|------------------------|
//! | `ChallengeRequired{url}`| –                               | `ChallengePending`     |
//! | `Transport(kind)`       | proxy feedback `mark_bad(kind)` | terminate (proxy)      |
//! | `Unclassified`          | logged                          | terminate              |
//!
//! A resolved challenge is submitted with `verify_challenge`; the session is
//! never resumed afterwards and expects an external restart.

use crate::api;
use crate::client::{ChallengeSolver, GameCall, GameClient, GameResponse, ProxyFeedback};
use crate::error::{RemoteError, TransportKind};
use crate::state::SessionState;
use log::{error, info, warn};

/// Why the session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// A challenge token was accepted; a fresh run is required.
    ChallengeSubmitted,
    /// The solver gave up or the service rejected the token.
    ChallengeFailed,
    /// Proxy marked bad after a classified transport failure.
    ProxyFailure(TransportKind),
    Unclassified(String),
    /// Interrupted from outside.
    Shutdown,
}

impl ExitReason {
    /// Process exit status for this reason.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::Shutdown => 0,
            ExitReason::ChallengeSubmitted => 2,
            ExitReason::ChallengeFailed => 3,
            ExitReason::ProxyFailure(_) => 4,
            ExitReason::Unclassified(_) => 1,
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::ChallengeSubmitted => f.write_str("challenge submitted, restart required"),
            ExitReason::ChallengeFailed => f.write_str("challenge could not be resolved"),
            ExitReason::ProxyFailure(kind) => write!(f, "bad proxy ({})", kind),
            ExitReason::Unclassified(msg) => write!(f, "unclassified failure: {}", msg),
            ExitReason::Shutdown => f.write_str("shutdown requested"),
        }
    }
}

/// What the controller should do after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    ResolveChallenge { url: String },
    Terminate(ExitReason),
}

/// Classify `err`, reporting bad proxies to `proxy` on the way.
pub async fn classify(err: RemoteError, proxy: &dyn ProxyFeedback) -> Recovery {
    match err {
        RemoteError::ChallengeRequired { url } => {
            warn!("Challenge required: {}", url);
            Recovery::ResolveChallenge { url }
        }
        RemoteError::Transport(failure) => {
            error!("Bad proxy ({}): {}", failure.kind, failure.message);
            proxy.mark_bad(failure.kind).await;
            Recovery::Terminate(ExitReason::ProxyFailure(failure.kind))
        }
        RemoteError::Unclassified(message) => {
            error!("Unhandled failure: {}", message);
            Recovery::Terminate(ExitReason::Unclassified(message))
        }
    }
}

/// Ask the solver for a token and submit it.  Always ends the run.
pub async fn resolve_challenge(
    state: &mut SessionState,
    url: &str,
    client: &dyn GameClient,
    solver: &dyn ChallengeSolver,
    proxy: &dyn ProxyFeedback,
) -> ExitReason {
    info!("Waiting for challenge resolution");
    let Some(token) = solver.resolve(url).await else {
        error!("Challenge was not solved");
        return ExitReason::ChallengeFailed;
    };

    let mut batch = client.start_batch();
    batch.add(GameCall::VerifyChallenge { token });
    api::always(&mut batch);

    let parsed = match client.submit(batch).await {
        Ok(responses) => api::parse(state, responses),
        Err(e) => Err(e),
    };

    match parsed.map(|p| p.primary()) {
        Ok(Some(GameResponse::VerifyChallenge { success: true })) => {
            warn!("Challenge response sent, please restart.");
            ExitReason::ChallengeSubmitted
        }
        Ok(other) => {
            error!("Challenge verification rejected: {:?}", other);
            ExitReason::ChallengeFailed
        }
        Err(RemoteError::ChallengeRequired { .. }) => {
            error!("Challenge still pending after verification");
            ExitReason::ChallengeFailed
        }
        Err(e) => match classify(e, proxy).await {
            Recovery::Terminate(reason) => reason,
            Recovery::ResolveChallenge { .. } => ExitReason::ChallengeFailed,
        },
    }
}
