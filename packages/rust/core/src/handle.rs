//! Owner task in front of the [`Engine`].
//!
//! Every request goes through one bounded queue and is served in arrival
//! order by a single task, so triggers never overlap and reads always see a
//! finished cycle.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use ndc_fetch::Upstream;
use ndc_shared::{
    CandidateRecord, Credentials, CycleConfig, FungibleMetadata, NdcError, NonFungibleMetadata,
    Result,
};
use ndc_storage::Storage;

use crate::engine::{CycleReport, Engine};

const QUEUE_DEPTH: usize = 32;

enum Request {
    Trigger {
        creds: Credentials,
        reply: oneshot::Sender<Result<CycleReport>>,
    },
    Candidates {
        reply: oneshot::Sender<Result<Vec<CandidateRecord>>>,
    },
    FtMetas {
        reply: oneshot::Sender<Result<Vec<FungibleMetadata>>>,
    },
    NftMetas {
        reply: oneshot::Sender<Result<Vec<NonFungibleMetadata>>>,
    },
}

impl Request {
    fn fail(self, err: NdcError) {
        // a caller that went away is not an error
        match self {
            Self::Trigger { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Self::Candidates { reply } => {
                let _ = reply.send(Err(err));
            }
            Self::FtMetas { reply } => {
                let _ = reply.send(Err(err));
            }
            Self::NftMetas { reply } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Cloneable front door to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Request>,
}

impl EngineHandle {
    /// Spawn the owner task. It loads persisted state before taking the first
    /// request off the queue; requests sent meanwhile wait.
    pub fn spawn(storage: Storage, upstream: Upstream, config: CycleConfig) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(storage, upstream, config, rx));
        Self { tx }
    }

    /// Run one invocation with the caller's provider keys.
    pub async fn trigger(&self, creds: Credentials) -> Result<CycleReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Trigger { creds, reply }).await?;
        rx.await.map_err(|_| NdcError::EngineClosed)?
    }

    pub async fn candidates(&self) -> Result<Vec<CandidateRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Candidates { reply }).await?;
        rx.await.map_err(|_| NdcError::EngineClosed)?
    }

    pub async fn ft_metas(&self) -> Result<Vec<FungibleMetadata>> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::FtMetas { reply }).await?;
        rx.await.map_err(|_| NdcError::EngineClosed)?
    }

    pub async fn nft_metas(&self) -> Result<Vec<NonFungibleMetadata>> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::NftMetas { reply }).await?;
        rx.await.map_err(|_| NdcError::EngineClosed)?
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| NdcError::EngineClosed)
    }
}

async fn run(
    storage: Storage,
    upstream: Upstream,
    config: CycleConfig,
    mut rx: mpsc::Receiver<Request>,
) {
    let mut engine = match Engine::load(storage, upstream, config).await {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "engine failed to load persisted state");
            let message = e.to_string();
            while let Some(request) = rx.recv().await {
                request.fail(NdcError::Storage(format!(
                    "engine failed to load: {message}"
                )));
            }
            return;
        }
    };

    while let Some(request) = rx.recv().await {
        match request {
            Request::Trigger { creds, reply } => {
                let _ = reply.send(engine.trigger(&creds).await);
            }
            Request::Candidates { reply } => {
                let _ = reply.send(engine.candidates());
            }
            Request::FtMetas { reply } => {
                let _ = reply.send(Ok(engine.ft_metas()));
            }
            Request::NftMetas { reply } => {
                let _ = reply.send(Ok(engine.nft_metas()));
            }
        }
    }
    debug!("all engine handles dropped, owner task exiting");
}
