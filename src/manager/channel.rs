//! In-memory channel-based document manager.
//!
//! Uses a tokio mpsc channel to deliver requests within a single process.
//! Each request is answered on its own task, so handlers see concurrent
//! calls just as they would behind a networked dispatch layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, info, warn};

use super::{DocumentHandler, DocumentManager, RequestScope};
use crate::error::{AdapterError, Result};
use crate::protocol::{
    ChangeFeedRequest, ChangeFeedResult, DocumentFetchRequest, DocumentFetchResult,
};

/// Channel capacity for pending requests.
const CHANNEL_CAPACITY: usize = 1024;

enum Envelope {
    ChangeFeed {
        scope: RequestScope,
        request: ChangeFeedRequest,
        reply: oneshot::Sender<Result<ChangeFeedResult>>,
    },
    DocumentFetch {
        scope: RequestScope,
        request: DocumentFetchRequest,
        reply: oneshot::Sender<Result<DocumentFetchResult>>,
    },
}

/// In-process document manager.
pub struct ChannelDocumentManager {
    sender: mpsc::Sender<Envelope>,
    receiver: Mutex<Option<mpsc::Receiver<Envelope>>>,
    closed: watch::Sender<bool>,
}

impl Default for ChannelDocumentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDocumentManager {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (closed, _) = watch::channel(false);
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            closed,
        }
    }

    /// A client sending requests through this manager.
    pub fn client(&self) -> ManagerClient {
        ManagerClient {
            sender: self.sender.clone(),
            timeout: None,
        }
    }
}

#[async_trait]
impl DocumentManager for ChannelDocumentManager {
    async fn register(&self, handler: Arc<dyn DocumentHandler>) -> Result<()> {
        if *self.closed.borrow() {
            return Err(AdapterError::Closed);
        }
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| AdapterError::Registration("handler already registered".to_string()))?;
        let mut closed = self.closed.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    envelope = receiver.recv() => match envelope {
                        Some(envelope) => {
                            tokio::spawn(dispatch(Arc::clone(&handler), envelope));
                        }
                        None => break,
                    },
                    changed = closed.changed() => {
                        if changed.is_err() || *closed.borrow() {
                            break;
                        }
                    }
                }
            }
            // Pending requests are answered with `Closed` as their replies drop.
            receiver.close();
            info!("Channel document manager stopped");
        });

        info!("Channel document manager started");
        Ok(())
    }

    async fn close(&self) {
        self.closed.send_replace(true);
    }
}

async fn dispatch(handler: Arc<dyn DocumentHandler>, envelope: Envelope) {
    match envelope {
        Envelope::ChangeFeed {
            scope,
            request,
            reply,
        } => {
            let result = handler.handle_change_feed(&scope, request).await;
            if reply.send(result).is_err() {
                debug!("Change-feed requester went away before reply");
            }
        }
        Envelope::DocumentFetch {
            scope,
            request,
            reply,
        } => {
            let result = handler.handle_document_fetch(&scope, request).await;
            if reply.send(result).is_err() {
                debug!("Document requester went away before reply");
            }
        }
    }
}

/// Sends requests to a [`ChannelDocumentManager`].
///
/// Dropping an in-flight call cancels the request on the handler side.
#[derive(Clone)]
pub struct ManagerClient {
    sender: mpsc::Sender<Envelope>,
    timeout: Option<Duration>,
}

impl ManagerClient {
    /// Apply a deadline to every request sent by this client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn request_changes(&self, request: ChangeFeedRequest) -> Result<ChangeFeedResult> {
        let (scope, _cancel) = self.scope();
        let (reply, response) = oneshot::channel();
        self.send(Envelope::ChangeFeed {
            scope,
            request,
            reply,
        })
        .await?;
        response.await.map_err(|_| AdapterError::Closed)?
    }

    pub async fn request_documents(
        &self,
        request: DocumentFetchRequest,
    ) -> Result<DocumentFetchResult> {
        let (scope, _cancel) = self.scope();
        let (reply, response) = oneshot::channel();
        self.send(Envelope::DocumentFetch {
            scope,
            request,
            reply,
        })
        .await?;
        response.await.map_err(|_| AdapterError::Closed)?
    }

    fn scope(&self) -> (RequestScope, super::CancelHandle) {
        let (scope, cancel) = RequestScope::cancellable();
        match self.timeout {
            Some(timeout) => (scope.with_timeout(timeout), cancel),
            None => (scope, cancel),
        }
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        self.sender.send(envelope).await.map_err(|_| {
            warn!("Document manager is closed, request dropped");
            AdapterError::Closed
        })
    }
}
