//! Document manager seam.
//!
//! This module contains:
//! - `DocumentHandler` trait: what the adapter offers, one method per request kind
//! - `DocumentManager` trait: the message dispatch layer the handler is registered with
//! - `RequestScope`: deadline and cancellation carried by every request
//! - Implementations: in-process channel manager

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{AdapterError, Result};
use crate::protocol::{
    ChangeFeedRequest, ChangeFeedResult, DocumentFetchRequest, DocumentFetchResult,
};

pub mod channel;

pub use channel::{ChannelDocumentManager, ManagerClient};

// ============================================================================
// Traits
// ============================================================================

/// Callback receiving every request-scoped failure.
pub type ErrorHandler = Arc<dyn Fn(&AdapterError) + Send + Sync>;

/// Handler for inbound document manager requests.
///
/// Implementations must tolerate concurrent calls of both methods.
#[async_trait]
pub trait DocumentHandler: Send + Sync {
    /// Answer a change-feed request.
    async fn handle_change_feed(
        &self,
        scope: &RequestScope,
        request: ChangeFeedRequest,
    ) -> Result<ChangeFeedResult>;

    /// Answer a document fetch request.
    async fn handle_document_fetch(
        &self,
        scope: &RequestScope,
        request: DocumentFetchRequest,
    ) -> Result<DocumentFetchResult>;
}

/// Message dispatch layer delivering requests to a registered handler.
#[async_trait]
pub trait DocumentManager: Send + Sync {
    /// Start delivering requests to `handler`.
    async fn register(&self, handler: Arc<dyn DocumentHandler>) -> Result<()>;

    /// Stop delivering requests and release the handler.
    async fn close(&self);
}

// ============================================================================
// Request scope
// ============================================================================

/// Deadline and cancellation for one request.
///
/// Passed explicitly to every database call made on behalf of the request.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels the scope it was created with, on request or when dropped.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl RequestScope {
    /// A scope that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable scope and the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                deadline: None,
                cancel: Some(receiver),
            },
            CancelHandle { sender },
        )
    }

    /// This scope with a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// This scope with a deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drive `work` until it completes, the scope is cancelled or the
    /// deadline passes. On cancellation or timeout `work` is dropped.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            match cancel.as_mut() {
                // A dropped sender means nobody can cancel any more.
                Some(rx) => {
                    let orphaned = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if orphaned {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(AdapterError::Cancelled),
            _ = expired => Err(AdapterError::DeadlineExceeded),
            result = work => result,
        }
    }
}
