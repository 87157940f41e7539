// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker offload — runs a fix session on tokio's blocking pool so parsing,
// rendering and serialization never stall an async caller.
//
// Operations on one worker run one at a time. Independent documents get
// independent workers. A blocking job cannot be aborted, so dropping the
// future of a job (a timeout, a `select!` branch losing) raises the job's
// cancel flag instead; the job stops at its next page and frees the
// session for the next operation.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pagefix_core::error::{PagefixError, Result};
use pagefix_core::{JobId, PageIssue, PageModification, PageSummary, PreparedPdf};
use tracing::{Instrument, debug, info_span, warn};

use crate::context::CancelFlag;
use crate::session::FixSession;

/// Handle to a [`FixSession`] living on the blocking pool.
#[derive(Clone)]
pub struct FixWorker {
    session: Arc<Mutex<FixSession>>,
}

impl FixWorker {
    pub fn new(session: FixSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FixSession) -> Result<T> + Send + 'static,
    {
        let job = JobId::new();
        let session = Arc::clone(&self.session);
        let cancel = CancelFlag::new();
        let span = info_span!("fix_job", %job, op);
        async move {
            debug!("job queued");
            let _guard = CancelOnDrop(cancel.clone());
            let handle = tokio::task::spawn_blocking(move || {
                let mut session = session
                    .lock()
                    .map_err(|_| PagefixError::PdfError("fix session lock poisoned".into()))?;
                if cancel.is_cancelled() {
                    return Err(PagefixError::Cancelled);
                }
                session.set_cancel_flag(cancel);
                f(&mut session)
            });
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(PagefixError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "fix job panicked");
                    Err(PagefixError::PdfError(format!("fix job failed: {e}")))
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn prepare(&self, raw: Vec<u8>) -> Result<PreparedPdf> {
        self.run("prepare", move |session| session.prepare(&raw)).await
    }

    pub async fn detect_issues(&self, bytes: Vec<u8>) -> Result<Vec<PageIssue>> {
        self.run("detect_issues", move |session| Ok(session.detect_issues(&bytes)))
            .await
    }

    pub async fn apply_modifications(&self, bytes: Vec<u8>, modifications: Vec<PageModification>) -> Result<Vec<u8>> {
        self.run("apply_modifications", move |session| {
            session.apply_modifications(&bytes, &modifications)
        })
        .await
    }

    pub async fn page_summaries(&self, bytes: Vec<u8>) -> Result<Vec<PageSummary>> {
        self.run("page_summaries", move |session| session.page_summaries(&bytes))
            .await
    }
}

/// Raises the job's flag when the awaiting future goes away. Raising it
/// after the job has finished is harmless.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Await `operation` for at most `limit`. Running out of time counts as
/// cancellation. A [`FixWorker`] job that times out is told to stop and
/// releases its session at the next page boundary.
pub async fn with_timeout<T>(limit: Duration, operation: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, operation).await.map_err(|_| {
        warn!(limit_ms = limit.as_millis() as u64, "operation timed out, cancelling");
        PagefixError::Cancelled
    })?
}
