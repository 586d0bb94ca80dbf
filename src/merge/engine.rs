//! Merge scheduling.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{
    ConcurrencyClass, MergeExecutor, MergeOutput, MergePool, MergeRequest, MergeResolver,
    ResolvedPage,
};
use crate::codec::{LopdfCodec, PdfCodec};
use crate::error::{Result, StitchError};
use crate::session::{MergedOutput, Session};
use crate::store::BlobStore;

/// What a merge would produce, without running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePlan {
    pub class: ConcurrencyClass,
    pub pages: Vec<ResolvedPage>,
    pub skipped: usize,
}

/// Resolves, schedules and executes merges.
///
/// Clones share the same pool.
pub struct MergeEngine<C: PdfCodec = LopdfCodec> {
    inner: Arc<EngineInner<C>>,
}

impl<C: PdfCodec> Clone for MergeEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<C: PdfCodec> {
    resolver: MergeResolver<C>,
    executor: MergeExecutor<C>,
    pool: MergePool,
    inline_page_merges: bool,
}

impl<C: PdfCodec> MergeEngine<C> {
    /// Create an engine.
    ///
    /// With `inline_page_merges` set, page-level requests skip the pool.
    pub fn new(codec: C, pool: MergePool, inline_page_merges: bool) -> Self {
        let codec = Arc::new(codec);
        Self {
            inner: Arc::new(EngineInner {
                resolver: MergeResolver::new(Arc::clone(&codec)),
                executor: MergeExecutor::new(codec),
                pool,
                inline_page_merges,
            }),
        }
    }

    pub fn pool(&self) -> &MergePool {
        &self.inner.pool
    }

    /// Scheduling class `request` will run under.
    pub fn class_of(&self, request: &MergeRequest) -> ConcurrencyClass {
        match request.default_class() {
            ConcurrencyClass::Inline if !self.inner.inline_page_merges => ConcurrencyClass::Bounded,
            class => class,
        }
    }

    /// Submit a merge.
    ///
    /// Bounded jobs are spawned immediately and queue for a pool permit;
    /// dropping the handle does not cancel them. Inline jobs start when the
    /// handle is awaited.
    pub fn submit(&self, session: Arc<Session>, request: MergeRequest) -> MergeHandle {
        let class = self.class_of(&request);
        let inner = Arc::clone(&self.inner);
        let job = run(inner, session, request, class);

        let state = match class {
            ConcurrencyClass::Bounded => HandleState::Spawned(tokio::spawn(job)),
            ConcurrencyClass::Inline => HandleState::Deferred(job.boxed()),
        };
        MergeHandle { class, state }
    }

    /// Submit a merge and wait for it.
    pub async fn merge(&self, session: Arc<Session>, request: MergeRequest) -> Result<MergeOutput> {
        self.submit(session, request).wait().await
    }

    /// Resolve `request` without executing it.
    ///
    /// # Errors
    ///
    /// Same as a real merge up to execution, including the empty-result
    /// gate.
    pub async fn plan(&self, session: &Session, request: &MergeRequest) -> Result<MergePlan> {
        let resolution = self.inner.resolver.resolve(session, request).await?;
        let skipped = resolution.skipped;
        let job = resolution.into_job(session.id().clone())?;
        Ok(MergePlan {
            class: self.class_of(request),
            pages: job.pages,
            skipped,
        })
    }
}

async fn run<C: PdfCodec>(
    inner: Arc<EngineInner<C>>,
    session: Arc<Session>,
    request: MergeRequest,
    class: ConcurrencyClass,
) -> Result<MergeOutput> {
    let queued_at = Instant::now();

    let _permit = match class {
        ConcurrencyClass::Bounded => {
            tracing::info!(
                session_id = %session.id(),
                kind = request.kind(),
                waiting = inner.pool.waiting(),
                running = inner.pool.running(),
                "Queued merge job"
            );
            Some(inner.pool.acquire().await?)
        }
        ConcurrencyClass::Inline => None,
    };

    let started_at = Instant::now();
    tracing::info!(
        session_id = %session.id(),
        class = %class,
        kind = request.kind(),
        items = request.len(),
        queued_ms = started_at.duration_since(queued_at).as_millis() as u64,
        "Starting merge job"
    );

    let epoch = session.epoch();
    let result = match execute(&inner, &session, &request, class).await {
        Ok(output) => publish(&session, epoch, output).await,
        Err(err) => Err(err),
    };

    match &result {
        Ok(output) => {
            tracing::info!(
                session_id = %session.id(),
                class = %class,
                blob_id = %output.blob_id,
                pages = output.page_count,
                size = output.byte_size,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Finished merge job"
            );
        }
        Err(err) if err.is_client_error() => {
            tracing::warn!(session_id = %session.id(), class = %class, error = %err, "Merge rejected");
        }
        Err(err) => {
            tracing::error!(session_id = %session.id(), class = %class, error = %err, "Merge job failed");
        }
    }

    result
}

async fn execute<C: PdfCodec>(
    inner: &EngineInner<C>,
    session: &Session,
    request: &MergeRequest,
    class: ConcurrencyClass,
) -> Result<MergeOutput> {
    let resolution = inner.resolver.resolve(session, request).await?;
    let job = resolution.into_job(session.id().clone())?;
    inner.executor.execute(job, session.store(), class).await
}

/// Record `output` on the session, or delete its blob when the session
/// was cleared after the job started.
async fn publish(session: &Session, epoch: u64, output: MergeOutput) -> Result<MergeOutput> {
    let recorded = session.record_output_since(
        epoch,
        MergedOutput {
            blob_id: output.blob_id.clone(),
            file_name: output.file_name.clone(),
            page_count: output.page_count,
            byte_size: output.byte_size,
        },
    );
    if recorded {
        return Ok(output);
    }

    if let Err(err) = session.store().delete(&output.blob_id).await {
        tracing::error!(
            session_id = %session.id(),
            blob_id = %output.blob_id,
            error = %err,
            "Failed to delete output of cleared session"
        );
    }
    Err(StitchError::job_failed(format!(
        "session {} was cleared while the merge ran",
        session.id()
    )))
}

/// Result handle of a submitted merge.
pub struct MergeHandle {
    class: ConcurrencyClass,
    state: HandleState,
}

enum HandleState {
    Spawned(JoinHandle<Result<MergeOutput>>),
    Deferred(BoxFuture<'static, Result<MergeOutput>>),
}

impl MergeHandle {
    pub fn class(&self) -> ConcurrencyClass {
        self.class
    }

    /// Wait for the merge to finish.
    pub async fn wait(self) -> Result<MergeOutput> {
        match self.state {
            HandleState::Spawned(handle) => join(handle).await,
            HandleState::Deferred(job) => job.await,
        }
    }

    /// Wait at most `limit` for the merge.
    ///
    /// On timeout the caller gets a timeout error and the job keeps
    /// running to completion in the background.
    pub async fn wait_timeout(self, limit: Duration) -> Result<MergeOutput> {
        let handle = match self.state {
            HandleState::Spawned(handle) => handle,
            HandleState::Deferred(job) => tokio::spawn(job),
        };
        tokio::time::timeout(limit, join(handle))
            .await
            .map_err(|_| StitchError::Timeout { waited: limit })?
    }
}

async fn join(handle: JoinHandle<Result<MergeOutput>>) -> Result<MergeOutput> {
    handle
        .await
        .map_err(|e| StitchError::job_failed(format!("Merge task failed: {e}")))?
}
