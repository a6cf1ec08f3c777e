use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{validate_candidate, ExtractionJob, JobPriority, JobStatus};
use crate::providers::{CovenantStore, ExtractionService, JobDispatcher};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs allowed in `processing` at the same instant.
    pub max_concurrent: usize,
    /// Total processing attempts before a job is terminally failed.
    pub max_retries: u32,
    /// Candidates below this confidence are discarded before persistence.
    pub min_confidence: f64,
    /// Terminal jobs older than this are eligible for purging.
    pub retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_concurrent: 3,
            max_retries: 3,
            min_confidence: super::MIN_CANDIDATE_CONFIDENCE,
            retention: Duration::hours(24),
        }
    }
}

/// How an extraction request was admitted: handed to the external
/// orchestration path, or queued locally when that path is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched(Uuid),
    Fallback { job_id: Uuid, reason: String },
}

impl DispatchOutcome {
    pub fn job_id(&self) -> Uuid {
        match self {
            DispatchOutcome::Dispatched(id) => *id,
            DispatchOutcome::Fallback { job_id, .. } => *job_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Heap entry ordering: priority first, then FIFO among equals.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEntry {
    priority: JobPriority,
    seq: Reverse<u64>,
    job_id: Uuid,
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct JobInput {
    borrower_id: Uuid,
    contract_text: String,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, ExtractionJob>,
    inputs: HashMap<Uuid, JobInput>,
    pending: BinaryHeap<PendingEntry>,
    processing: HashSet<Uuid>,
    next_seq: u64,
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    extraction: Arc<dyn ExtractionService>,
    store: Arc<dyn CovenantStore>,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
}

/// Priority-ordered, bounded-concurrency extraction runner. All queue state
/// lives behind one mutex owned by this instance; callers inject the queue
/// where they need it rather than reaching for process-wide globals.
pub struct ExtractionQueue {
    inner: Arc<Inner>,
}

impl ExtractionQueue {
    pub fn new(
        config: QueueConfig,
        extraction: Arc<dyn ExtractionService>,
        store: Arc<dyn CovenantStore>,
        dispatcher: Option<Arc<dyn JobDispatcher>>,
    ) -> Self {
        ExtractionQueue {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(QueueState::default()),
                extraction,
                store,
                dispatcher,
            }),
        }
    }

    /// Admit an extraction request. The external dispatcher gets first
    /// refusal; on its absence or failure the job lands on the local queue
    /// and the outcome says so explicitly.
    pub async fn enqueue(
        &self,
        contract_id: Uuid,
        borrower_id: Uuid,
        contract_text: String,
        priority: JobPriority,
    ) -> DispatchOutcome {
        if let Some(dispatcher) = &self.inner.dispatcher {
            match dispatcher.dispatch(contract_id, &contract_text).await {
                Ok(remote_id) => {
                    log::debug!(
                        "extraction for contract {} dispatched as {}",
                        contract_id,
                        remote_id
                    );
                    return DispatchOutcome::Dispatched(remote_id);
                }
                Err(e) => {
                    log::warn!(
                        "extraction dispatch failed for contract {}, falling back to local queue: {}",
                        contract_id,
                        e
                    );
                    let job_id = Inner::enqueue_local(
                        &self.inner,
                        contract_id,
                        borrower_id,
                        contract_text,
                        priority,
                    )
                    .await;
                    return DispatchOutcome::Fallback {
                        job_id,
                        reason: e.to_string(),
                    };
                }
            }
        }

        let job_id =
            Inner::enqueue_local(&self.inner, contract_id, borrower_id, contract_text, priority)
                .await;
        DispatchOutcome::Fallback {
            job_id,
            reason: "no external dispatcher configured".to_string(),
        }
    }

    /// Snapshot of one job. A reader always sees the job in exactly one of
    /// its defined states.
    pub async fn job_status(&self, job_id: Uuid) -> Option<ExtractionJob> {
        self.inner.state.lock().await.jobs.get(&job_id).cloned()
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        let mut stats = QueueStats {
            total: state.jobs.len(),
            ..QueueStats::default()
        };
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop terminal jobs whose last update is older than the retention
    /// window. Returns how many were purged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.inner.config.retention;
        let mut state = self.inner.state.lock().await;
        let expired: Vec<Uuid> = state
            .jobs
            .iter()
            .filter(|(_, job)| job.status.is_terminal() && job.updated_at < cutoff)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            state.jobs.remove(id);
            state.inputs.remove(id);
        }
        if !expired.is_empty() {
            log::debug!("purged {} expired extraction jobs", expired.len());
        }
        expired.len()
    }
}

impl Inner {
    async fn enqueue_local(
        inner: &Arc<Inner>,
        contract_id: Uuid,
        borrower_id: Uuid,
        contract_text: String,
        priority: JobPriority,
    ) -> Uuid {
        let job_id = Uuid::new_v4();
        let now = Utc::now();
        {
            let mut state = inner.state.lock().await;
            state.jobs.insert(
                job_id,
                ExtractionJob {
                    id: job_id,
                    contract_id,
                    status: JobStatus::Pending,
                    priority,
                    progress_percent: 0,
                    retry_count: 0,
                    max_retries: inner.config.max_retries,
                    error: None,
                    covenants_extracted: 0,
                    created_at: now,
                    updated_at: now,
                },
            );
            state.inputs.insert(
                job_id,
                JobInput {
                    borrower_id,
                    contract_text,
                },
            );
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push(PendingEntry {
                priority,
                seq: Reverse(seq),
                job_id,
            });
        }
        log::debug!("extraction job {} queued at {} priority", job_id, priority);
        Inner::pump(inner).await;
        job_id
    }

    /// Move pending jobs into `processing` while capacity is free. The heap
    /// may hold stale entries for jobs already retried or purged; those are
    /// skipped, never started twice.
    fn pump(inner: &Arc<Inner>) -> futures::future::BoxFuture<'static, ()> {
        let inner = Arc::clone(inner);
        Box::pin(async move {
        let mut to_start = Vec::new();
        {
            let mut state = inner.state.lock().await;
            while state.processing.len() < inner.config.max_concurrent {
                let entry = match state.pending.pop() {
                    Some(e) => e,
                    None => break,
                };
                let job = match state.jobs.get_mut(&entry.job_id) {
                    Some(j) if j.status == JobStatus::Pending => j,
                    _ => continue,
                };
                job.status = JobStatus::Processing;
                job.progress_percent = 10;
                job.updated_at = Utc::now();
                state.processing.insert(entry.job_id);
                to_start.push(entry.job_id);
            }
        }

        for job_id in to_start {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                Inner::run_job(inner, job_id).await;
            });
        }
        })
    }

    async fn run_job(inner: Arc<Inner>, job_id: Uuid) {
        let (borrower_id, contract_id, contract_text) = {
            let state = inner.state.lock().await;
            let input = match state.inputs.get(&job_id) {
                Some(i) => i,
                None => return,
            };
            let contract_id = match state.jobs.get(&job_id) {
                Some(j) => j.contract_id,
                None => return,
            };
            (input.borrower_id, contract_id, input.contract_text.clone())
        };

        match inner.extraction.extract_covenants(&contract_text).await {
            Ok(outcome) => {
                inner.set_progress(job_id, 60).await;
                let mut persisted = 0usize;
                let mut save_error = None;
                for candidate in &outcome.covenants {
                    match validate_candidate(
                        candidate,
                        contract_id,
                        borrower_id,
                        inner.config.min_confidence,
                    ) {
                        Ok(covenant) => match inner.store.save_covenant(covenant).await {
                            Ok(_) => persisted += 1,
                            Err(e) => {
                                save_error = Some(e.to_string());
                                break;
                            }
                        },
                        Err(reason) => {
                            log::debug!(
                                "job {}: discarded candidate '{}': {}",
                                job_id,
                                candidate.name,
                                reason
                            );
                        }
                    }
                }

                match save_error {
                    None => inner.complete_job(job_id, persisted).await,
                    Some(message) => Inner::fail_attempt(&inner, job_id, message).await,
                }
            }
            Err(e) => {
                Inner::fail_attempt(&inner, job_id, e.to_string()).await;
            }
        }

        Inner::pump(&inner).await;
    }

    async fn set_progress(&self, job_id: Uuid, percent: u8) {
        let mut state = self.state.lock().await;
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.progress_percent = percent;
            job.updated_at = Utc::now();
        }
    }

    async fn complete_job(&self, job_id: Uuid, covenants_extracted: usize) {
        let mut state = self.state.lock().await;
        state.processing.remove(&job_id);
        state.inputs.remove(&job_id);
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.status = JobStatus::Completed;
            job.progress_percent = 100;
            job.covenants_extracted = covenants_extracted;
            job.error = None;
            job.updated_at = Utc::now();
            log::info!(
                "extraction job {} completed with {} covenants",
                job_id,
                covenants_extracted
            );
        }
    }

    /// One processing attempt failed. Below the retry budget the job goes
    /// back to pending after an exponential backoff; at the budget it is
    /// terminally failed with the error retained for operator inspection.
    async fn fail_attempt(inner: &Arc<Inner>, job_id: Uuid, message: String) {
        let retry_delay = {
            let mut state = inner.state.lock().await;
            state.processing.remove(&job_id);
            let job = match state.jobs.get_mut(&job_id) {
                Some(j) => j,
                None => return,
            };
            job.retry_count += 1;
            job.error = Some(message.clone());
            job.updated_at = Utc::now();

            if job.retry_count >= job.max_retries {
                job.status = JobStatus::Failed;
                job.progress_percent = 0;
                let retry_count = job.retry_count;
                state.inputs.remove(&job_id);
                log::error!(
                    "extraction job {} failed after {} attempts: {}",
                    job_id,
                    retry_count,
                    message
                );
                None
            } else {
                job.status = JobStatus::Pending;
                job.progress_percent = 0;
                let delay = std::time::Duration::from_secs(1 << job.retry_count);
                log::warn!(
                    "extraction job {} attempt {} failed, retrying in {:?}: {}",
                    job_id,
                    job.retry_count,
                    delay,
                    message
                );
                Some(delay)
            }
        };

        if let Some(delay) = retry_delay {
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                {
                    let mut state = inner.state.lock().await;
                    let (priority, still_pending) = match state.jobs.get(&job_id) {
                        Some(j) => (j.priority, j.status == JobStatus::Pending),
                        None => return,
                    };
                    if still_pending {
                        let seq = state.next_seq;
                        state.next_seq += 1;
                        state.pending.push(PendingEntry {
                            priority,
                            seq: Reverse(seq),
                            job_id,
                        });
                    }
                }
                Inner::pump(&inner).await;
            });
        }
    }
}
