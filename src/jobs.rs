use crate::{
    correlation::CorrelationContext,
    models::EnrichmentReport,
    pipeline::{EnrichmentPipeline, EnrichmentRequest},
};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info};
use uuid::Uuid;

/// Runs acknowledged enrichments on detached tasks and remembers how recent ones ended.
#[derive(Clone)]
pub struct EnrichmentJobs {
    pipeline: EnrichmentPipeline,
    history: Arc<Mutex<History>>,
}

#[derive(Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        result: EnrichmentReport,
    },
    Failed {
        error: String,
        stage: Option<String>,
    },
}

impl JobState {
    fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub message_id: String,
    pub product_id: String,
    #[serde(flatten)]
    pub state: JobState,
}

struct Entry {
    message_id: String,
    product_id: String,
    state: JobState,
}

struct History {
    capacity: usize,
    order: VecDeque<Uuid>,
    entries: HashMap<Uuid, Entry>,
}

impl History {
    fn insert(&mut self, id: Uuid, entry: Entry) {
        if self.entries.insert(id, entry).is_none() {
            self.order.push_back(id);
        }
        self.evict();
    }

    fn set_state(&mut self, id: Uuid, state: JobState) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = state;
        }
        self.evict();
    }

    // Only finished entries are dropped; in-flight jobs stay visible until they end.
    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(position) = self.order.iter().position(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|entry| entry.state.is_finished())
            }) else {
                break;
            };
            if let Some(id) = self.order.remove(position) {
                self.entries.remove(&id);
            }
        }
    }
}

impl EnrichmentJobs {
    pub fn new(pipeline: EnrichmentPipeline, capacity: usize) -> Self {
        Self {
            pipeline,
            history: Arc::new(Mutex::new(History {
                capacity: capacity.max(1),
                order: VecDeque::new(),
                entries: HashMap::new(),
            })),
        }
    }

    /// Records the job as queued and starts it. The returned handle may be dropped.
    pub async fn submit(
        &self,
        request: EnrichmentRequest,
        ctx: CorrelationContext,
    ) -> JoinHandle<()> {
        let id = ctx.process_id;
        self.history.lock().await.insert(
            id,
            Entry {
                message_id: ctx.message_id.clone(),
                product_id: request.product_id.clone(),
                state: JobState::Queued,
            },
        );

        let pipeline = self.pipeline.clone();
        let history = self.history.clone();
        tokio::spawn(async move {
            history.lock().await.set_state(id, JobState::Running);

            // The run gets its own task so a panic in a collaborator surfaces here as a JoinError.
            let run = {
                let request = request.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { pipeline.run(&request, &ctx).await })
            };

            let state = match run.await {
                Ok(Ok(report)) => {
                    info!(
                        target = "pixelphraser.jobs",
                        process_id = %ctx.process_id,
                        message_id = %ctx.message_id,
                        product_id = %request.product_id,
                        "enrichment completed",
                    );
                    JobState::Completed { result: report }
                }
                Ok(Err(err)) => {
                    error!(
                        target = "pixelphraser.jobs",
                        process_id = %ctx.process_id,
                        message_id = %ctx.message_id,
                        product_id = %request.product_id,
                        stage = err.stage(),
                        detail = err.detail(),
                        "enrichment failed",
                    );
                    JobState::Failed {
                        error: err.detail().to_string(),
                        stage: Some(err.stage().to_string()),
                    }
                }
                Err(join_err) => {
                    error!(
                        target = "pixelphraser.jobs",
                        process_id = %ctx.process_id,
                        message_id = %ctx.message_id,
                        product_id = %request.product_id,
                        error = %join_err,
                        "enrichment task aborted",
                    );
                    JobState::Failed {
                        error: if join_err.is_panic() {
                            "enrichment task panicked".to_string()
                        } else {
                            "enrichment task cancelled".to_string()
                        },
                        stage: None,
                    }
                }
            };
            history.lock().await.set_state(id, state);
        })
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let guard = self.history.lock().await;
        guard.entries.get(&id).map(|entry| JobInfo {
            id: id.to_string(),
            message_id: entry.message_id.clone(),
            product_id: entry.product_id.clone(),
            state: entry.state.clone(),
        })
    }
}
