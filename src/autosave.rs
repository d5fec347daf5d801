use crate::errors::{AppError, AppResult};
use crate::models::Record;
use crate::schema::DatasetSchema;
use crate::store::RecordStore;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Clone)]
struct PendingSave {
    schema: DatasetSchema,
    records: Vec<Record>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<PendingSave>,
    in_flight: Option<String>,
    completed: u64,
    superseded: u64,
    last_error: Option<String>,
    closed: bool,
}

// One write in flight. A newer snapshot of a dataset replaces its queued one.
#[derive(Clone)]
pub struct AutosaveWriter {
    store: Arc<dyn RecordStore>,
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
    idle: Arc<Notify>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveStats {
    pub completed: u64,
    pub superseded: u64,
    pub pending: usize,
    pub last_error: Option<String>,
}

impl AutosaveWriter {
    pub fn spawn(store: Arc<dyn RecordStore>) -> Self {
        let writer = Self {
            store,
            state: Arc::new(Mutex::new(QueueState::default())),
            wake: Arc::new(Notify::new()),
            idle: Arc::new(Notify::new()),
        };
        let worker = writer.clone();
        tokio::spawn(async move {
            worker.run_loop().await;
        });
        writer
    }

    pub async fn submit(&self, schema: &DatasetSchema, records: Vec<Record>) -> AppResult<bool> {
        let superseded = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(AppError::Internal("autosave writer is shut down".to_string()));
            }
            if let Some(queued) = state.pending.iter_mut().find(|queued| queued.schema.id == schema.id) {
                queued.schema = schema.clone();
                queued.records = records;
                state.superseded += 1;
                true
            } else {
                state.pending.push_back(PendingSave {
                    schema: schema.clone(),
                    records,
                });
                false
            }
        };
        if superseded {
            tracing::debug!(dataset = %schema.id, "autosave snapshot superseded");
        }
        self.wake.notify_one();
        Ok(superseded)
    }

    pub async fn cancel(&self, dataset_id: &str) -> bool {
        let removed = {
            let mut state = self.state.lock().await;
            let before = state.pending.len();
            state.pending.retain(|queued| queued.schema.id != dataset_id);
            before != state.pending.len()
        };
        if removed {
            self.idle.notify_waiters();
        }
        removed
    }

    pub async fn flush(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            {
                let state = self.state.lock().await;
                if state.pending.is_empty() && state.in_flight.is_none() {
                    return;
                }
            }
            idle.await;
        }
    }

    pub async fn shutdown(&self) -> AutosaveStats {
        self.state.lock().await.closed = true;
        self.wake.notify_one();
        self.flush().await;
        self.stats().await
    }

    pub async fn stats(&self) -> AutosaveStats {
        let state = self.state.lock().await;
        AutosaveStats {
            completed: state.completed,
            superseded: state.superseded,
            pending: state.pending.len(),
            last_error: state.last_error.clone(),
        }
    }

    async fn run_loop(self) {
        loop {
            let next = {
                let mut state = self.state.lock().await;
                let next = state.pending.pop_front();
                state.in_flight = next.as_ref().map(|save| save.schema.id.clone());
                next
            };

            let Some(save) = next else {
                self.idle.notify_waiters();
                if self.state.lock().await.closed {
                    return;
                }
                self.wake.notified().await;
                continue;
            };

            let store = self.store.clone();
            let dataset = save.schema.id.clone();
            let count = save.records.len();
            let result = tokio::task::spawn_blocking(move || store.save(&save.schema, &save.records))
                .await
                .map_err(|error| AppError::Internal(error.to_string()))
                .and_then(|result| result);

            let mut state = self.state.lock().await;
            state.in_flight = None;
            match result {
                Ok(()) => {
                    state.completed += 1;
                    tracing::debug!(dataset = %dataset, count, "autosave written");
                }
                Err(error) => {
                    tracing::warn!(dataset = %dataset, error = %error, "autosave failed");
                    state.last_error = Some(error.to_string());
                }
            }
        }
    }
}
