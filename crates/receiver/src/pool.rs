//! Bounded worker pool dispatching receiver tasks.

use crate::error::{ReceiverError, ReceiverResult};
use crate::mock::{MockBehavior, MockReceiver};
use crate::process::{Receiver, ReceiverProcess};
use bytes::Bytes;
use sluice_core::{LeasePath, RepositoryTag};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// How the pool obtains a fresh receiver for each task.
#[derive(Clone, Debug)]
pub enum ReceiverSpawner {
    /// Spawn the receiver executable as a child process.
    Process { exec: PathBuf },
    /// Use the in-process mock.
    Mock(MockBehavior),
}

impl ReceiverSpawner {
    async fn spawn(&self) -> ReceiverResult<Box<dyn Receiver>> {
        match self {
            Self::Process { exec } => {
                let receiver = ReceiverProcess::spawn(exec).await?;
                Ok(Box::new(receiver))
            }
            Self::Mock(behavior) => Ok(Box::new(MockReceiver::new(behavior.clone()))),
        }
    }
}

enum TaskKind {
    Payload {
        payload: Bytes,
        digest: String,
        header_size: u32,
    },
    Commit {
        old_root_hash: String,
        new_root_hash: String,
        tag: RepositoryTag,
    },
}

/// One unit of receiver work, with its single-shot reply slot.
struct Task {
    lease_path: LeasePath,
    kind: TaskKind,
    reply: oneshot::Sender<ReceiverResult<()>>,
}

struct PoolShared {
    spawner: ReceiverSpawner,
    // One mutex per repository, created on first commit and never
    // reclaimed; the set of repositories is bounded by configuration.
    commit_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PoolShared {
    fn commit_lock(&self, repository: &str) -> Arc<Mutex<()>> {
        let mut locks = self.commit_locks.lock().expect("commit lock map poisoned");
        locks.entry(repository.to_string()).or_default().clone()
    }
}

/// A bounded pool of receiver workers.
///
/// Payload tasks run concurrently on any free worker; commit tasks
/// additionally serialize on a per-repository mutex. Every task spawns
/// its own receiver and terminates it on completion.
pub struct Pool {
    sender: StdMutex<Option<mpsc::Sender<Task>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    shared: Arc<PoolShared>,
}

impl Pool {
    /// Start `num_workers` workers draining a shared task channel.
    pub fn start(spawner: ReceiverSpawner, num_workers: usize) -> ReceiverResult<Self> {
        if num_workers == 0 {
            return Err(ReceiverError::Protocol(
                "worker pool needs at least one worker".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::channel(num_workers);
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(PoolShared {
            spawner,
            commit_locks: StdMutex::new(HashMap::new()),
        });

        let workers = (0..num_workers)
            .map(|worker_id| {
                let tasks = receiver.clone();
                let shared = shared.clone();
                tokio::spawn(worker(tasks, shared, worker_id))
            })
            .collect();

        tracing::info!(num_workers, "worker pool started");

        Ok(Self {
            sender: StdMutex::new(Some(sender)),
            workers: StdMutex::new(workers),
            shared,
        })
    }

    /// Submit a payload for unpacking under the leased path.
    pub async fn submit_payload(
        &self,
        lease_path: &LeasePath,
        payload: Bytes,
        digest: &str,
        header_size: u32,
    ) -> ReceiverResult<()> {
        self.dispatch(
            lease_path.clone(),
            TaskKind::Payload {
                payload,
                digest: digest.to_string(),
                header_size,
            },
        )
        .await
    }

    /// Commit the leased path, serialized per repository.
    pub async fn commit(
        &self,
        lease_path: &LeasePath,
        old_root_hash: &str,
        new_root_hash: &str,
        tag: RepositoryTag,
    ) -> ReceiverResult<()> {
        self.dispatch(
            lease_path.clone(),
            TaskKind::Commit {
                old_root_hash: old_root_hash.to_string(),
                new_root_hash: new_root_hash.to_string(),
                tag,
            },
        )
        .await
    }

    async fn dispatch(&self, lease_path: LeasePath, kind: TaskKind) -> ReceiverResult<()> {
        let sender = self
            .sender
            .lock()
            .expect("pool sender poisoned")
            .clone()
            .ok_or(ReceiverError::PoolClosed)?;

        let (reply, result) = oneshot::channel();
        sender
            .send(Task {
                lease_path,
                kind,
                reply,
            })
            .await
            .map_err(|_| ReceiverError::PoolClosed)?;

        result.await.map_err(|_| ReceiverError::TaskAborted)?
    }

    /// Close the task channel, drain outstanding tasks, and wait for
    /// every worker to finish.
    pub async fn stop(&self) {
        drop(self.sender.lock().expect("pool sender poisoned").take());
        let workers = std::mem::take(&mut *self.workers.lock().expect("pool workers poisoned"));
        for handle in workers {
            let _ = handle.await;
        }
        tracing::info!("worker pool stopped");
    }
}

async fn worker(tasks: Arc<Mutex<mpsc::Receiver<Task>>>, shared: Arc<PoolShared>, worker_id: usize) {
    tracing::debug!(worker_id, "receiver worker started");

    loop {
        // The channel lock is held only while waiting for the next
        // task; execution happens with the lock released.
        let task = tasks.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };
        run_task(&shared, task, worker_id).await;
    }

    tracing::debug!(worker_id, "receiver worker finished");
}

async fn run_task(shared: &PoolShared, task: Task, worker_id: usize) {
    let t0 = Instant::now();
    let Task {
        lease_path,
        kind,
        reply,
    } = task;

    let mut receiver = match shared.spawner.spawn().await {
        Ok(receiver) => receiver,
        Err(e) => {
            let _ = reply.send(Err(e));
            return;
        }
    };

    let task_type = match kind {
        TaskKind::Payload { .. } => "payload",
        TaskKind::Commit { .. } => "commit",
    };

    let mut result = match kind {
        TaskKind::Payload {
            payload,
            digest,
            header_size,
        } => {
            receiver
                .submit_payload(lease_path.as_str(), payload, &digest, header_size)
                .await
        }
        TaskKind::Commit {
            old_root_hash,
            new_root_hash,
            tag,
        } => {
            let lock = shared.commit_lock(lease_path.repository());
            let _guard = lock.lock().await;
            receiver
                .commit(lease_path.as_str(), &old_root_hash, &new_root_hash, &tag)
                .await
        }
    };

    // The reply slot is written exactly once. A quit failure after a
    // successful task becomes the task result; after a failed task it
    // is only logged.
    if let Err(quit_error) = receiver.quit().await {
        if result.is_ok() {
            result = Err(quit_error);
        } else {
            tracing::warn!(
                worker_id,
                error = %quit_error,
                "receiver quit failed after task error"
            );
        }
    }

    let _ = reply.send(result);

    tracing::debug!(
        worker_id,
        time = t0.elapsed().as_secs_f64(),
        "{} task complete",
        task_type
    );
}
