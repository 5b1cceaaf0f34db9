//! # pfjobs - File de tâches dédupliquée
//!
//! Une [`JobQueue`] exécute des tâches asynchrones identifiées par une clé
//! (l'identifiant de la photo à exporter) avec une limite de concurrence.
//!
//! Une clé ne peut avoir qu'une seule tâche en attente ou en cours : un
//! second `enqueue` avec la même clé est ignoré et retourne `false`. La
//! réservation est libérée quand la tâche se termine, échoue ou panique.
//!
//! ```rust,no_run
//! use pfjobs::JobQueue;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queue = JobQueue::new(2);
//! assert!(queue.enqueue("uuid-1", async { Ok(()) }));
//! queue.wait_idle().await;
//! # }
//! ```

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Tâche de fond exécutée par la file
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

struct Job {
    key: String,
    task: JobFuture,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: usize,
    /// Clés en attente ou en cours d'exécution
    inflight: HashSet<String>,
    completed: u64,
    failed: u64,
}

struct Inner {
    concurrency: usize,
    state: Mutex<QueueState>,
    idle: Notify,
}

/// Compteurs exposés par [`JobQueue::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
}

/// File de tâches à clé unique avec limite de concurrence
///
/// Le clonage est peu coûteux : tous les clones partagent la même file.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    /// Crée une file exécutant au plus `concurrency` tâches simultanément
    ///
    /// Une valeur nulle est ramenée à 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                concurrency: concurrency.max(1),
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Ajoute une tâche pour `key`
    ///
    /// Retourne `false` sans rien faire si une tâche de même clé est déjà en
    /// attente ou en cours. Doit être appelée depuis un runtime tokio.
    pub fn enqueue<F>(&self, key: impl Into<String>, task: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let key = key.into();
        {
            let mut state = self.inner.lock();
            if !state.inflight.insert(key.clone()) {
                debug!(key = %key, "job already queued or running");
                return false;
            }
            state.pending.push_back(Job {
                key: key.clone(),
                task: Box::pin(task),
            });
            debug!(key = %key, pending = state.pending.len(), "job enqueued");
        }

        Inner::pump(&self.inner);
        true
    }

    /// Nombre de tâches en attente
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Nombre de tâches en cours d'exécution
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    /// Indique si une tâche de clé `key` est en attente ou en cours
    pub fn is_inflight(&self, key: &str) -> bool {
        self.inner.lock().inflight.contains(key)
    }

    pub fn stats(&self) -> JobStats {
        let state = self.inner.lock();
        JobStats {
            pending: state.pending.len(),
            running: state.running,
            completed: state.completed,
            failed: state.failed,
        }
    }

    /// Attend que la file soit vide et qu'aucune tâche ne tourne
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.running == 0
    }
}

impl Inner {
    /// L'état reste cohérent même si un thread a paniqué en le tenant :
    /// aucune section critique n'exécute de code utilisateur.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Démarre autant de tâches en attente que la concurrence le permet
    fn pump(inner: &Arc<Inner>) {
        let ready: Vec<Job> = {
            let mut state = inner.lock();
            let mut ready = Vec::new();
            while state.running < inner.concurrency {
                let Some(job) = state.pending.pop_front() else {
                    break;
                };
                state.running += 1;
                ready.push(job);
            }
            ready
        };

        for job in ready {
            let inner = inner.clone();
            tokio::spawn(async move {
                let Job { key, task } = job;
                let started = Instant::now();
                let outcome = AssertUnwindSafe(task).catch_unwind().await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let succeeded = match outcome {
                    Ok(Ok(())) => {
                        debug!(key = %key, elapsed_ms, "job completed");
                        true
                    }
                    Ok(Err(e)) => {
                        warn!(key = %key, elapsed_ms, "job failed: {:#}", e);
                        false
                    }
                    Err(_) => {
                        error!(key = %key, elapsed_ms, "job panicked");
                        false
                    }
                };

                inner.finish(&key, succeeded);
                Inner::pump(&inner);
            });
        }
    }

    fn finish(&self, key: &str, succeeded: bool) {
        let mut state = self.lock();
        state.running -= 1;
        state.inflight.remove(key);
        if succeeded {
            state.completed += 1;
        } else {
            state.failed += 1;
        }
        let idle = state.is_idle();
        drop(state);

        if idle {
            self.idle.notify_waiters();
        }
    }
}
