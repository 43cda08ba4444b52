//! Process engine doubles for integration tests.

use std::collections::HashSet;
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tasker_event_bridge::orchestration::{CallerIdentity, EngineError, ProcessSignaller};
use tokio::sync::{Notify, Semaphore};

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub deployment_id: String,
    pub signal_name: String,
    pub payload: Value,
    pub caller: Option<CallerIdentity>,
}

/// Records every delivery; can be told to reject a deployment
#[derive(Debug, Default)]
pub struct RecordingSignaller {
    deliveries: Mutex<Vec<Delivery>>,
    rejected: Mutex<HashSet<String>>,
    changed: Notify,
}

impl RecordingSignaller {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_deployment(&self, deployment_id: &str) {
        self.rejected.lock().insert(deployment_id.to_string());
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Deployment ids delivered to, sorted
    pub fn deployment_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .deliveries()
            .into_iter()
            .map(|d| d.deployment_id)
            .collect();
        ids.sort();
        ids
    }

    /// Wait until at least `count` deliveries arrived; panics after `timeout`
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Delivery> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut changed = pin!(self.changed.notified());
            changed.as_mut().enable();
            let deliveries = self.deliveries();
            if deliveries.len() >= count {
                return deliveries;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                panic!(
                    "expected {count} deliveries within {timeout:?}, got {:?}",
                    self.deliveries()
                );
            }
        }
    }
}

#[async_trait]
impl ProcessSignaller for RecordingSignaller {
    async fn signal_event(
        &self,
        deployment_id: &str,
        signal_name: &str,
        payload: Value,
        caller: Option<&CallerIdentity>,
    ) -> Result<(), EngineError> {
        if self.rejected.lock().contains(deployment_id) {
            return Err(EngineError::rejected(
                deployment_id,
                signal_name,
                "no instance waiting",
            ));
        }
        self.deliveries.lock().push(Delivery {
            deployment_id: deployment_id.to_string(),
            signal_name: signal_name.to_string(),
            payload,
            caller: caller.cloned(),
        });
        self.changed.notify_waiters();
        Ok(())
    }
}

/// Blocks every delivery until the test releases it
#[derive(Debug)]
pub struct BlockingSignaller {
    gate: Semaphore,
    entered: Notify,
    completed: AtomicUsize,
}

impl BlockingSignaller {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            entered: Notify::new(),
            completed: AtomicUsize::new(0),
        })
    }

    /// Resolves once a delivery is blocked inside the signaller
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self, deliveries: usize) {
        self.gate.add_permits(deliveries);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessSignaller for BlockingSignaller {
    async fn signal_event(
        &self,
        _deployment_id: &str,
        _signal_name: &str,
        _payload: Value,
        _caller: Option<&CallerIdentity>,
    ) -> Result<(), EngineError> {
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| EngineError::unavailable("gate closed"))?;
        permit.forget();
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
