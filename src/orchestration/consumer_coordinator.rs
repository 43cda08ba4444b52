//! # Consumer Coordinator
//!
//! Owns the broker consumer and the poll loop that feeds the dispatch workers.
//!
//! ## States
//!
//! - **Idle**: no consumer, no poll task
//! - **Active**: consumer created and subscribed, poll task running
//!
//! The first registration producing a non-empty topic set moves Idle to Active.
//! Later registration changes interrupt the in-flight poll, resubscribe (or
//! unsubscribe when no topics remain) and wake the loop. [`ConsumerCoordinator::close`]
//! returns to Idle for good.
//!
//! ## Poll loop
//!
//! ```text
//! loop {
//!     table empty?  -> wait on `subscribed`
//!     lock consumer -> poll(poll_interval) | `interrupt`
//!     records       -> DispatchWorkerPool (one task per record)
//! }
//! ```
//!
//! The consumer lives behind a FIFO [`tokio::sync::Mutex`]: a registration change
//! fires `interrupt` and then queues on the lock, so it acquires the consumer before
//! the loop can lock it again. Both notifies store a permit, so a wakeup sent while
//! the loop is not waiting is never lost.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::engine::{CallerIdentity, ProcessSignaller};
use crate::codec::{resolve_payload_type, CodecFactory, TypeResolutionContext};
use crate::config::BridgeConfig;
use crate::constants::defaults::POLL_ERROR_BACKOFF_MS;
use crate::error::{BridgeError, Result};
use crate::execution::DispatchWorkerPool;
use crate::logging::{log_dispatch_outcome, log_error};
use crate::messaging::{BrokerClientFactory, BrokerConsumer, BrokerRecord, ConsumerSettings};
use crate::models::DeploymentEvent;
use crate::registration::{DispatchTarget, RegistrationTable};

struct ActiveConsumer {
    consumer: Box<dyn BrokerConsumer>,
    workers: Arc<DispatchWorkerPool>,
    poll_task: JoinHandle<()>,
}

struct CoordinatorShared {
    table: RegistrationTable,
    codecs: Arc<CodecFactory>,
    signaller: Arc<dyn ProcessSignaller>,
    factory: Arc<dyn BrokerClientFactory>,
    settings: ConsumerSettings,
    poll_interval: Duration,
    max_workers: usize,
    /// Type resolution context per registered deployment id
    contexts: DashMap<String, Arc<dyn TypeResolutionContext>>,
    consumer: Mutex<Option<ActiveConsumer>>,
    /// Interrupts an in-flight poll
    interrupt: Notify,
    /// Wakes the loop waiting for a non-empty table
    subscribed: Notify,
    active: AtomicBool,
    closing: AtomicBool,
}

/// Configuration of a [`ConsumerCoordinator`]
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub consumer: ConsumerSettings,
    pub poll_interval: Duration,
    /// Ceiling of concurrent dispatches (minimum 1)
    pub max_workers: usize,
}

impl CoordinatorSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            consumer: config.consumer_settings(),
            poll_interval: config.poll_interval(),
            max_workers: config.consumer.max_notify_threads,
        }
    }
}

pub struct ConsumerCoordinator {
    shared: Arc<CoordinatorShared>,
}

impl std::fmt::Debug for ConsumerCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerCoordinator")
            .field("provider", &self.shared.factory.provider_name())
            .field("active", &self.is_active())
            .field("topics", &self.shared.table.topics())
            .finish()
    }
}

impl ConsumerCoordinator {
    pub fn new(
        table: RegistrationTable,
        codecs: Arc<CodecFactory>,
        signaller: Arc<dyn ProcessSignaller>,
        factory: Arc<dyn BrokerClientFactory>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            shared: Arc::new(CoordinatorShared {
                table,
                codecs,
                signaller,
                factory,
                settings: settings.consumer,
                poll_interval: settings.poll_interval,
                max_workers: settings.max_workers.max(1),
                contexts: DashMap::new(),
                consumer: Mutex::new(None),
                interrupt: Notify::new(),
                subscribed: Notify::new(),
                active: AtomicBool::new(false),
                closing: AtomicBool::new(false),
            }),
        }
    }

    pub fn table(&self) -> &RegistrationTable {
        &self.shared.table
    }

    /// Topics that currently need a subscription
    pub fn subscribed_topics(&self) -> BTreeSet<String> {
        self.shared.table.topics()
    }

    /// A consumer exists and the poll loop is running
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closing() {
            Err(BridgeError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Register a deployment and bring the subscription up to date
    pub async fn add_registration(&self, event: &DeploymentEvent) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        self.shared
            .contexts
            .insert(event.deployment_id.clone(), event.context.clone());
        self.shared
            .table
            .add_registration(&event.deployment_id, &event.process_definitions);
        self.registration_updated().await
    }

    /// Unregister a deployment and bring the subscription up to date
    pub async fn remove_registration(&self, event: &DeploymentEvent) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        let codecs = &self.shared.codecs;
        let context = event.context.as_ref();
        self.shared.table.remove_registration(
            &event.deployment_id,
            &event.process_definitions,
            |topic| codecs.topic_released(topic, context),
        );
        self.shared.contexts.remove(&event.deployment_id);
        self.registration_updated().await
    }

    /// Subscribe to the table's topics as of holding the consumer slot
    async fn registration_updated(&self) -> Result<BTreeSet<String>> {
        self.shared.interrupt.notify_one();
        let mut slot = self.shared.consumer.lock().await;
        if self.is_closing() {
            return Err(BridgeError::ShutDown);
        }
        let topics = self.shared.table.topics();

        let outcome = match slot.as_mut() {
            None if topics.is_empty() => Ok(()),
            None => match self.start_consumer(&topics).await {
                Ok(active) => {
                    *slot = Some(active);
                    self.shared.active.store(true, Ordering::Release);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Some(active) => {
                let result = if topics.is_empty() {
                    active.consumer.unsubscribe().await
                } else {
                    active.consumer.subscribe(&topics).await
                };
                result.map_err(|e| {
                    log_error(
                        "ConsumerCoordinator",
                        "update_subscription",
                        &e.to_string(),
                        Some(&format!("topics={topics:?}")),
                    );
                    BridgeError::from(e)
                })
            }
        };
        drop(slot);

        self.shared.subscribed.notify_one();
        outcome.map(|()| topics)
    }

    /// Create and subscribe the consumer and spawn the poll loop
    async fn start_consumer(&self, topics: &BTreeSet<String>) -> Result<ActiveConsumer> {
        let shared = &self.shared;
        let mut consumer = shared.factory.create_consumer(&shared.settings).map_err(|e| {
            error!(
                provider = shared.factory.provider_name(),
                error = %e,
                "❌ CONSUMER: Failed to create broker consumer - will retry on next registration"
            );
            BridgeError::from(e)
        })?;

        if let Err(e) = consumer.subscribe(topics).await {
            error!(error = %e, topics = ?topics, "❌ CONSUMER: Initial subscription failed");
            if let Err(close_error) = consumer.close(shared.poll_interval).await {
                warn!(error = %close_error, "Failed to close consumer after subscription failure");
            }
            return Err(e.into());
        }

        let workers = Arc::new(DispatchWorkerPool::new(shared.max_workers));
        let poll_task = tokio::spawn(poll_loop(Arc::clone(shared), Arc::clone(&workers)));
        info!(
            provider = shared.factory.provider_name(),
            group_id = %shared.settings.group_id,
            topics = ?topics,
            max_workers = shared.max_workers,
            "✅ CONSUMER: Broker consumer started"
        );

        Ok(ActiveConsumer {
            consumer,
            workers,
            poll_task,
        })
    }

    /// Stop polling, drain dispatch workers up to `timeout` and release the consumer
    ///
    /// Registration calls are rejected from the moment this is called.
    pub async fn close(&self, timeout: Duration) {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("🛑 CONSUMER: Shutdown requested");
        self.shared.interrupt.notify_one();
        self.shared.subscribed.notify_one();

        let active = self.shared.consumer.lock().await.take();
        self.shared.active.store(false, Ordering::Release);

        if let Some(mut active) = active {
            if let Err(e) = (&mut active.poll_task).await {
                warn!(error = %e, "Poll loop ended abnormally");
            }
            if !active.workers.shutdown(timeout).await {
                warn!(
                    pending = active.workers.in_flight(),
                    "Closing consumer with dispatches still in flight"
                );
            }
            if let Err(e) = active.consumer.unsubscribe().await {
                warn!(error = %e, "Unsubscribe during shutdown failed");
            }
            if let Err(e) = active.consumer.close(timeout).await {
                warn!(error = %e, "Broker consumer did not close cleanly");
            }
        }

        self.shared.table.clear();
        self.shared.contexts.clear();
        info!("✅ CONSUMER: Shutdown complete");
    }
}

async fn poll_loop(shared: Arc<CoordinatorShared>, workers: Arc<DispatchWorkerPool>) {
    debug!("Poll loop started");
    while !shared.closing.load(Ordering::Acquire) {
        if shared.table.is_empty() {
            trace!("No registrations, waiting for a subscription");
            shared.subscribed.notified().await;
            continue;
        }

        let polled = {
            let mut slot = shared.consumer.lock().await;
            let Some(active) = slot.as_mut() else {
                break;
            };
            tokio::select! {
                result = active.consumer.poll(shared.poll_interval) => Some(result),
                _ = shared.interrupt.notified() => None,
            }
        };

        let records = match polled {
            // Interrupted by a registration change or shutdown
            None => continue,
            Some(Ok(records)) => records,
            Some(Err(e)) => {
                warn!(error = %e, transient = e.is_transient(), "Broker poll failed, retrying");
                tokio::time::sleep(Duration::from_millis(POLL_ERROR_BACKOFF_MS)).await;
                continue;
            }
        };
        if records.is_empty() || shared.closing.load(Ordering::Acquire) {
            continue;
        }

        let mut per_topic: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &records {
            *per_topic.entry(record.topic.as_str()).or_default() += 1;
        }
        debug!(records = records.len(), per_topic = ?per_topic, "Received broker records");

        for record in records {
            if shared.closing.load(Ordering::Acquire) {
                debug!("Shutdown started, leaving the rest of the batch undispatched");
                break;
            }
            trace!(topic = %record.topic, partition = record.partition, offset = record.offset, "Dispatching record");
            if !workers.submit(dispatch_record(Arc::clone(&shared), record)) {
                break;
            }
        }
    }
    debug!("Poll loop stopped");
}

/// Runs once a worker permit is held; records still queued at shutdown are skipped
async fn dispatch_record(shared: Arc<CoordinatorShared>, record: BrokerRecord) {
    if shared.closing.load(Ordering::Acquire) {
        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Shutdown started before dispatch, skipping record"
        );
        return;
    }
    let targets = shared.table.dispatch(&record.topic);
    if targets.is_empty() {
        trace!(topic = %record.topic, "No registrations for record topic");
        return;
    }
    let caller = CallerIdentity::from_record(&record);
    for target in targets {
        deliver(&shared, &record, target, caller.as_ref()).await;
    }
}

async fn deliver(
    shared: &CoordinatorShared,
    record: &BrokerRecord,
    target: DispatchTarget,
    caller: Option<&CallerIdentity>,
) {
    let signal_name = target.signal_name();
    let deployment_id = target.deployment_id.as_str();
    let Some(context) = shared
        .contexts
        .get(deployment_id)
        .map(|entry| Arc::clone(entry.value()))
    else {
        log_dispatch_outcome(&record.topic, deployment_id, &signal_name, "skipped", Some("deployment no longer registered"));
        return;
    };

    let payload = resolve_payload_type(context.as_ref(), target.descriptor.structure_ref.as_deref())
        .and_then(|payload_type| {
            shared
                .codecs
                .reader_for(&record.topic, context.as_ref())
                .read_event(&record.value, &payload_type)
        });
    let payload = match payload {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                topic = %record.topic,
                offset = record.offset,
                deployment_id = %deployment_id,
                error = %e,
                "Dropping record with unreadable payload"
            );
            log_dispatch_outcome(&record.topic, deployment_id, &signal_name, "payload_error", Some(&e.to_string()));
            return;
        }
    };

    match shared
        .signaller
        .signal_event(deployment_id, &signal_name, payload, caller)
        .await
    {
        Ok(()) => log_dispatch_outcome(&record.topic, deployment_id, &signal_name, "delivered", None),
        Err(e) => {
            warn!(
                topic = %record.topic,
                deployment_id = %deployment_id,
                signal_name = %signal_name,
                error = %e,
                "Process engine rejected signal"
            );
            log_dispatch_outcome(&record.topic, deployment_id, &signal_name, "rejected", Some(&e.to_string()));
        }
    }
}
