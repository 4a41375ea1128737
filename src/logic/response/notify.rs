//! Notification Fan-out Dispatcher
//!
//! Every enabled channel runs as its own task with its own retry budget, so
//! a failing or hanging channel cannot hold up the others. Results are
//! collected against one global deadline; a channel still running at the
//! deadline is reported `Failed` (timeout) and handed back as pending.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use super::channels::{EmailTransport, LogEmailTransport, LogSink, NotificationSink};
use super::retry::RetryPolicy;
use super::types::{AlertPayload, LateOutcome, NotificationOutcome, PendingOutcome};
use crate::logic::config::EngineConfig;
use crate::logic::error::ChannelError;
use crate::logic::policy::Channel;

/// Finalized channel outcomes plus attempts still running past the deadline
#[derive(Debug, Default)]
pub struct Dispatch {
    /// One entry per enabled channel, in channel order
    pub outcomes: Vec<NotificationOutcome>,
    pub pending: Vec<PendingOutcome>,
}

pub struct NotificationDispatcher {
    sinks: HashMap<Channel, Arc<dyn NotificationSink>>,
    email: Option<Arc<dyn EmailTransport>>,
    local_retry: RetryPolicy,
    email_retry: RetryPolicy,
    timeout: Duration,
}

impl NotificationDispatcher {
    /// Dispatcher with no collaborators; enabled channels without one fail
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            sinks: HashMap::new(),
            email: None,
            local_retry: config.local_retry,
            email_retry: config.email_retry,
            timeout: config.notify_timeout,
        }
    }

    /// Every channel logged instead of delivered
    pub fn log_only(config: &EngineConfig) -> Self {
        Channel::ALL
            .into_iter()
            .filter(|c| c.is_local())
            .fold(Self::new(config), |d, c| d.with_sink(Arc::new(LogSink::new(c))))
            .with_email(Arc::new(LogEmailTransport))
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.insert(sink.channel(), sink);
        self
    }

    pub fn with_email(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.email = Some(transport);
        self
    }

    /// Deliver `payload` to every channel in `channels`.
    ///
    /// Returns once every channel is terminal or the earlier of `deadline`
    /// and the notification timeout passes. Never fails.
    pub async fn dispatch(
        &self,
        payload: Arc<AlertPayload>,
        channels: &BTreeSet<Channel>,
        email_address: Option<&str>,
        deadline: Instant,
    ) -> Dispatch {
        let started = Instant::now();
        let deadline = deadline.min(started + self.timeout);
        let mut dispatch = Dispatch::default();
        let mut running = Vec::with_capacity(channels.len());

        for &channel in channels {
            match self.spawn_channel(channel, payload.clone(), email_address) {
                Ok((handle, attempts)) => running.push((channel, handle, attempts)),
                Err(e) => {
                    log::warn!("Channel {} unavailable for {}: {}", channel, payload.detection_id, e);
                    dispatch.outcomes.push(NotificationOutcome::failed(channel, 0, &e));
                }
            }
        }

        for (channel, mut handle, attempts) in running {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => dispatch.outcomes.push(outcome),
                Ok(Err(join_error)) => {
                    log::error!("Channel {} task failed: {}", channel, join_error);
                    dispatch.outcomes.push(NotificationOutcome::failed(
                        channel,
                        attempts.load(Ordering::SeqCst),
                        &ChannelError::Transport(format!("channel task failed: {}", join_error)),
                    ));
                }
                Err(_) => {
                    log::warn!(
                        "Channel {} still pending at deadline for {}",
                        channel,
                        payload.detection_id
                    );
                    dispatch.outcomes.push(NotificationOutcome::failed(
                        channel,
                        attempts.load(Ordering::SeqCst),
                        &ChannelError::Timeout(started.elapsed()),
                    ));
                    dispatch
                        .pending
                        .push(PendingOutcome::from_task(handle, LateOutcome::Notification));
                }
            }
        }

        dispatch.outcomes.sort_by_key(|o| o.channel);
        dispatch
    }

    fn spawn_channel(
        &self,
        channel: Channel,
        payload: Arc<AlertPayload>,
        email_address: Option<&str>,
    ) -> Result<(JoinHandle<NotificationOutcome>, Arc<AtomicU32>), ChannelError> {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let handle = if channel == Channel::Email {
            let transport = self
                .email
                .clone()
                .ok_or_else(|| ChannelError::Unavailable("no email transport configured".into()))?;
            let address = email_address
                .map(str::to_string)
                .ok_or_else(|| ChannelError::Unavailable("no email address configured".into()))?;
            let retry = self.email_retry;

            tokio::spawn(async move {
                let result = retry
                    .run("email", &counter, || transport.send(&address, &payload))
                    .await;
                NotificationOutcome::from_result(channel, counter.load(Ordering::SeqCst), result)
            })
        } else {
            let sink = self
                .sinks
                .get(&channel)
                .cloned()
                .ok_or_else(|| ChannelError::Unavailable(format!("no {} sink configured", channel)))?;
            let retry = self.local_retry;

            tokio::spawn(async move {
                let result = retry
                    .run(channel.as_str(), &counter, || sink.send(&payload))
                    .await;
                NotificationOutcome::from_result(channel, counter.load(Ordering::SeqCst), result)
            })
        };

        Ok((handle, attempts))
    }
}
