//! Network layers: where network jobs come from.
//!
//! A network layer owns its sockets (or whatever it listens on) and turns
//! incoming traffic into [`NetworkJob`]s. The server calls a layer only from
//! its loop thread, one call at a time, in this order:
//!
//! `start` once, `get_jobs` any number of times, `stop` at most once, then
//! `release_resources`.
//!
//! [`ChannelNetworkLayer`] is an in-process layer fed through a
//! [`JobSender`], for embedding applications and tests.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, Span};
use uaserver_scheduler::NetworkJob;

use crate::{NetworkError, ServerContext};

/// A job produced by a network layer.
pub type ServerJob = NetworkJob<ServerContext>;

/// A source of network jobs, polled by the server main loop.
pub trait NetworkLayer: Send {
    /// The URL clients use to reach this layer.
    fn discovery_url(&self) -> &str;

    /// Start listening. `span` is the server's span; log under it.
    fn start(&mut self, span: &Span) -> Result<(), NetworkError>;

    /// Wait up to `timeout` for work and return everything that arrived.
    fn get_jobs(&mut self, timeout: Duration) -> Result<Vec<ServerJob>, NetworkError>;

    /// Stop listening and return the jobs that must still run before the
    /// layer can be released, such as close notifications.
    fn stop(&mut self) -> Result<Vec<ServerJob>, NetworkError>;

    fn release_resources(&mut self);
}

/// Where a layer is in its call sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LayerState {
    Idle,
    Started,
    Stopped,
    Released,
}

/// A registered layer plus the call-order bookkeeping the server enforces.
pub(crate) struct LayerSlot {
    layer: Box<dyn NetworkLayer>,
    state: LayerState,
}

impl LayerSlot {
    pub(crate) fn new(layer: Box<dyn NetworkLayer>) -> Self {
        Self {
            layer,
            state: LayerState::Idle,
        }
    }

    pub(crate) fn url(&self) -> &str {
        self.layer.discovery_url()
    }

    pub(crate) fn state(&self) -> LayerState {
        self.state
    }

    /// Start an idle layer. A layer that was stopped is never started again.
    pub(crate) fn start(&mut self, span: &Span) -> Result<(), NetworkError> {
        match self.state {
            LayerState::Idle => {}
            LayerState::Started => return Ok(()),
            LayerState::Stopped | LayerState::Released => {
                return Err(NetworkError::Start("layer was already stopped".to_string()))
            }
        }
        self.layer.start(span)?;
        self.state = LayerState::Started;
        Ok(())
    }

    pub(crate) fn poll(&mut self, timeout: Duration) -> Result<Vec<ServerJob>, NetworkError> {
        match self.state {
            LayerState::Started => self.layer.get_jobs(timeout),
            _ => Ok(Vec::new()),
        }
    }

    /// Stop a started layer; any other state yields no jobs.
    pub(crate) fn stop(&mut self) -> Result<Vec<ServerJob>, NetworkError> {
        if self.state != LayerState::Started {
            return Ok(Vec::new());
        }
        self.state = LayerState::Stopped;
        self.layer.stop()
    }

    /// Release a stopped layer. Nothing else is called on it afterwards.
    pub(crate) fn release(&mut self) {
        if self.state == LayerState::Stopped {
            self.layer.release_resources();
            self.state = LayerState::Released;
        }
    }
}

/// Feeds jobs into a [`ChannelNetworkLayer`] from any thread.
#[derive(Clone)]
pub struct JobSender {
    sender: Sender<ServerJob>,
}

impl JobSender {
    /// Queue a job. Fails with `Closed` once the layer has stopped.
    pub fn send<F>(&self, work: F) -> Result<(), NetworkError>
    where
        F: FnOnce(&ServerContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.sender
            .send(NetworkJob::new(work))
            .map_err(|_| NetworkError::Closed)
    }
}

/// An in-process network layer backed by a channel.
pub struct ChannelNetworkLayer {
    url: String,
    receiver: Option<Receiver<ServerJob>>,
    /// Keeps the channel open until the layer stops.
    keepalive: Option<Sender<ServerJob>>,
}

impl ChannelNetworkLayer {
    pub fn new(url: impl Into<String>) -> (Self, JobSender) {
        let (sender, receiver) = unbounded();
        let layer = Self {
            url: url.into(),
            receiver: Some(receiver),
            keepalive: Some(sender.clone()),
        };
        (layer, JobSender { sender })
    }
}

impl NetworkLayer for ChannelNetworkLayer {
    fn discovery_url(&self) -> &str {
        &self.url
    }

    fn start(&mut self, span: &Span) -> Result<(), NetworkError> {
        if self.receiver.is_none() {
            return Err(NetworkError::Start(format!("{} was released", self.url)));
        }
        span.in_scope(|| debug!(url = %self.url, "channel layer started"));
        Ok(())
    }

    fn get_jobs(&mut self, timeout: Duration) -> Result<Vec<ServerJob>, NetworkError> {
        let receiver = self.receiver.as_ref().ok_or(NetworkError::Closed)?;
        let first = match receiver.recv_timeout(timeout) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(NetworkError::Poll("channel disconnected".to_string()))
            }
        };
        let mut jobs = vec![first];
        jobs.extend(receiver.try_iter());
        Ok(jobs)
    }

    fn stop(&mut self) -> Result<Vec<ServerJob>, NetworkError> {
        self.keepalive.take();
        let receiver = self.receiver.take().ok_or(NetworkError::Closed)?;
        // Jobs queued before the stop still run; later sends fail.
        let jobs: Vec<ServerJob> = receiver.try_iter().collect();
        debug!(url = %self.url, drained = jobs.len(), "channel layer stopped");
        Ok(jobs)
    }

    fn release_resources(&mut self) {
        self.receiver = None;
        self.keepalive = None;
    }
}
