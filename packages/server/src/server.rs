//! The server runtime: owns the address space, the scheduler and the
//! network layers, and drives the main loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, info_span, instrument, warn, Span};
use uaserver_address_space::AddressSpace;
use uaserver_scheduler::{Clock, Dispatcher, Job, JobId, Scheduler, SystemClock};

use crate::network::{LayerSlot, LayerState, NetworkLayer};
use crate::{ServerConfig, ServerError};

/// Lifecycle of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// State shared with every job.
pub struct ServerContext {
    pub config: ServerConfig,
    pub address_space: AddressSpace,
    pub scheduler: Scheduler<ServerContext>,
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("application_uri", &self.config.application_uri)
            .finish_non_exhaustive()
    }
}

/// A server instance.
///
/// [`run`](Server::run) is the whole lifecycle. Embedding applications that
/// drive their own event loop call [`run_startup`](Server::run_startup),
/// then [`run_iterate`](Server::run_iterate) repeatedly, then
/// [`run_shutdown`](Server::run_shutdown).
pub struct Server {
    context: Arc<ServerContext>,
    layers: Vec<LayerSlot>,
    dispatcher: Option<Dispatcher<ServerContext>>,
    state: LifecycleState,
    span: Span,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// A server whose repeated jobs run on `clock`.
    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Result<Self, ServerError> {
        config.validate()?;
        let address_space = AddressSpace::new(&config.application_uri)?;
        for uri in &config.namespaces {
            address_space.add_namespace(uri)?;
        }
        let scheduler = Scheduler::with_clock(config.scheduler_config(), clock);
        let span = info_span!("uaserver", uri = %config.application_uri);
        Ok(Self {
            context: Arc::new(ServerContext {
                config,
                address_space,
                scheduler,
            }),
            layers: Vec::new(),
            dispatcher: None,
            state: LifecycleState::Stopped,
            span,
        })
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.context.address_space
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Discovery URLs of the registered network layers.
    pub fn discovery_urls(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.url().to_string()).collect()
    }

    pub fn add_namespace(&self, uri: &str) -> Result<u16, ServerError> {
        Ok(self.context.address_space.add_namespace(uri)?)
    }

    /// Register a network layer. Only allowed while the server is stopped.
    pub fn add_network_layer(&mut self, layer: impl NetworkLayer + 'static) -> Result<(), ServerError> {
        self.require(LifecycleState::Stopped, "add a network layer")?;
        info!(parent: &self.span, url = layer.discovery_url(), "network layer added");
        self.layers.push(LayerSlot::new(Box::new(layer)));
        Ok(())
    }

    pub fn add_repeated_job<F>(&self, job: F, interval: Duration) -> Result<JobId, ServerError>
    where
        F: Fn(&ServerContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Ok(self.context.scheduler.add_repeated_job(job, interval)?)
    }

    /// Cancel a repeated job; it is removed at the next loop iteration.
    pub fn remove_repeated_job(&self, id: JobId) -> Result<(), ServerError> {
        Ok(self.context.scheduler.remove_repeated_job(id)?)
    }

    fn require(&self, state: LifecycleState, operation: &'static str) -> Result<(), ServerError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ServerError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Start the worker pool and every network layer, in registration order.
    ///
    /// If a layer fails to start, the layers started before it are stopped,
    /// their drain jobs run, they are released, and the server is back in
    /// `Stopped`.
    #[instrument(skip(self), parent = &self.span)]
    pub fn run_startup(&mut self) -> Result<(), ServerError> {
        self.require(LifecycleState::Stopped, "start")?;
        self.state = LifecycleState::Starting;

        let dispatcher = match Dispatcher::new(self.context.config.scheduler.worker_threads) {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                self.state = LifecycleState::Stopped;
                return Err(e.into());
            }
        };
        self.dispatcher = Some(dispatcher);

        for index in 0..self.layers.len() {
            if let Err(error) = self.layers[index].start(&self.span) {
                let url = self.layers[index].url().to_string();
                warn!(%url, %error, "network layer failed to start, unwinding");
                self.stop_layers();
                self.state = LifecycleState::Stopped;
                return Err(ServerError::AdapterStart { url, error });
            }
        }

        self.state = LifecycleState::Running;
        info!(
            layers = self.layers.len(),
            workers = self.context.config.scheduler.worker_threads,
            "server running"
        );
        Ok(())
    }

    /// One main-loop iteration. Returns the number of jobs dispatched.
    ///
    /// Waits at most until the next repeated job is due (capped by the
    /// configured maximum wait) for the first network layer; the others are
    /// polled without waiting. Without network layers the iteration sleeps
    /// for that time instead.
    pub fn run_iterate(&mut self) -> Result<usize, ServerError> {
        self.require(LifecycleState::Running, "iterate")?;
        let scheduler = &self.context.scheduler;
        scheduler.reap()?;
        let timeout = scheduler.next_timeout()?;

        let span = &self.span;
        let mut jobs: Vec<Job<ServerContext>> = Vec::new();
        if self.layers.is_empty() {
            thread::sleep(timeout);
        }
        for (index, slot) in self.layers.iter_mut().enumerate() {
            let wait = if index == 0 { timeout } else { Duration::ZERO };
            match slot.poll(wait) {
                Ok(batch) => jobs.extend(batch.into_iter().map(Job::from)),
                Err(error) => warn!(parent: span, url = slot.url(), %error, "network poll failed"),
            }
        }
        jobs.extend(scheduler.collect_due()?);

        Ok(self.dispatch(jobs))
    }

    /// Stop every network layer, run their drain jobs in one final dispatch,
    /// wait for the workers, and release the layers.
    #[instrument(skip(self), parent = &self.span)]
    pub fn run_shutdown(&mut self) -> Result<(), ServerError> {
        self.require(LifecycleState::Running, "shut down")?;
        self.state = LifecycleState::Stopping;
        self.stop_layers();
        self.state = LifecycleState::Stopped;
        info!("server stopped");
        Ok(())
    }

    /// Run the whole lifecycle until `running` turns false.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), ServerError> {
        self.run_startup()?;
        while running.load(Ordering::Acquire) {
            if let Err(e) = self.run_iterate() {
                warn!(parent: &self.span, error = %e, "iteration failed");
            }
        }
        self.run_shutdown()
    }

    fn dispatch(&self, jobs: Vec<Job<ServerContext>>) -> usize {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.dispatch(&self.context, jobs),
            None => Dispatcher::Inline.dispatch(&self.context, jobs),
        }
    }

    /// Stop started layers, dispatch their drain jobs, join the workers and
    /// release the layers.
    fn stop_layers(&mut self) {
        let span = &self.span;
        let mut drain = Vec::new();
        for slot in self.layers.iter_mut().filter(|s| s.state() == LayerState::Started) {
            match slot.stop() {
                Ok(jobs) => drain.extend(jobs.into_iter().map(Job::from)),
                Err(error) => warn!(parent: span, url = slot.url(), %error, "network layer failed to stop"),
            }
        }
        let drained = self.dispatch(drain);
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
        }
        for slot in &mut self.layers {
            slot.release();
        }
        info!(parent: &self.span, drained, "network layers stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.state == LifecycleState::Running {
            if let Err(e) = self.run_shutdown() {
                warn!(parent: &self.span, error = %e, "shutdown on drop failed");
            }
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .field("layers", &self.discovery_urls())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
