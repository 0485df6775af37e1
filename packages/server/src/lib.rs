//! uaserver: a server runtime around an address space.
//!
//! A [`Server`] owns the [`AddressSpace`](uaserver_address_space::AddressSpace),
//! a repeated-job [`Scheduler`](uaserver_scheduler::Scheduler) and any number
//! of [`NetworkLayer`]s. Its main loop polls the layers for jobs, fires the
//! repeated jobs that are due, and dispatches both, either on the loop thread
//! or on a worker pool.
//!
//! # Example
//!
//! ```rust
//! use uaserver::{ChannelNetworkLayer, Server, ServerConfig};
//! use uaserver_address_space::{ids, NodeId, QualifiedName};
//!
//! let mut server = Server::new(ServerConfig::default()).unwrap();
//! let (layer, sender) = ChannelNetworkLayer::new("opc.tcp://localhost:4840");
//! server.add_network_layer(layer).unwrap();
//!
//! server.run_startup().unwrap();
//! sender
//!     .send(|ctx| {
//!         ctx.address_space.add_variable(
//!             NodeId::numeric(1, 7),
//!             ids::ns0(ids::OBJECTS_FOLDER),
//!             QualifiedName::new(1, "Seven"),
//!             7i32,
//!         )?;
//!         Ok(())
//!     })
//!     .unwrap();
//! server.run_iterate().unwrap();
//! server.run_shutdown().unwrap();
//!
//! assert!(server.address_space().contains(&NodeId::numeric(1, 7)).unwrap());
//! ```

mod config;
mod error;
mod network;
mod server;

pub use config::{LoginConfig, SchedulerSettings, ServerConfig, UserCredentials};
pub use error::{ConfigError, NetworkError, ServerError};
pub use network::{ChannelNetworkLayer, JobSender, NetworkLayer, ServerJob};
pub use server::{LifecycleState, Server, ServerContext};
