//! Kit Core
//!
//! Convergence controllers that drive a remote resource toward the state
//! recorded on a control-plane owner, and tear it down on deletion. The
//! remote provider is the only source of truth; nothing is cached locally.

pub mod config;
pub mod context;
pub mod controller;
pub mod dependency;
pub mod error;
pub mod locator;
pub mod owner;
pub mod provider;
pub mod providers;
pub mod resource;
pub mod scheduler;

pub use config::ControllerConfig;
pub use context::ReconcileContext;
pub use controller::{Controller, NatGatewayController, Outcome, ReconcileResult};
pub use error::ReconcileError;
pub use owner::ControlPlane;
pub use provider::{GatewayApi, ProviderError, ProviderResult};
pub use resource::{GatewayState, NatGateway};
