//! Kit AWS Provider
//!
//! EC2 implementation of the gateway API used by the kit controllers.
//!
//! ## Module Structure
//!
//! - `provider` - Ec2Gateway and its API calls
//! - `convert` - Mapping between EC2 SDK types and the core model

pub mod convert;
pub mod provider;

pub use provider::Ec2Gateway;
