//! Provider - Trait abstracting the remote gateway API
//!
//! A `GatewayApi` exposes the four calls a controller needs against the
//! remote provider: tag-filtered describe, tagged create, wait-until-available
//! and delete. Implementations must be safe to share between owners that
//! reconcile concurrently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::resource::{NatGateway, TagFilter, Tags};

/// Error type for gateway API calls
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub gateway_id: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.gateway_id {
            write!(f, "[{}] {}", id, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            gateway_id: None,
            cause: None,
        }
    }

    pub fn for_gateway(mut self, id: impl Into<String>) -> Self {
        self.gateway_id = Some(id.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Parameters of a create call
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    /// Elastic IP allocation to bind
    pub allocation_id: String,
    /// Subnet to place the gateway in
    pub subnet_id: String,
    pub tags: Tags,
}

/// Remote gateway API
pub trait GatewayApi: Send + Sync {
    /// Name of this backend (e.g., "ec2")
    fn name(&self) -> &'static str;

    /// List every gateway whose tags match the filter, in any lifecycle state
    fn describe(&self, filter: &TagFilter) -> BoxFuture<'_, ProviderResult<Vec<NatGateway>>>;

    /// Issue a create call. The returned gateway is usually still pending.
    fn create(&self, request: &CreateRequest) -> BoxFuture<'_, ProviderResult<NatGateway>>;

    /// Resolve once the gateway reports `available`
    ///
    /// Implementations may poll for as long as it takes; callers bound the
    /// wait themselves. An error is returned if the gateway lands in an
    /// inactive state instead.
    fn wait_until_available(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Issue a delete call without waiting for the gateway to disappear
    fn delete(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>>;
}

/// GatewayApi implementation for Box<dyn GatewayApi>
impl GatewayApi for Box<dyn GatewayApi> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn describe(&self, filter: &TagFilter) -> BoxFuture<'_, ProviderResult<Vec<NatGateway>>> {
        (**self).describe(filter)
    }

    fn create(&self, request: &CreateRequest) -> BoxFuture<'_, ProviderResult<NatGateway>> {
        (**self).create(request)
    }

    fn wait_until_available(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).wait_until_available(gateway_id)
    }

    fn delete(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(gateway_id)
    }
}

/// Shared clients: one API handle serves every controller in the process
impl<T: GatewayApi + ?Sized> GatewayApi for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn describe(&self, filter: &TagFilter) -> BoxFuture<'_, ProviderResult<Vec<NatGateway>>> {
        (**self).describe(filter)
    }

    fn create(&self, request: &CreateRequest) -> BoxFuture<'_, ProviderResult<NatGateway>> {
        (**self).create(request)
    }

    fn wait_until_available(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).wait_until_available(gateway_id)
    }

    fn delete(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(gateway_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_includes_gateway_id() {
        let err = ProviderError::new("throttled").for_gateway("nat-123");
        assert_eq!(err.to_string(), "[nat-123] throttled");

        let err = ProviderError::new("throttled");
        assert_eq!(err.to_string(), "throttled");
    }

    #[test]
    fn cause_is_exposed_as_source() {
        let io = std::io::Error::other("connection reset");
        let err = ProviderError::new("describe failed").with_cause(io);
        assert_eq!(err.source().unwrap().to_string(), "connection reset");
    }
}
