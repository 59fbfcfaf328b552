//! In-memory gateway API
//!
//! Behaves like an eventually consistent provider that is, for once, fully
//! consistent. Used for dry runs and as the test double for the controllers.
//! Knobs let callers reproduce the anomalies a real provider shows: duplicate
//! gateways after a create, gateways stuck in `pending`, and failing calls.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::provider::{BoxFuture, CreateRequest, GatewayApi, ProviderError, ProviderResult};
use crate::resource::{GatewayState, NatGateway, TagFilter};

/// Call to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Describe,
    /// Fail the create call without provisioning anything
    Create,
    /// Provision the gateway, then report the create call as failed
    CreateAfterProvisioning,
    Wait,
    Delete,
}

/// Per-call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub describe: usize,
    pub create: usize,
    pub wait: usize,
    pub delete: usize,
}

#[derive(Debug, Default)]
struct Inner {
    gateways: Vec<NatGateway>,
    next_id: u64,
    hold_pending: bool,
    duplicate_next_create: bool,
    fail_next: Option<FailOn>,
    calls: CallCounts,
}

impl Inner {
    fn take_failure(&mut self, call: FailOn) -> bool {
        if self.fail_next == Some(call) {
            self.fail_next = None;
            true
        } else {
            false
        }
    }

    fn provision(&mut self, request: &CreateRequest) -> NatGateway {
        self.next_id += 1;
        let gateway = NatGateway::new(format!("nat-{:017x}", self.next_id), GatewayState::Pending)
            .with_allocation_id(&request.allocation_id)
            .with_subnet_id(&request.subnet_id)
            .with_tags(request.tags.clone());
        self.gateways.push(gateway.clone());
        gateway
    }
}

/// Gateway API backed by a process-local list
#[derive(Debug)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
    poll_interval: Duration,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Seed a gateway as if it had been created out of band
    pub async fn insert(&self, gateway: NatGateway) {
        self.inner.lock().await.gateways.push(gateway);
    }

    /// Keep new gateways in `pending` until released
    pub async fn hold_pending(&self, hold: bool) {
        self.inner.lock().await.hold_pending = hold;
    }

    /// Make the next create provision two gateways
    pub async fn duplicate_next_create(&self) {
        self.inner.lock().await.duplicate_next_create = true;
    }

    pub async fn fail_next(&self, call: FailOn) {
        self.inner.lock().await.fail_next = Some(call);
    }

    /// Force a gateway into a lifecycle state
    pub async fn set_state(&self, gateway_id: &str, state: GatewayState) {
        let mut inner = self.inner.lock().await;
        if let Some(gateway) = inner.gateways.iter_mut().find(|g| g.id == gateway_id) {
            gateway.state = state;
        }
    }

    /// Snapshot of every gateway, in any state
    pub async fn gateways(&self) -> Vec<NatGateway> {
        self.inner.lock().await.gateways.clone()
    }

    pub async fn active_gateways(&self) -> Vec<NatGateway> {
        self.gateways()
            .await
            .into_iter()
            .filter(NatGateway::is_active)
            .collect()
    }

    pub async fn calls(&self) -> CallCounts {
        self.inner.lock().await.calls
    }

    async fn describe_gateways(&self, filter: TagFilter) -> ProviderResult<Vec<NatGateway>> {
        let mut inner = self.inner.lock().await;
        inner.calls.describe += 1;
        if inner.take_failure(FailOn::Describe) {
            return Err(ProviderError::new("RequestLimitExceeded"));
        }
        Ok(inner
            .gateways
            .iter()
            .filter(|g| filter.matches(&g.tags))
            .cloned()
            .collect())
    }

    async fn create_gateway(&self, request: CreateRequest) -> ProviderResult<NatGateway> {
        let mut inner = self.inner.lock().await;
        inner.calls.create += 1;
        if inner.take_failure(FailOn::Create) {
            return Err(ProviderError::new("InsufficientAddressCapacity"));
        }

        let gateway = inner.provision(&request);
        if inner.duplicate_next_create {
            inner.duplicate_next_create = false;
            inner.provision(&request);
        }
        if inner.take_failure(FailOn::CreateAfterProvisioning) {
            return Err(ProviderError::new("connection reset by peer"));
        }
        Ok(gateway)
    }

    async fn wait_gateway(&self, gateway_id: String) -> ProviderResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.calls.wait += 1;
            if inner.take_failure(FailOn::Wait) {
                return Err(ProviderError::new("waiter failed").for_gateway(&gateway_id));
            }
        }

        loop {
            {
                let mut inner = self.inner.lock().await;
                let hold = inner.hold_pending;
                let gateway = inner
                    .gateways
                    .iter_mut()
                    .find(|g| g.id == gateway_id)
                    .ok_or_else(|| {
                        ProviderError::new("NatGatewayNotFound").for_gateway(&gateway_id)
                    })?;

                match gateway.state {
                    GatewayState::Available => return Ok(()),
                    GatewayState::Pending if !hold => {
                        gateway.state = GatewayState::Available;
                        return Ok(());
                    }
                    GatewayState::Pending => {}
                    state => {
                        return Err(ProviderError::new(format!(
                            "nat-gateway entered {} state while waiting",
                            state
                        ))
                        .for_gateway(&gateway_id));
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn delete_gateway(&self, gateway_id: String) -> ProviderResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.delete += 1;
        if inner.take_failure(FailOn::Delete) {
            return Err(ProviderError::new("DependencyViolation").for_gateway(&gateway_id));
        }
        let gateway = inner
            .gateways
            .iter_mut()
            .find(|g| g.id == gateway_id)
            .ok_or_else(|| ProviderError::new("NatGatewayNotFound").for_gateway(&gateway_id))?;
        gateway.state = GatewayState::Deleting;
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayApi for MemoryGateway {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn describe(&self, filter: &TagFilter) -> BoxFuture<'_, ProviderResult<Vec<NatGateway>>> {
        let filter = filter.clone();
        Box::pin(async move { self.describe_gateways(filter).await })
    }

    fn create(&self, request: &CreateRequest) -> BoxFuture<'_, ProviderResult<NatGateway>> {
        let request = request.clone();
        Box::pin(async move { self.create_gateway(request).await })
    }

    fn wait_until_available(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let gateway_id = gateway_id.to_string();
        Box::pin(async move { self.wait_gateway(gateway_id).await })
    }

    fn delete(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let gateway_id = gateway_id.to_string();
        Box::pin(async move { self.delete_gateway(gateway_id).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::correlation_tags;

    fn request(owner: &str) -> CreateRequest {
        CreateRequest {
            allocation_id: "eipalloc-1".to_string(),
            subnet_id: "subnet-1".to_string(),
            tags: correlation_tags("natgateway", owner),
        }
    }

    #[tokio::test]
    async fn create_then_wait_makes_gateway_available() {
        let api = MemoryGateway::new();
        let gateway = api.create(&request("alpha")).await.unwrap();
        assert_eq!(gateway.state, GatewayState::Pending);
        assert_eq!(gateway.allocation_id.as_deref(), Some("eipalloc-1"));

        api.wait_until_available(&gateway.id).await.unwrap();
        assert_eq!(api.gateways().await[0].state, GatewayState::Available);
    }

    #[tokio::test]
    async fn delete_moves_gateway_to_deleting() {
        let api = MemoryGateway::new();
        let gateway = api.create(&request("alpha")).await.unwrap();
        api.delete(&gateway.id).await.unwrap();

        assert_eq!(api.gateways().await[0].state, GatewayState::Deleting);
        assert!(api.active_gateways().await.is_empty());
    }

    #[tokio::test]
    async fn wait_fails_when_gateway_fails() {
        let api = MemoryGateway::new();
        api.hold_pending(true).await;
        let gateway = api.create(&request("alpha")).await.unwrap();
        api.set_state(&gateway.id, GatewayState::Failed).await;

        let err = api.wait_until_available(&gateway.id).await.unwrap_err();
        assert!(err.message.contains("failed"));
    }

    #[tokio::test]
    async fn failures_fire_once() {
        let api = MemoryGateway::new();
        api.fail_next(FailOn::Describe).await;
        let filter = TagFilter::new("natgateway", "alpha");

        assert!(api.describe(&filter).await.is_err());
        assert!(api.describe(&filter).await.is_ok());
        assert_eq!(api.calls().await.describe, 2);
    }

    #[tokio::test]
    async fn duplicate_create_provisions_two() {
        let api = MemoryGateway::new();
        api.duplicate_next_create().await;
        api.create(&request("beta")).await.unwrap();
        assert_eq!(api.active_gateways().await.len(), 2);
    }
}
