//! Controller - Convergence and teardown of the NAT gateway
//!
//! Each pass starts from remote truth: the gateway is discovered by its tags,
//! created if absent, and its identifier is written back to the owner's
//! status. Teardown is the mirror image. Nothing survives between passes
//! except what the provider and the owner status hold.

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::context::ReconcileContext;
use crate::dependency;
use crate::error::{Operation, ReconcileError};
use crate::locator;
use crate::owner::ControlPlane;
use crate::provider::{BoxFuture, CreateRequest, GatewayApi};
use crate::resource::{GatewayState, NatGateway, TagFilter, correlation_tags};

/// Success/failure signal handed back to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// What the scheduler should do after a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    pub outcome: Outcome,
    /// Re-invoke after this long; `None` means no requeue is needed
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    pub fn succeeded(requeue_after: Option<Duration>) -> Self {
        Self {
            outcome: Outcome::Succeeded,
            requeue_after,
        }
    }

    pub fn failed(requeue_after: Duration) -> Self {
        Self {
            outcome: Outcome::Failed,
            requeue_after: Some(requeue_after),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}

/// Scheduler-facing controller interface
pub trait Controller: Send + Sync {
    /// Name of this controller (e.g., "natgateway")
    fn name(&self) -> &str;

    /// Drive remote state toward the owner's desired state
    fn reconcile<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        owner: &'a mut ControlPlane,
    ) -> BoxFuture<'a, Result<ReconcileResult, ReconcileError>>;

    /// Remove what reconcile created; runs when the owner is being deleted
    fn finalize<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        owner: &'a mut ControlPlane,
    ) -> BoxFuture<'a, Result<ReconcileResult, ReconcileError>>;

    /// Map a failed pass to a retry decision
    fn error_policy(&self, error: &ReconcileError) -> ReconcileResult;
}

/// Converges one NAT gateway per control plane
pub struct NatGatewayController<P> {
    api: P,
    config: ControllerConfig,
}

impl<P: GatewayApi> NatGatewayController<P> {
    pub fn new(api: P) -> Self {
        Self::with_config(api, ControllerConfig::default())
    }

    pub fn with_config(api: P, config: ControllerConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn filter_for(&self, owner: &str) -> TagFilter {
        TagFilter::new(&self.config.name, owner)
    }

    /// Find the active gateway for `owner`, if any
    pub async fn locate(
        &self,
        ctx: &ReconcileContext,
        owner: &str,
    ) -> Result<Option<NatGateway>, ReconcileError> {
        let filter = self.filter_for(owner);
        ctx.guard(owner, Operation::Describe, locator::locate(&self.api, &filter))
            .await
    }

    /// Ensure exactly one available gateway exists and record its id
    pub async fn converge(
        &self,
        ctx: &ReconcileContext,
        owner: &mut ControlPlane,
    ) -> Result<ReconcileResult, ReconcileError> {
        let gateway = match self.locate(ctx, &owner.name).await? {
            Some(existing) => {
                debug!(
                    "Discovered nat-gateway {} ({}) for {}",
                    existing.id, existing.state, owner.name
                );
                existing
            }
            None => self.create(ctx, owner).await?,
        };

        owner.status.infrastructure.nat_gateway_id = Some(gateway.id);
        Ok(ReconcileResult::succeeded(Some(
            self.config.requeue_after_success,
        )))
    }

    /// Create a gateway for `owner` and block until it is available
    async fn create(
        &self,
        ctx: &ReconcileContext,
        owner: &ControlPlane,
    ) -> Result<NatGateway, ReconcileError> {
        let name = owner.name.as_str();
        let deps = dependency::resolve(name, &owner.status.infrastructure)?;

        let request = CreateRequest {
            allocation_id: deps.allocation_id,
            subnet_id: deps.subnet_id,
            tags: correlation_tags(&self.config.name, name),
        };
        let mut gateway = ctx
            .guard(name, Operation::Create, async {
                self.api
                    .create(&request)
                    .await
                    .map_err(|e| ReconcileError::transport(Operation::Create, name, e))
            })
            .await?;
        info!("Created nat-gateway {} for {}", gateway.id, name);

        // A create that errors here may still have provisioned a gateway. The
        // next pass discovers it, or reports ambiguity if a second one exists.
        info!(
            "Waiting for nat-gateway {} to be available for {}",
            gateway.id, name
        );
        let timeout = self.config.wait_timeout;
        ctx.guard(name, Operation::Wait, async {
            match tokio::time::timeout(timeout, self.api.wait_until_available(&gateway.id)).await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ReconcileError::transport(Operation::Wait, name, e)),
                Err(_) => Err(ReconcileError::CreateTimeout {
                    owner: name.to_string(),
                    gateway_id: gateway.id.clone(),
                    timeout,
                }),
            }
        })
        .await?;

        gateway.state = GatewayState::Available;
        Ok(gateway)
    }

    /// Delete the active gateway for `owner`, if any, and clear its id
    pub async fn teardown(
        &self,
        ctx: &ReconcileContext,
        owner: &mut ControlPlane,
    ) -> Result<ReconcileResult, ReconcileError> {
        let name = owner.name.as_str();
        match self.locate(ctx, name).await? {
            Some(gateway) => {
                ctx.guard(name, Operation::Delete, async {
                    self.api
                        .delete(&gateway.id)
                        .await
                        .map_err(|e| ReconcileError::transport(Operation::Delete, name, e))
                })
                .await?;
                info!("Deleted nat-gateway {} for {}", gateway.id, name);
            }
            None => debug!("No nat-gateway to delete for {}", name),
        }

        owner.status.infrastructure.nat_gateway_id = None;
        Ok(ReconcileResult::succeeded(None))
    }
}

impl<P: GatewayApi> Controller for NatGatewayController<P> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn reconcile<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        owner: &'a mut ControlPlane,
    ) -> BoxFuture<'a, Result<ReconcileResult, ReconcileError>> {
        Box::pin(self.converge(ctx, owner))
    }

    fn finalize<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        owner: &'a mut ControlPlane,
    ) -> BoxFuture<'a, Result<ReconcileResult, ReconcileError>> {
        Box::pin(self.teardown(ctx, owner))
    }

    fn error_policy(&self, error: &ReconcileError) -> ReconcileResult {
        match error {
            ReconcileError::WaitingForDependency { .. } => {
                info!("{}", error);
                ReconcileResult::failed(self.config.requeue_after_waiting)
            }
            ReconcileError::AmbiguousState { .. } => {
                warn!("{}; operator attention required", error);
                ReconcileResult::failed(self.config.requeue_after_failure)
            }
            _ => {
                warn!("{}", error);
                ReconcileResult::failed(self.config.requeue_after_failure)
            }
        }
    }
}
