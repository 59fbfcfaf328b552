//! EC2 gateway API
//!
//! Talks to the EC2 NAT gateway endpoints. The client is cheap to clone and
//! safe to share, so one `Ec2Gateway` serves every owner in the process.

use std::time::Duration;

use aws_config::Region;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use kit_core::provider::{BoxFuture, CreateRequest, GatewayApi, ProviderError, ProviderResult};
use kit_core::resource::{GatewayState, NatGateway, TagFilter};
use log::debug;

use crate::convert::{gateway_from_sdk, is_not_found, tag_filters, tag_specification};

/// Default interval between state polls while waiting for a gateway
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// NAT gateways in EC2
#[derive(Clone)]
pub struct Ec2Gateway {
    client: Ec2Client,
    poll_interval: Duration,
}

impl Ec2Gateway {
    /// Create a new Ec2Gateway for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::with_client(Ec2Client::new(&config))
    }

    /// Create with a specific client (for testing)
    pub fn with_client(client: Ec2Client) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Describe every NAT gateway matching the tag filter, following pagination
    async fn describe_nat_gateways(&self, filter: &TagFilter) -> ProviderResult<Vec<NatGateway>> {
        let mut gateways = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .describe_nat_gateways()
                .set_filter(Some(tag_filters(filter)));
            if let Some(token) = next_token.take() {
                request = request.next_token(token);
            }

            let output = request.send().await.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to describe nat-gateways: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

            gateways.extend(output.nat_gateways().iter().filter_map(gateway_from_sdk));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(gateways)
    }

    /// Describe a single NAT gateway by ID
    ///
    /// Returns None when EC2 answers with a not-found error for the ID.
    async fn describe_nat_gateway(&self, gateway_id: &str) -> ProviderResult<Option<NatGateway>> {
        let result = self
            .client
            .describe_nat_gateways()
            .nat_gateway_ids(gateway_id)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.nat_gateways().iter().find_map(gateway_from_sdk)),
            Err(e) if is_not_found(e.as_service_error().and_then(|se| se.code())) => Ok(None),
            Err(e) => Err(ProviderError::new(format!(
                "Failed to describe nat-gateway: {}",
                DisplayErrorContext(&e)
            ))
            .for_gateway(gateway_id)),
        }
    }

    async fn create_nat_gateway(&self, request: CreateRequest) -> ProviderResult<NatGateway> {
        let output = self
            .client
            .create_nat_gateway()
            .allocation_id(&request.allocation_id)
            .subnet_id(&request.subnet_id)
            .tag_specifications(tag_specification(&request.tags))
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to create nat-gateway: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        output
            .nat_gateway()
            .and_then(gateway_from_sdk)
            .ok_or_else(|| ProviderError::new("nat-gateway created but no ID returned"))
    }

    /// Poll until the gateway is available
    ///
    /// A gateway that is not visible yet (empty result or a not-found error)
    /// is polled again: right after a create, describe can lag behind.
    async fn wait_nat_gateway_available(&self, gateway_id: String) -> ProviderResult<()> {
        loop {
            match self.describe_nat_gateway(&gateway_id).await? {
                Some(gateway) if gateway.state == GatewayState::Available => return Ok(()),
                Some(gateway) if !gateway.is_active() => {
                    return Err(ProviderError::new(format!(
                        "nat-gateway entered {} state while waiting",
                        gateway.state
                    ))
                    .for_gateway(gateway_id));
                }
                Some(gateway) => {
                    debug!("nat-gateway {} is {}", gateway_id, gateway.state);
                }
                None => debug!("nat-gateway {} not visible yet", gateway_id),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn delete_nat_gateway(&self, gateway_id: String) -> ProviderResult<()> {
        self.client
            .delete_nat_gateway()
            .nat_gateway_id(&gateway_id)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to delete nat-gateway: {}",
                    DisplayErrorContext(&e)
                ))
                .for_gateway(&gateway_id)
            })?;

        Ok(())
    }
}

impl GatewayApi for Ec2Gateway {
    fn name(&self) -> &'static str {
        "ec2"
    }

    fn describe(&self, filter: &TagFilter) -> BoxFuture<'_, ProviderResult<Vec<NatGateway>>> {
        let filter = filter.clone();
        Box::pin(async move { self.describe_nat_gateways(&filter).await })
    }

    fn create(&self, request: &CreateRequest) -> BoxFuture<'_, ProviderResult<NatGateway>> {
        let request = request.clone();
        Box::pin(async move { self.create_nat_gateway(request).await })
    }

    fn wait_until_available(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let gateway_id = gateway_id.to_string();
        Box::pin(async move { self.wait_nat_gateway_available(gateway_id).await })
    }

    fn delete(&self, gateway_id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let gateway_id = gateway_id.to_string();
        Box::pin(async move { self.delete_nat_gateway(gateway_id).await })
    }
}

