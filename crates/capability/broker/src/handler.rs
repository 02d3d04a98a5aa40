//! Broker 连接/断开事件处理。
//!
//! 连接路径上的存储操作受统一超时约束，超时与存储故障一律拒绝连接。

use crate::identity::{BindDecision, ConnectionIdentityResolver, DenyReason};
use crate::{BrokerError, BrokerIpResolver};
use domain::ScopeContext;
use kapua_protocol::{DescriptorProvider, ProtocolDescriptor};
use kapua_registry::{ConnectEvent, DeviceConnectionService};
use kapua_storage::DeviceConnection;
use kapua_telemetry::{
    record_connect_accepted, record_connect_denied, record_connect_failed,
    record_connect_latency_ms,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Broker 连接请求。
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub scope_id: String,
    pub client_id: String,
    pub user_id: String,
    /// 协议名（描述符注册表键）
    pub protocol: Option<String>,
    pub trust_key: Option<String>,
    pub client_ip: Option<String>,
    pub server_ip: Option<String>,
}

/// 连接判定结果，供 Broker 接受或拒绝握手。
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    pub descriptor: Option<Arc<ProtocolDescriptor>>,
    pub authorized: bool,
    pub broker_address: Option<String>,
    pub deny_reason: Option<DenyReason>,
    pub connection: Option<DeviceConnection>,
}

impl ConnectOutcome {
    fn denied(descriptor: Option<Arc<ProtocolDescriptor>>, reason: DenyReason) -> Self {
        Self {
            descriptor,
            authorized: false,
            broker_address: None,
            deny_reason: Some(reason),
            connection: None,
        }
    }
}

pub struct ConnectHandler {
    descriptors: Arc<dyn DescriptorProvider>,
    identity: ConnectionIdentityResolver,
    connections: DeviceConnectionService,
    broker_ip: Arc<dyn BrokerIpResolver>,
    ctx: ScopeContext,
    store_timeout: Duration,
}

impl ConnectHandler {
    pub fn new(
        descriptors: Arc<dyn DescriptorProvider>,
        identity: ConnectionIdentityResolver,
        connections: DeviceConnectionService,
        broker_ip: Arc<dyn BrokerIpResolver>,
        ctx: ScopeContext,
        store_timeout: Duration,
    ) -> Self {
        Self {
            descriptors,
            identity,
            connections,
            broker_ip,
            ctx,
            store_timeout,
        }
    }

    pub async fn on_connect(&self, request: &ConnectRequest) -> Result<ConnectOutcome, BrokerError> {
        let started_at = Instant::now();
        let result = self.handle_connect(request).await;
        match &result {
            Ok(outcome) if outcome.authorized => record_connect_accepted(),
            Ok(_) => record_connect_denied(),
            Err(err) => {
                record_connect_failed();
                warn!(
                    target: "kapua.broker",
                    scope_id = %request.scope_id,
                    client_id = %request.client_id,
                    error = %err,
                    "connect_rejected_on_error"
                );
            }
        }
        record_connect_latency_ms(started_at.elapsed().as_millis() as u64);
        result
    }

    pub async fn on_disconnect(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<DeviceConnection>, BrokerError> {
        self.with_deadline(
            "record_disconnect",
            self.connections
                .record_disconnect(&self.ctx, scope_id, client_id),
        )
        .await
    }

    async fn handle_connect(&self, request: &ConnectRequest) -> Result<ConnectOutcome, BrokerError> {
        let descriptor = self
            .descriptors
            .get_descriptor(request.protocol.as_deref())?;
        let Some(descriptor) = descriptor else {
            warn!(
                target: "kapua.broker",
                scope_id = %request.scope_id,
                client_id = %request.client_id,
                protocol = ?request.protocol,
                reason = %DenyReason::ProtocolMismatch,
                "bind_denied"
            );
            return Ok(ConnectOutcome::denied(None, DenyReason::ProtocolMismatch));
        };
        let broker_address = self.broker_ip.broker_ip_or_host_name()?;

        let decision = self
            .with_deadline(
                "authorize_bind",
                self.identity.authorize_bind(
                    &request.scope_id,
                    &request.client_id,
                    &request.user_id,
                    request.trust_key.as_deref(),
                ),
            )
            .await?;
        let reservation = match decision {
            BindDecision::Deny(reason) => {
                return Ok(ConnectOutcome::denied(Some(descriptor), reason));
            }
            BindDecision::Allow { reservation } => reservation,
        };

        let event = ConnectEvent {
            scope_id: request.scope_id.clone(),
            client_id: request.client_id.clone(),
            user_id: request.user_id.clone(),
            protocol: Some(descriptor.transport_protocol().to_string()),
            client_ip: request.client_ip.clone(),
            server_ip: request.server_ip.clone(),
        };
        let connection = self
            .with_deadline(
                "record_connect",
                self.connections.record_connect(&self.ctx, &event),
            )
            .await?;
        info!(
            target: "kapua.broker",
            scope_id = %connection.scope_id,
            client_id = %connection.client_id,
            connection_id = %connection.id,
            transport = %descriptor.transport_protocol(),
            reservation = ?reservation,
            broker_address = %broker_address,
            "connect_accepted"
        );
        Ok(ConnectOutcome {
            descriptor: Some(descriptor),
            authorized: true,
            broker_address: Some(broker_address),
            deny_reason: None,
            connection: Some(connection),
        })
    }

    async fn with_deadline<T, E, F>(&self, operation: &'static str, work: F) -> Result<T, BrokerError>
    where
        F: Future<Output = Result<T, E>>,
        BrokerError: From<E>,
    {
        match tokio::time::timeout(self.store_timeout, work).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BrokerError::Unavailable {
                operation,
                timeout_ms: self.store_timeout.as_millis() as u64,
            }),
        }
    }
}
