//! 设备身份绑定判定。
//!
//! 判定规则（按 client_id 已有的连接选项）：
//! 1. 无连接记录：允许，连接在登记时以 OPEN 模式创建
//! 2. 设备提交信任密钥且选项持有密钥：必须校验通过且未过期
//! 3. 无预留用户：允许；STRICT / SAME_USER 将当前用户记为预留
//! 4. 预留用户与当前用户一致：允许
//! 5. 不一致：OPEN 允许；STRICT 拒绝；SAME_USER 且 `allow_user_change`
//!    时换绑并消费该开关，否则拒绝
//!
//! 判定读取存储中的当前选项，不使用缓存快照。
//! 预留写入被存储层唯一约束拒绝时判为 `UserReservedElsewhere`。
//! 业务拒绝以值返回，存储故障以错误返回，由调用方拒绝连接。

use domain::{CouplingMode, ScopeContext};
use kapua_auth::{AuthError, verify_trust_key};
use kapua_registry::{DeviceConnectionOptionService, DeviceConnectionService, RegistryError};
use kapua_storage::{DeviceConnectionOption, now_epoch_ms};
use kapua_telemetry::record_optimistic_lock_retry;
use std::fmt;
use tracing::{debug, warn};

/// 拒绝原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// 请求的协议没有对应描述符
    ProtocolMismatch,
    /// 当前用户与预留用户不一致
    UserMismatch,
    TrustKeyInvalid,
    /// 当前用户已被同作用域其它连接预留
    UserReservedElsewhere,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::ProtocolMismatch => "PROTOCOL_MISMATCH",
            DenyReason::UserMismatch => "USER_MISMATCH",
            DenyReason::TrustKeyInvalid => "TRUST_KEY_INVALID",
            DenyReason::UserReservedElsewhere => "USER_RESERVED_ELSEWHERE",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 允许时对预留用户的变更。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationChange {
    /// client_id 首次出现
    NewConnection,
    Unchanged,
    Reserved { user_id: String },
    Moved { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindDecision {
    Allow { reservation: ReservationChange },
    Deny(DenyReason),
}

impl BindDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BindDecision::Allow { .. })
    }

    fn allow(reservation: ReservationChange) -> Self {
        BindDecision::Allow { reservation }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ResolverError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ResolverError::Registry(err) if err.is_conflict())
    }
}

/// 连接身份判定器（以 Broker 特权上下文访问注册表）。
#[derive(Clone)]
pub struct ConnectionIdentityResolver {
    connections: DeviceConnectionService,
    options: DeviceConnectionOptionService,
    ctx: ScopeContext,
    max_retries: u32,
}

impl ConnectionIdentityResolver {
    pub fn new(
        connections: DeviceConnectionService,
        options: DeviceConnectionOptionService,
        ctx: ScopeContext,
        max_retries: u32,
    ) -> Self {
        Self {
            connections,
            options,
            ctx,
            max_retries,
        }
    }

    pub async fn authorize_bind(
        &self,
        scope_id: &str,
        client_id: &str,
        candidate_user_id: &str,
        trust_key: Option<&str>,
    ) -> Result<BindDecision, ResolverError> {
        let mut attempt = 0;
        loop {
            match self
                .try_bind(scope_id, client_id, candidate_user_id, trust_key)
                .await
            {
                Ok(decision) => {
                    if let BindDecision::Deny(reason) = &decision {
                        warn!(
                            target: "kapua.broker",
                            scope_id = %scope_id,
                            client_id = %client_id,
                            user_id = %candidate_user_id,
                            reason = %reason,
                            "bind_denied"
                        );
                    }
                    return Ok(decision);
                }
                Err(err) if err.is_conflict() && attempt < self.max_retries => {
                    attempt += 1;
                    record_optimistic_lock_retry();
                    debug!(
                        target: "kapua.broker",
                        scope_id = %scope_id,
                        client_id = %client_id,
                        attempt,
                        "bind_retry_after_conflict"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_bind(
        &self,
        scope_id: &str,
        client_id: &str,
        candidate_user_id: &str,
        trust_key: Option<&str>,
    ) -> Result<BindDecision, ResolverError> {
        let Some(snapshot) = self
            .connections
            .load_by_client_id(&self.ctx, scope_id, client_id)
            .await?
        else {
            return Ok(BindDecision::allow(ReservationChange::NewConnection));
        };
        let mut option = snapshot.option;

        // 历史明文密钥校验通过后随本次写入升级为哈希
        let mut key_upgraded = false;
        if let (Some(presented), Some(stored)) = (trust_key, option.trust_key.as_deref()) {
            let check = verify_trust_key(
                stored,
                presented,
                option.trust_expiration_ms,
                now_epoch_ms(),
            )?;
            if !check.is_valid() {
                debug!(
                    target: "kapua.broker",
                    scope_id = %scope_id,
                    client_id = %client_id,
                    status = ?check.status,
                    "trust_key_rejected"
                );
                return Ok(BindDecision::Deny(DenyReason::TrustKeyInvalid));
            }
            if let Some(hash) = check.upgrade_hash {
                option.trust_key = Some(hash);
                key_upgraded = true;
            }
        }

        let decision = match option.reserved_user_id.clone() {
            None if option.user_coupling_mode.pins_first_user() => {
                option.reserved_user_id = Some(candidate_user_id.to_string());
                BindDecision::allow(ReservationChange::Reserved {
                    user_id: candidate_user_id.to_string(),
                })
            }
            None => BindDecision::allow(ReservationChange::Unchanged),
            Some(reserved) if reserved == candidate_user_id => {
                BindDecision::allow(ReservationChange::Unchanged)
            }
            Some(reserved) => match option.user_coupling_mode {
                CouplingMode::Open => BindDecision::allow(ReservationChange::Unchanged),
                CouplingMode::SameUser if option.allow_user_change => {
                    option.reserved_user_id = Some(candidate_user_id.to_string());
                    option.allow_user_change = false;
                    BindDecision::allow(ReservationChange::Moved {
                        from: reserved,
                        to: candidate_user_id.to_string(),
                    })
                }
                CouplingMode::Strict | CouplingMode::SameUser => {
                    BindDecision::Deny(DenyReason::UserMismatch)
                }
            },
        };

        let writes_reservation = matches!(
            &decision,
            BindDecision::Allow {
                reservation: ReservationChange::Reserved { .. } | ReservationChange::Moved { .. }
            }
        );
        if writes_reservation {
            return self.persist(option, decision).await;
        }
        if key_upgraded && decision.is_allowed() {
            self.upgrade_trust_key(option).await;
        }
        Ok(decision)
    }

    async fn persist(
        &self,
        option: DeviceConnectionOption,
        decision: BindDecision,
    ) -> Result<BindDecision, ResolverError> {
        match self.options.update(&self.ctx, option).await {
            Ok(_) => Ok(decision),
            Err(err) if err.is_user_already_reserved() => {
                Ok(BindDecision::Deny(DenyReason::UserReservedElsewhere))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn upgrade_trust_key(&self, option: DeviceConnectionOption) {
        let scope_id = option.scope_id.clone();
        let id = option.id.clone();
        if let Err(err) = self.options.update(&self.ctx, option).await {
            warn!(
                target: "kapua.broker",
                scope_id = %scope_id,
                connection_id = %id,
                error = %err,
                "trust_key_upgrade_failed"
            );
        }
    }
}
