//! 设备信任密钥：argon2 哈希存储，带过期时间。

use crate::AuthError;
use argon2::{
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::OsRng;
use subtle::ConstantTimeEq;

/// 共享令牌比较（常量时间）。
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustKeyStatus {
    Valid,
    Mismatch,
    Expired,
}

pub struct TrustKeyCheck {
    pub status: TrustKeyStatus,
    /// 历史明文密钥校验通过后生成的哈希，调用方应回写
    pub upgrade_hash: Option<String>,
}

impl TrustKeyCheck {
    pub fn is_valid(&self) -> bool {
        self.status == TrustKeyStatus::Valid
    }
}

pub fn hash_trust_key(trust_key: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(trust_key.as_bytes(), &salt)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    Ok(hash.to_string())
}

/// 校验设备提交的信任密钥。
///
/// `expiration_ms` 为空表示永不过期；到期时间点本身视为已过期。
pub fn verify_trust_key(
    stored: &str,
    presented: &str,
    expiration_ms: Option<i64>,
    now_ms: i64,
) -> Result<TrustKeyCheck, AuthError> {
    if expiration_ms.is_some_and(|expires_at| expires_at <= now_ms) {
        return Ok(TrustKeyCheck {
            status: TrustKeyStatus::Expired,
            upgrade_hash: None,
        });
    }

    if stored.starts_with("$argon2") {
        let parsed =
            PasswordHash::new(stored).map_err(|err| AuthError::Internal(err.to_string()))?;
        let verified = Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok();
        return Ok(TrustKeyCheck {
            status: if verified {
                TrustKeyStatus::Valid
            } else {
                TrustKeyStatus::Mismatch
            },
            upgrade_hash: None,
        });
    }

    let verified: bool = stored.as_bytes().ct_eq(presented.as_bytes()).into();
    if !verified {
        return Ok(TrustKeyCheck {
            status: TrustKeyStatus::Mismatch,
            upgrade_hash: None,
        });
    }
    Ok(TrustKeyCheck {
        status: TrustKeyStatus::Valid,
        upgrade_hash: Some(hash_trust_key(presented)?),
    })
}
