//! 금고 에러 타입.

use thiserror::Error;
use tm_core::CryptoError;

/// 자격증명 금고 관련 에러.
#[derive(Debug, Error, Clone)]
pub enum VaultError {
    /// 잘못된 패스프레이즈 또는 변조된 블롭. 세션 캐시는 이미 비워짐
    #[error("Incorrect passphrase or data corrupted")]
    Authentication,

    /// 프롬프트를 수신할 UI 표면이 없어 대기 중인 모든 호출자 거부
    #[error("No UI surface available to request passphrase")]
    NoPromptSurface,

    /// 사용자가 패스프레이즈 입력을 취소함
    #[error("Passphrase entry canceled")]
    PromptCanceled,

    /// 저장소 읽기/쓰기 실패
    #[error("Storage error: {0}")]
    Storage(String),

    /// 암호화 계층 에러
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    /// 내부 에러 (해소 전에 resolver가 drop되는 등)
    #[error("Internal vault error: {0}")]
    Internal(String),
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => VaultError::Authentication,
            other => VaultError::Crypto(other),
        }
    }
}

/// 금고 작업을 위한 Result 타입.
pub type VaultResult<T> = Result<T, VaultError>;
