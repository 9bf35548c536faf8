//! 거래소 에러 타입.

use thiserror::Error;
use tm_core::ExchangeId;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/전송 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 대상 거래소의 키/시크릿 미설정. 서명기가 요청 생성을 거부
    #[error("Missing API credentials for {0}")]
    MissingCredential(ExchangeId),

    /// 거래소가 0이 아닌 코드로 거절. 메시지는 그대로 전달
    #[error("Venue rejected ({code}): {message}")]
    Venue { code: i64, message: String },

    /// 응답 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 해당 상품 구분에서 지원되지 않는 작업
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 거래소가 전달한 원시 메시지 (사용자 표시용).
    pub fn venue_message(&self) -> String {
        match self {
            ExchangeError::Venue { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
