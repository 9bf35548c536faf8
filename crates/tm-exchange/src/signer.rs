//! 거래소별 요청 서명.
//!
//! - Binance: 정확한 쿼리 문자열 전체에 대한 HMAC-SHA256, 서명은
//!   마지막 `signature` 파라미터로 부착, 키는 `X-MBX-APIKEY` 헤더.
//! - Bybit: `timestamp + apiKey + recvWindow + 페이로드` 연결 문자열에
//!   대한 HMAC-SHA256, 서명은 `X-BAPI-*` 헤더로 전송.
//!
//! 타임스탬프는 전송 시점에 찍으며 재시도마다 다시 찍고 다시
//! 서명합니다.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use tm_core::{CredentialSet, ExchangeId};

use crate::error::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 서명을 16진수 문자열로 반환.
pub(crate) fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("Invalid key");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// 현재 타임스탬프(밀리초) 반환.
pub(crate) fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

// ==================== Binance ====================

/// Binance 쿼리 문자열 서명기.
pub struct BinanceSigner {
    api_key: String,
    api_secret: String,
    recv_window: u64,
}

impl BinanceSigner {
    /// 자격증명 집합에서 생성. 키/시크릿이 없으면 거부합니다.
    pub fn from_set(set: &CredentialSet, recv_window: u64) -> ExchangeResult<Self> {
        let (key, secret) = set
            .binance()
            .ok_or(ExchangeError::MissingCredential(ExchangeId::Binance))?;
        Ok(Self {
            api_key: key.to_string(),
            api_secret: secret.to_string(),
            recv_window,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// 파라미터에 timestamp/recvWindow를 덧붙이고 전체 쿼리 문자열을
    /// 서명하여 `...&signature=<hex>` 형태로 반환합니다.
    pub fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut all: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        all.push(format!("timestamp={}", timestamp_ms()));
        all.push(format!("recvWindow={}", self.recv_window));

        let query = all.join("&");
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    /// 쿼리 문자열 그대로를 서명.
    pub fn sign(&self, query: &str) -> String {
        hmac_sha256_hex(&self.api_secret, query)
    }
}

// ==================== Bybit ====================

/// Bybit v5 서명기.
pub struct BybitSigner {
    api_key: String,
    api_secret: String,
    recv_window: u64,
}

impl BybitSigner {
    /// 자격증명 집합에서 생성. 키/시크릿이 없으면 거부합니다.
    pub fn from_set(set: &CredentialSet, recv_window: u64) -> ExchangeResult<Self> {
        let (key, secret) = set
            .bybit()
            .ok_or(ExchangeError::MissingCredential(ExchangeId::Bybit))?;
        Ok(Self {
            api_key: key.to_string(),
            api_secret: secret.to_string(),
            recv_window,
        })
    }

    /// `timestamp + apiKey + recvWindow + 페이로드` 서명.
    ///
    /// 페이로드는 POST면 JSON 본문 전체, GET이면 쿼리 문자열입니다.
    pub fn sign(&self, timestamp: &str, payload: &str) -> String {
        let message = format!(
            "{}{}{}{}",
            timestamp, self.api_key, self.recv_window, payload
        );
        hmac_sha256_hex(&self.api_secret, &message)
    }

    /// 지금 시점의 타임스탬프로 인증 헤더 집합을 만듭니다.
    pub fn auth_headers(&self, payload: &str) -> Vec<(&'static str, String)> {
        let timestamp = timestamp_ms().to_string();
        let signature = self.sign(&timestamp, payload);
        vec![
            ("X-BAPI-API-KEY", self.api_key.clone()),
            ("X-BAPI-TIMESTAMP", timestamp),
            ("X-BAPI-RECV-WINDOW", self.recv_window.to_string()),
            ("X-BAPI-SIGN", signature),
            ("X-BAPI-SIGN-TYPE", "2".to_string()),
        ]
    }
}
