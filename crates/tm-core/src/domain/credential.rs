//! 거래소 API 자격증명.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 거래소별 API 키/시크릿 집합.
///
/// 네 필드 모두 선택적입니다. 평문 저장 경로와 암호화 블롭의 JSON
/// 페이로드가 같은 직렬화 형식(camelCase 키)을 공유합니다.
/// 부분 집합은 그대로 사용되며 암호화된 데이터와 병합되지 않습니다.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binance_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binance_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bybit_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bybit_secret: Option<String>,
}

impl CredentialSet {
    /// 네 필드가 모두 채워져 있는지 확인.
    pub fn is_complete(&self) -> bool {
        self.binance_key.is_some()
            && self.binance_secret.is_some()
            && self.bybit_key.is_some()
            && self.bybit_secret.is_some()
    }

    /// 하나라도 채워져 있는지 확인.
    pub fn is_partial(&self) -> bool {
        !self.is_empty()
    }

    /// 모든 필드가 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.binance_key.is_none()
            && self.binance_secret.is_none()
            && self.bybit_key.is_none()
            && self.bybit_secret.is_none()
    }

    /// Binance 키/시크릿 쌍 (둘 다 있을 때만).
    pub fn binance(&self) -> Option<(&str, &str)> {
        match (&self.binance_key, &self.binance_secret) {
            (Some(k), Some(s)) => Some((k.as_str(), s.as_str())),
            _ => None,
        }
    }

    /// Bybit 키/시크릿 쌍 (둘 다 있을 때만).
    pub fn bybit(&self) -> Option<(&str, &str)> {
        match (&self.bybit_key, &self.bybit_secret) {
            (Some(k), Some(s)) => Some((k.as_str(), s.as_str())),
            _ => None,
        }
    }
}

fn mask(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "***SET***"
    } else {
        "<none>"
    }
}

// 민감 정보는 로그에 그대로 남기지 않는다
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("binance_key", &mask(&self.binance_key))
            .field("binance_secret", &mask(&self.binance_secret))
            .field("bybit_key", &mask(&self.bybit_key))
            .field("bybit_secret", &mask(&self.bybit_secret))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness() {
        let mut set = CredentialSet::default();
        assert!(set.is_empty());
        assert!(!set.is_partial());
        assert!(!set.is_complete());

        set.bybit_key = Some("k".to_string());
        assert!(set.is_partial());
        assert!(!set.is_complete());
        assert!(set.bybit().is_none());

        set.binance_key = Some("k".to_string());
        set.binance_secret = Some("s".to_string());
        set.bybit_secret = Some("s".to_string());
        assert!(set.is_complete());
        assert_eq!(set.binance(), Some(("k", "s")));
    }

    #[test]
    fn test_serde_uses_storage_keys() {
        let set = CredentialSet {
            binance_key: Some("a".to_string()),
            ..CredentialSet::default()
        };
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"binanceKey":"a"}"#);
    }

    #[test]
    fn test_debug_masks_secrets() {
        let set = CredentialSet {
            binance_secret: Some("super-secret".to_string()),
            ..CredentialSet::default()
        };
        let debug = format!("{:?}", set);
        assert!(!debug.contains("super-secret"));
    }
}
