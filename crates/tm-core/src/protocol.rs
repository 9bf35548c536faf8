//! UI 협력자와의 메시지 프로토콜.
//!
//! 패널/콘텐츠 스크립트 등 UI 표면은 이 프로토콜만으로 코어와
//! 통신합니다. 필드 이름이 곧 계약이므로 camelCase 표기를 그대로
//! 유지합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{ExchangeId, InstrumentKind, Side};

/// UI → 코어 메시지.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// 활성 시장 컨텍스트 교체 + 가격 스트림 (재)시작
    Subscribe {
        symbol: String,
        exchange: ExchangeId,
        /// 생략 시 linear로 간주
        kind: Option<InstrumentKind>,
    },
    /// 잔고 조회 요청 (응답은 balanceUpdate 브로드캐스트)
    GetBalance { exchange: ExchangeId },
    /// 시장가 주문 + 선택적 손절/익절
    PlaceOrder {
        side: Side,
        size: Decimal,
        symbol: String,
        exchange: ExchangeId,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    },
    /// 패스프레이즈 프롬프트에 대한 응답 (없거나 빈 값 = 취소)
    PassphraseResponse { passphrase: Option<String> },
}

impl InboundMessage {
    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// 코어 → UI 브로드캐스트 이벤트.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    /// 스트리밍 가격 틱
    PriceUpdate { price: Decimal },
    /// 잔고 조회 결과
    BalanceUpdate { balance: Decimal },
    /// 주문 결과 (성공 여부 + 사람이 읽을 수 있는 상세)
    OrderResult { success: bool, info: String },
    /// 패스프레이즈 입력 요청
    RequestPassphrase,
    /// 복호화 실패 알림 (치명적이지 않음, 재시도 가능)
    PassphraseError { message: String },
}

impl OutboundEvent {
    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// UI 표면으로의 발행 인터페이스.
///
/// 코어는 이벤트를 `broadcast`로 내보낼 뿐, 열린 탭/패널로의 실제
/// 팬아웃은 외부 협력자의 책임입니다.
#[async_trait]
pub trait UiChannel: Send + Sync {
    /// 모든 UI 표면에 이벤트를 전달 (fire-and-forget).
    async fn broadcast(&self, event: OutboundEvent);

    /// 패스프레이즈 프롬프트를 전달하고, 하나 이상의 표면이 수신을
    /// 확인했는지 반환합니다. 호출자가 대기 시간을 제한합니다.
    async fn request_passphrase(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_inbound_field_names_are_contract() {
        let msg = InboundMessage::from_json(
            r#"{"type":"placeOrder","side":"BUY","size":0.5,"symbol":"BTCUSDT",
                "exchange":"bybit","stopLoss":64000,"takeProfit":72000}"#,
        )
        .unwrap();

        match msg {
            InboundMessage::PlaceOrder {
                side,
                size,
                stop_loss,
                take_profit,
                ..
            } => {
                assert_eq!(side, Side::Buy);
                assert_eq!(size, dec!(0.5));
                assert_eq!(stop_loss, Some(dec!(64000)));
                assert_eq!(take_profit, Some(dec!(72000)));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_kind_optional() {
        let msg = InboundMessage::from_json(
            r#"{"type":"subscribe","symbol":"ETHUSDT","exchange":"binance"}"#,
        )
        .unwrap();

        match msg {
            InboundMessage::Subscribe { symbol, kind, .. } => {
                assert_eq!(symbol, "ETHUSDT");
                assert!(kind.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_outbound_tags() {
        let json = OutboundEvent::OrderResult {
            success: false,
            info: "missing config".to_string(),
        }
        .to_json()
        .unwrap();
        assert!(json.contains(r#""type":"orderResult""#));
        assert!(json.contains(r#""success":false"#));

        let json = OutboundEvent::RequestPassphrase.to_json().unwrap();
        assert_eq!(json, r#"{"type":"requestPassphrase"}"#);

        let json = OutboundEvent::PriceUpdate { price: dec!(1.5) }.to_json().unwrap();
        assert!(json.contains(r#""type":"priceUpdate""#));
    }
}
