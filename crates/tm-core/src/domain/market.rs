//! 시장 식별 타입 및 포지션 모드.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 지원 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeId::Binance => write!(f, "binance"),
            ExchangeId::Bybit => write!(f, "bybit"),
        }
    }
}

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    /// 반대 방향 반환 (보호 주문은 진입과 반대 방향).
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Binance 주문 파라미터 표기.
    pub fn as_binance(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Bybit 주문 파라미터 표기.
    pub fn as_bybit(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_binance())
    }
}

/// 상품 구분 (Bybit 카테고리와 1:1 대응).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Spot,
    Linear,
    Inverse,
}

impl InstrumentKind {
    /// Bybit v5 카테고리 문자열.
    pub fn as_category(&self) -> &'static str {
        match self {
            InstrumentKind::Spot => "spot",
            InstrumentKind::Linear => "linear",
            InstrumentKind::Inverse => "inverse",
        }
    }

    pub fn is_spot(&self) -> bool {
        matches!(self, InstrumentKind::Spot)
    }
}

/// 현재 활성 시장 컨텍스트.
///
/// subscribe 메시지로 교체되며 항상 마지막 구독이 이깁니다.
/// 컨텍스트 교체 시 포지션 모드 가정도 무효화됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketContext {
    pub symbol: String,
    pub exchange: ExchangeId,
    pub kind: InstrumentKind,
}

/// Bybit 포지션 모드에 대한 프로세스 전역 추정.
///
/// 베스트에포트 캐시입니다. 쓰기는 멱등적 last-write-wins이며,
/// 컨텍스트 전환 시 `Unknown`으로 리셋됩니다. 심볼/거래소 전환을
/// 넘어 신뢰성 있게 유지되지 않는 것은 알려진 한계입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionModeHint {
    /// 아직 모름. positionIdx를 보내지 않고 거래소가 추론하게 둠
    #[default]
    Unknown,
    /// 단방향 모드 확인됨 (positionIdx 0 또는 생략)
    OneWay,
    /// 헤지 모드 확인됨 (매수 1 / 매도 2)
    Hedge,
}

impl PositionModeHint {
    /// 헤지 모드에서의 방향별 포지션 인덱스.
    pub fn hedge_index(side: Side) -> u8 {
        match side {
            Side::Buy => 1,
            Side::Sell => 2,
        }
    }

    /// 진입 주문 본문에 넣을 positionIdx.
    ///
    /// 기본 정책은 생략입니다. 거래소가 단방향/헤지를 추론하게 두고,
    /// 모드 불일치 거절이 오면 한 번만 명시 인덱스로 재시도합니다.
    pub fn entry_index(&self, side: Side) -> Option<u8> {
        match self {
            PositionModeHint::Hedge => Some(Self::hedge_index(side)),
            PositionModeHint::Unknown | PositionModeHint::OneWay => None,
        }
    }

    /// trading-stop 요청에 넣을 positionIdx (항상 명시 필수).
    pub fn stop_index(&self, side: Side) -> u8 {
        match self {
            PositionModeHint::OneWay => 0,
            PositionModeHint::Unknown | PositionModeHint::Hedge => Self::hedge_index(side),
        }
    }
}
