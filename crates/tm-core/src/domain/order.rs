//! 주문 의도 타입.

use rust_decimal::Decimal;

use super::{ExchangeId, Side};

/// 실행 엔진에 제출되는 작업 단위.
///
/// 손절/익절 가격은 선택적이며, 진입 주문 성공 후 각각 독립적으로
/// 부착됩니다.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub side: Side,
    pub size: Decimal,
    pub symbol: String,
    pub exchange: ExchangeId,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl OrderIntent {
    /// 보호 주문 레그가 하나라도 있는지 확인.
    pub fn has_protective_legs(&self) -> bool {
        self.effective_stop_loss().is_some() || self.effective_take_profit().is_some()
    }

    /// 0 이하의 손절 가격은 미지정으로 취급.
    pub fn effective_stop_loss(&self) -> Option<Decimal> {
        self.stop_loss.filter(|p| *p > Decimal::ZERO)
    }

    /// 0 이하의 익절 가격은 미지정으로 취급.
    pub fn effective_take_profit(&self) -> Option<Decimal> {
        self.take_profit.filter(|p| *p > Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_legs_ignored() {
        let intent = OrderIntent {
            side: Side::Buy,
            size: dec!(1),
            symbol: "BTCUSDT".to_string(),
            exchange: ExchangeId::Bybit,
            stop_loss: Some(Decimal::ZERO),
            take_profit: Some(dec!(70000)),
        };

        assert!(intent.effective_stop_loss().is_none());
        assert_eq!(intent.effective_take_profit(), Some(dec!(70000)));
        assert!(intent.has_protective_legs());
    }
}
