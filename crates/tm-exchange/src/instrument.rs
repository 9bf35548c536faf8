//! 상품 메타데이터 기반 수량/가격 정규화.
//!
//! 거래소가 강제하는 최소 증분(수량 step, 가격 tick)에 맞춰 내림/
//! 반올림하고 올바른 소수 자릿수로 포맷합니다. 메타데이터를 얻지
//! 못하면 실패 대신 보수적 기본값으로 강등합니다. 호출자는 정밀도
//! 저하를 견디고 주문을 계속 시도해야 합니다.

use rust_decimal::{Decimal, RoundingStrategy};

/// step/tick이 내포하는 소수 자릿수 (후행 0 제거 후 계산).
pub fn implied_decimals(step: Decimal) -> u32 {
    step.normalize().scale()
}

/// 수량을 step의 배수로 내림하고 step 정밀도로 포맷합니다.
///
/// step이 0이거나 없으면 강등 모드: 수량이 1 이상이면 정수 내림,
/// 미만이면 그대로 통과시킵니다.
pub fn round_quantity(size: Decimal, step: Decimal) -> String {
    if step > Decimal::ZERO {
        let floored = (size / step).floor() * step;
        let decimals = implied_decimals(step);
        format!("{:.*}", decimals as usize, floored)
    } else if size >= Decimal::ONE {
        size.floor().normalize().to_string()
    } else {
        size.normalize().to_string()
    }
}

/// 가격을 tick의 최근접 배수로 반올림하고 tick 정밀도로 포맷합니다.
///
/// tick 메타데이터가 없으면 가격 크기별 고정 정밀도 사다리로
/// 강등합니다. 이 사다리는 거래소 규칙이 아니라 의도된 강등 기본값
/// 입니다.
pub fn format_price(price: Decimal, tick: Option<Decimal>) -> String {
    match tick {
        Some(tick) if tick > Decimal::ZERO => {
            let ticks =
                (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            let rounded = ticks * tick;
            format!("{:.*}", implied_decimals(tick) as usize, rounded)
        }
        _ => format!("{:.*}", ladder_decimals(price), price),
    }
}

/// 가격 크기별 강등 정밀도 사다리.
fn ladder_decimals(price: Decimal) -> usize {
    use rust_decimal_macros::dec;

    if price < dec!(0.1) {
        6
    } else if price < dec!(1) {
        5
    } else if price < dec!(10) {
        4
    } else if price < dec!(100) {
        3
    } else if price < dec!(1000) {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_quantity_to_step() {
        assert_eq!(round_quantity(dec!(0.1234), dec!(0.01)), "0.12");
        assert_eq!(round_quantity(dec!(1.999), dec!(0.1)), "1.9");
        assert_eq!(round_quantity(dec!(5), dec!(1)), "5");
        // 후행 0이 있는 step도 내포 정밀도는 같다
        assert_eq!(round_quantity(dec!(0.1234), dec!(0.010)), "0.12");
    }

    #[test]
    fn test_round_quantity_degraded_mode() {
        // step 미상: 1 이상은 정수 내림
        assert_eq!(round_quantity(dec!(7), Decimal::ZERO), "7");
        assert_eq!(round_quantity(dec!(7.9), Decimal::ZERO), "7");
        // 1 미만은 그대로 통과
        assert_eq!(round_quantity(dec!(0.123), Decimal::ZERO), "0.123");
    }

    #[test]
    fn test_format_price_with_tick() {
        assert_eq!(format_price(dec!(100.456), Some(dec!(0.01))), "100.46");
        assert_eq!(format_price(dec!(100.454), Some(dec!(0.01))), "100.45");
        assert_eq!(format_price(dec!(27123), Some(dec!(0.5))), "27123.0");
        assert_eq!(format_price(dec!(27123.3), Some(dec!(0.5))), "27123.5");
    }

    #[test]
    fn test_format_price_ladder_fallback() {
        assert_eq!(format_price(dec!(0.05), None), "0.050000");
        assert_eq!(format_price(dec!(0.5), None), "0.50000");
        assert_eq!(format_price(dec!(5), None), "5.0000");
        assert_eq!(format_price(dec!(50), None), "50.000");
        assert_eq!(format_price(dec!(500), None), "500.00");
        assert_eq!(format_price(dec!(5000), None), "5000.0");
        // tick 0도 사다리로 강등
        assert_eq!(format_price(dec!(0.05), Some(Decimal::ZERO)), "0.050000");
    }

    #[test]
    fn test_implied_decimals() {
        assert_eq!(implied_decimals(dec!(0.001)), 3);
        assert_eq!(implied_decimals(dec!(0.0100)), 2);
        assert_eq!(implied_decimals(dec!(1)), 0);
    }
}
