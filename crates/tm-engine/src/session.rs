//! 세션 상태.
//!
//! 활성 시장 컨텍스트, 포지션 모드 추정, 실행 중인 가격 스트림
//! 태스크를 한 곳에 모아둡니다. 새 구독이 오면 이전 스트림을
//! 중단하고 추정을 초기화합니다.

use tokio::task::JoinHandle;

use tm_core::{ExchangeId, InstrumentKind, MarketContext, PositionModeHint};

/// 구독으로 갱신되는 세션 상태.
#[derive(Default)]
pub struct Session {
    context: Option<MarketContext>,
    position_mode: PositionModeHint,
    price_stream: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시장 컨텍스트를 교체합니다.
    ///
    /// 포지션 모드 추정은 시장마다 다를 수 있으므로 함께
    /// 초기화하고, 이전 가격 스트림 태스크는 중단합니다.
    pub fn activate(&mut self, context: MarketContext) {
        if let Some(handle) = self.price_stream.take() {
            handle.abort();
        }
        self.position_mode = PositionModeHint::Unknown;
        self.context = Some(context);
    }

    pub fn set_price_stream(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.price_stream.replace(handle) {
            previous.abort();
        }
    }

    /// 주문 대상 심볼의 상품 종류를 결정합니다.
    ///
    /// 활성 컨텍스트와 심볼/거래소가 일치하면 그 종류를 쓰고,
    /// 아니면 linear로 간주합니다.
    pub fn kind_for(&self, symbol: &str, exchange: ExchangeId) -> InstrumentKind {
        match &self.context {
            Some(ctx) if ctx.symbol == symbol && ctx.exchange == exchange => ctx.kind,
            _ => InstrumentKind::Linear,
        }
    }

    pub fn position_mode(&self) -> PositionModeHint {
        self.position_mode
    }

    /// 거래소 응답으로 알게 된 포지션 모드를 기록합니다 (최종 쓰기 승리).
    pub fn note_position_mode(&mut self, hint: PositionModeHint) {
        self.position_mode = hint;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.price_stream.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(symbol: &str, kind: InstrumentKind) -> MarketContext {
        MarketContext {
            symbol: symbol.to_string(),
            exchange: ExchangeId::Bybit,
            kind,
        }
    }

    #[test]
    fn test_activate_resets_position_mode() {
        let mut session = Session::new();
        session.note_position_mode(PositionModeHint::Hedge);

        session.activate(context("BTCUSDT", InstrumentKind::Linear));
        assert_eq!(session.position_mode(), PositionModeHint::Unknown);
    }

    #[test]
    fn test_kind_for_matches_active_context_only() {
        let mut session = Session::new();
        session.activate(context("BTCUSDT", InstrumentKind::Spot));

        assert_eq!(
            session.kind_for("BTCUSDT", ExchangeId::Bybit),
            InstrumentKind::Spot
        );
        // 다른 심볼이나 거래소는 linear 기본값
        assert_eq!(
            session.kind_for("ETHUSDT", ExchangeId::Bybit),
            InstrumentKind::Linear
        );
        assert_eq!(
            session.kind_for("BTCUSDT", ExchangeId::Binance),
            InstrumentKind::Linear
        );
    }
}
