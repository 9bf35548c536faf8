//! 주문 실행 엔진.
//!
//! 인바운드 프로토콜 메시지를 받아 자격증명 해석, 수량/가격 정규화,
//! 주문 제출, 보호 주문 부착까지 하나의 파이프라인으로 처리하고
//! 결과를 UI 채널로 브로드캐스트합니다.
//!
//! 파이프라인 하나는 순차 await I/O입니다. 동시 주문 간 상호 배제는
//! 없으며, 포지션 모드 추정은 최종 쓰기 승리입니다.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use tm_core::protocol::{InboundMessage, OutboundEvent, UiChannel};
use tm_core::{AppConfig, CredentialSet, ExchangeId, InstrumentKind, MarketContext, OrderIntent};
use tm_exchange::{
    format_price, round_quantity, spawn_mark_price_stream, BinanceClient, BinanceSigner,
    BybitClient, BybitSigner,
};
use tm_vault::{CredentialStore, KeyResolver};

use crate::session::Session;

/// 자격증명이 없거나 해석이 거부됐을 때의 주문 결과 메시지.
const MISSING_CONFIG: &str = "missing config";

/// 메시지 디스패처 겸 주문 실행기.
pub struct Engine<S: CredentialStore> {
    config: AppConfig,
    resolver: Arc<KeyResolver<S>>,
    channel: Arc<dyn UiChannel>,
    http: reqwest::Client,
    session: Mutex<Session>,
}

impl<S: CredentialStore + 'static> Engine<S> {
    pub fn new(
        config: AppConfig,
        resolver: Arc<KeyResolver<S>>,
        channel: Arc<dyn UiChannel>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("HTTP 클라이언트 생성 실패");

        Self {
            config,
            resolver,
            channel,
            http,
            session: Mutex::new(Session::new()),
        }
    }

    /// 인바운드 메시지를 처리합니다.
    pub async fn handle_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::Subscribe {
                symbol,
                exchange,
                kind,
            } => self.subscribe(symbol, exchange, kind).await,
            InboundMessage::GetBalance { exchange } => self.get_balance(exchange).await,
            InboundMessage::PlaceOrder {
                side,
                size,
                symbol,
                exchange,
                stop_loss,
                take_profit,
            } => {
                let intent = OrderIntent {
                    side,
                    size,
                    symbol,
                    exchange,
                    stop_loss,
                    take_profit,
                };
                let (success, info) = self.execute_order(intent).await;
                self.channel
                    .broadcast(OutboundEvent::OrderResult { success, info })
                    .await;
            }
            InboundMessage::PassphraseResponse { passphrase } => {
                self.resolver.submit_passphrase(passphrase).await;
            }
        }
    }

    // ==================== 구독 ====================

    async fn subscribe(&self, symbol: String, exchange: ExchangeId, kind: Option<InstrumentKind>) {
        let context = MarketContext {
            symbol: symbol.clone(),
            exchange,
            kind: kind.unwrap_or(InstrumentKind::Linear),
        };
        info!(symbol, %exchange, "Subscribing to market");

        let mut session = self.session.lock().await;
        session.activate(context);

        // 마크 가격 스트림은 Binance 선물에서만 제공
        if exchange == ExchangeId::Binance {
            let handle = spawn_mark_price_stream(
                self.config.binance.ws_url.clone(),
                symbol,
                Arc::clone(&self.channel),
            );
            session.set_price_stream(handle);
        }
    }

    // ==================== 잔고 ====================

    /// 잔고를 조회해 브로드캐스트합니다. 어떤 실패도 0으로 강등되며
    /// 오류로 끝나지 않습니다.
    async fn get_balance(&self, exchange: ExchangeId) {
        let balance = match self.resolver.resolve().await {
            Ok(set) => self.fetch_balance(exchange, &set).await,
            Err(e) => {
                warn!(%exchange, error = %e, "Credential resolution failed for balance");
                Decimal::ZERO
            }
        };

        self.channel
            .broadcast(OutboundEvent::BalanceUpdate { balance })
            .await;
    }

    async fn fetch_balance(&self, exchange: ExchangeId, set: &CredentialSet) -> Decimal {
        match exchange {
            ExchangeId::Binance => {
                let Ok(signer) = BinanceSigner::from_set(set, self.config.binance.recv_window_ms)
                else {
                    return Decimal::ZERO;
                };
                let client =
                    BinanceClient::new(self.http.clone(), &self.config.binance.rest_url, signer);
                match client.usdt_balance().await {
                    Ok(balance) => balance,
                    Err(e) => {
                        warn!(error = %e, "Binance balance fetch failed");
                        Decimal::ZERO
                    }
                }
            }
            ExchangeId::Bybit => {
                let Ok(signer) = BybitSigner::from_set(set, self.config.bybit.recv_window_ms)
                else {
                    return Decimal::ZERO;
                };
                let client =
                    BybitClient::new(self.http.clone(), self.config.bybit.hosts.clone(), signer);
                client.wallet_balance().await
            }
        }
    }

    // ==================== 주문 ====================

    /// 주문 파이프라인. 결과는 (성공 여부, 상세 문자열)입니다.
    ///
    /// 진입이 성공하면 보호 주문 실패가 있어도 성공으로 남고,
    /// 상세에 각 레그의 결과가 덧붙습니다.
    async fn execute_order(&self, intent: OrderIntent) -> (bool, String) {
        let set = match self.resolver.resolve().await {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "Credential resolution failed for order");
                return (false, MISSING_CONFIG.to_string());
            }
        };

        match intent.exchange {
            ExchangeId::Binance => self.execute_binance(&intent, &set).await,
            ExchangeId::Bybit => self.execute_bybit(&intent, &set).await,
        }
    }

    async fn execute_binance(&self, intent: &OrderIntent, set: &CredentialSet) -> (bool, String) {
        let Ok(signer) = BinanceSigner::from_set(set, self.config.binance.recv_window_ms) else {
            return (false, MISSING_CONFIG.to_string());
        };
        let client = BinanceClient::new(self.http.clone(), &self.config.binance.rest_url, signer);

        let step = client.quantity_step(&intent.symbol).await;
        let qty = round_quantity(intent.size, step);

        let order_id = match client.place_market(&intent.symbol, intent.side, &qty).await {
            Ok(id) => id,
            Err(e) => return (false, e.venue_message()),
        };
        let mut info = format!("OrderId {}", order_id);

        // Binance 보호 주문은 진입 직후 바로 부착
        for (price, is_stop_loss) in protective_legs(intent) {
            let label = leg_label(is_stop_loss);
            let trigger = format_price(price, None);
            match client
                .place_protective(&intent.symbol, intent.side, &qty, &trigger, is_stop_loss)
                .await
            {
                Ok(id) => info.push_str(&format!(", {}: {}", label, id)),
                Err(e) => {
                    warn!(symbol = intent.symbol, label, error = %e, "Protective leg failed");
                    info.push_str(&format!(", {} failed: {}", label, e.venue_message()));
                }
            }
        }

        (true, info)
    }

    async fn execute_bybit(&self, intent: &OrderIntent, set: &CredentialSet) -> (bool, String) {
        let Ok(signer) = BybitSigner::from_set(set, self.config.bybit.recv_window_ms) else {
            return (false, MISSING_CONFIG.to_string());
        };
        let client = BybitClient::new(self.http.clone(), self.config.bybit.hosts.clone(), signer);

        let (kind, hint) = {
            let session = self.session.lock().await;
            (
                session.kind_for(&intent.symbol, intent.exchange),
                session.position_mode(),
            )
        };
        let category = kind.as_category();

        let step = client.quantity_step(&intent.symbol, category).await;
        let qty = round_quantity(intent.size, step);

        let (order_id, mut hint) = match client
            .place_market(&intent.symbol, category, intent.side, &qty, hint)
            .await
        {
            Ok(result) => result,
            Err(e) => return (false, e.venue_message()),
        };
        self.session.lock().await.note_position_mode(hint);
        let mut info = format!("OrderId {}", order_id);

        if !intent.has_protective_legs() {
            return (true, info);
        }

        if kind.is_spot() {
            // 현물에는 보호 주문 개념이 없으므로 네트워크 없이 건너뜀
            info.push_str(" (SL/TP not applicable to spot)");
            return (true, info);
        }

        // 포지션 등록을 기다린 뒤 보호 주문 부착
        let settle = Duration::from_millis(self.config.engine.settle_delay_ms);
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let tick = client.tick_size(&intent.symbol, category).await;
        for (price, is_stop_loss) in protective_legs(intent) {
            let label = leg_label(is_stop_loss);
            let trigger = format_price(price, tick);
            match client
                .attach_protective(
                    &intent.symbol,
                    category,
                    intent.side,
                    &qty,
                    &trigger,
                    is_stop_loss,
                    hint,
                )
                .await
            {
                Ok((id, new_hint)) => {
                    hint = new_hint;
                    info.push_str(&format!(", {}: {}", label, id));
                }
                Err(e) => {
                    warn!(symbol = intent.symbol, label, error = %e, "Protective leg failed");
                    info.push_str(&format!(", {} failed: {}", label, e.venue_message()));
                }
            }
        }
        self.session.lock().await.note_position_mode(hint);

        (true, info)
    }
}

/// 의도에 담긴 보호 레그를 (가격, 손절 여부) 순서로 나열합니다.
fn protective_legs(intent: &OrderIntent) -> Vec<(Decimal, bool)> {
    let mut legs = Vec::new();
    if let Some(sl) = intent.effective_stop_loss() {
        legs.push((sl, true));
    }
    if let Some(tp) = intent.effective_take_profit() {
        legs.push((tp, false));
    }
    legs
}

fn leg_label(is_stop_loss: bool) -> &'static str {
    if is_stop_loss {
        "SL"
    } else {
        "TP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tm_core::Side;

    fn intent(stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> OrderIntent {
        OrderIntent {
            side: Side::Buy,
            size: dec!(1),
            symbol: "BTCUSDT".to_string(),
            exchange: ExchangeId::Bybit,
            stop_loss,
            take_profit,
        }
    }

    #[test]
    fn test_protective_legs_order_and_zero_filter() {
        let legs = protective_legs(&intent(Some(dec!(41000)), Some(dec!(43000))));
        assert_eq!(legs, vec![(dec!(41000), true), (dec!(43000), false)]);

        // 0은 미설정으로 취급
        let legs = protective_legs(&intent(Some(dec!(0)), Some(dec!(43000))));
        assert_eq!(legs, vec![(dec!(43000), false)]);

        assert!(protective_legs(&intent(None, None)).is_empty());
    }
}
