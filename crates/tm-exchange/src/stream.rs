//! Binance 마크 가격 WebSocket 스트림.
//!
//! 구독한 심볼의 마크 가격을 수신해 UI 채널로 중계합니다. 연결이
//! 끊기면 잠시 대기 후 재연결하며, 태스크 abort로 중단됩니다.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use tm_core::protocol::{OutboundEvent, UiChannel};

/// 재연결 전 대기 시간.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Binance 마크 가격 스트림 이벤트.
#[derive(Debug, Deserialize)]
struct WsMarkPrice {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "p")]
    mark_price: String,
}

/// 마크 가격 스트림 이름을 반환합니다.
fn mark_price_stream(symbol: &str) -> String {
    format!("{}@markPrice", symbol.to_lowercase())
}

/// WebSocket 메시지에서 마크 가격을 파싱합니다.
fn parse_mark_price(text: &str) -> Option<Decimal> {
    let event = serde_json::from_str::<WsMarkPrice>(text).ok()?;
    if event.event_type != "markPriceUpdate" {
        return None;
    }
    event.mark_price.parse().ok()
}

/// 심볼의 마크 가격 스트림 태스크를 시작합니다.
///
/// 반환된 핸들을 abort하면 스트림이 종료됩니다. 새 구독이 오면
/// 호출 측에서 기존 핸들을 abort하고 다시 시작합니다.
pub fn spawn_mark_price_stream(
    ws_base_url: String,
    symbol: String,
    channel: Arc<dyn UiChannel>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let url = format!("{}/{}", ws_base_url, mark_price_stream(&symbol));
            info!(symbol, url, "Connecting to Binance mark price stream");

            let ws = match connect_async(&url).await {
                Ok((ws, _)) => ws,
                Err(e) => {
                    warn!(symbol, error = %e, "Mark price stream connect failed");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            let (_write, mut read) = ws.split();
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Some(price) = parse_mark_price(&text) {
                            channel.broadcast(OutboundEvent::PriceUpdate { price }).await;
                        }
                    }
                    Ok(Message::Ping(_)) => {
                        debug!(symbol, "Received ping");
                        // Pong은 tungstenite에서 자동으로 처리됨
                    }
                    Ok(Message::Close(_)) => {
                        info!(symbol, "Mark price stream closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!(symbol, error = %e, "Mark price stream error");
                        break;
                    }
                    _ => {}
                }
            }

            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mark_price_stream_name() {
        assert_eq!(mark_price_stream("BTCUSDT"), "btcusdt@markPrice");
    }

    #[test]
    fn test_parse_mark_price() {
        let text = r#"{"e":"markPriceUpdate","E":1700000000000,"s":"BTCUSDT","p":"42150.50","i":"42149.80","r":"0.0001","T":1700000028000}"#;
        assert_eq!(parse_mark_price(text), Some(dec!(42150.50)));
    }

    #[test]
    fn test_parse_ignores_other_events() {
        assert_eq!(parse_mark_price(r#"{"e":"kline","p":"1.0"}"#), None);
        assert_eq!(parse_mark_price("not json"), None);
    }
}
