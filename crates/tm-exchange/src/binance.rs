//! Binance USDⓈ-M 선물 클라이언트.
//!
//! 잔고 조회, 시장가 진입, 보호 주문(STOP_MARKET /
//! TAKE_PROFIT_MARKET) 부착을 제공합니다.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use tm_core::Side;

use crate::error::{ExchangeError, ExchangeResult};
use crate::signer::BinanceSigner;

// ==================== API 응답 타입 ====================

#[derive(Debug, Deserialize)]
struct BinanceBalanceRow {
    asset: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderResponse {
    order_id: i64,
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct BinanceSymbolInfo {
    symbol: String,
    filters: Vec<BinanceFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceFilter {
    filter_type: String,
    step_size: Option<String>,
}

// ==================== 클라이언트 ====================

/// Binance 선물 클라이언트.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    signer: BinanceSigner,
}

impl BinanceClient {
    pub fn new(http: Client, base_url: impl Into<String>, signer: BinanceSigner) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            signer,
        }
    }

    /// 심볼의 LOT_SIZE step을 조회합니다.
    ///
    /// 조회 실패는 주문을 막지 않습니다. 0으로 강등하고 호출자가
    /// 정밀도 저하 모드로 계속합니다.
    pub async fn quantity_step(&self, symbol: &str) -> Decimal {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let info: BinanceExchangeInfo = match self.http.get(&url).send().await {
            Ok(resp) => match resp.json().await {
                Ok(info) => info,
                Err(e) => {
                    warn!(symbol, error = %e, "Failed to parse Binance exchangeInfo");
                    return Decimal::ZERO;
                }
            },
            Err(e) => {
                warn!(symbol, error = %e, "Binance exchangeInfo fetch failed");
                return Decimal::ZERO;
            }
        };

        let step = info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .and_then(|s| s.filters.iter().find(|f| f.filter_type == "LOT_SIZE"))
            .and_then(|f| f.step_size.as_deref())
            .and_then(|s| s.parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO);

        debug!(symbol, %step, "Binance quantity step");
        step
    }

    /// USDT 선물 지갑 잔고를 조회합니다.
    pub async fn usdt_balance(&self) -> ExchangeResult<Decimal> {
        let query = self.signer.signed_query(&[]);
        let url = format!("{}/fapi/v2/balance?{}", self.base_url, query);

        let body = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", self.signer.api_key())
            .send()
            .await?
            .text()
            .await?;

        let rows: Vec<BinanceBalanceRow> = serde_json::from_str(&body).map_err(|_| {
            match serde_json::from_str::<BinanceErrorBody>(&body) {
                Ok(err) => ExchangeError::Venue {
                    code: err.code,
                    message: err.msg,
                },
                Err(e) => ExchangeError::Parse(e.to_string()),
            }
        })?;

        Ok(rows
            .iter()
            .find(|r| r.asset == "USDT")
            .and_then(|r| r.balance.parse().ok())
            .unwrap_or(Decimal::ZERO))
    }

    /// 시장가 주문을 제출하고 주문 ID를 반환합니다.
    pub async fn place_market(
        &self,
        symbol: &str,
        side: Side,
        quantity: &str,
    ) -> ExchangeResult<String> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_binance().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
        ];

        info!(symbol, %side, quantity, "Placing Binance market order");
        let resp = self.signed_post(&params).await?;
        info!(symbol, order_id = resp.order_id, "Binance order placed");
        Ok(resp.order_id.to_string())
    }

    /// 보호 주문을 부착합니다 (진입과 반대 방향, 포지션 전체 청산).
    pub async fn place_protective(
        &self,
        symbol: &str,
        entry_side: Side,
        quantity: &str,
        trigger_price: &str,
        is_stop_loss: bool,
    ) -> ExchangeResult<String> {
        let order_type = if is_stop_loss {
            "STOP_MARKET"
        } else {
            "TAKE_PROFIT_MARKET"
        };

        let params = [
            ("symbol", symbol.to_string()),
            ("side", entry_side.opposite().as_binance().to_string()),
            ("type", order_type.to_string()),
            ("quantity", quantity.to_string()),
            ("stopPrice", trigger_price.to_string()),
            ("timeInForce", "GTC".to_string()),
            ("closePosition", "true".to_string()),
        ];

        info!(symbol, order_type, trigger_price, "Placing Binance protective order");
        let resp = self.signed_post(&params).await?;
        Ok(resp.order_id.to_string())
    }

    /// 서명된 주문 POST. 재시도는 없으며 실패는 해당 요청에 한정됩니다.
    async fn signed_post(&self, params: &[(&str, String)]) -> ExchangeResult<BinanceOrderResponse> {
        // 호출마다 새로 서명 (타임스탬프는 전송 시점)
        let query = self.signer.signed_query(params);
        let url = format!("{}/fapi/v1/order?{}", self.base_url, query);

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", self.signer.api_key())
            .send()
            .await?;
        let body = response.text().await?;
        debug!(body = %body, "Binance order response");

        match serde_json::from_str::<BinanceOrderResponse>(&body) {
            Ok(order) => Ok(order),
            Err(_) => match serde_json::from_str::<BinanceErrorBody>(&body) {
                Ok(err) => Err(ExchangeError::Venue {
                    code: err.code,
                    message: err.msg,
                }),
                Err(_) => Err(ExchangeError::Parse(truncate(&body, 140))),
            },
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_limits_opaque_bodies() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, 140).len(), 140);
        assert_eq!(truncate("short", 140), "short");
    }
}
