//! Bybit v5 클라이언트.
//!
//! 잔고 조회(호스트 폴백 포함), 시장가 진입, trading-stop 기반
//! 보호 주문과 reduce-only 조건부 주문 폴백을 제공합니다.
//!
//! 포지션 모드 정책: 진입 본문은 기본적으로 positionIdx를 보내지
//! 않고 거래소가 단방향/헤지를 추론하게 둡니다. 모드 불일치 거절이
//! 오면 반대 관례(명시 헤지 인덱스 또는 0)로 정확히 한 번만
//! 재시도하며, 성공하면 공유 포지션 모드 추정을 갱신합니다.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tm_core::{PositionModeHint, Side};

use crate::error::{ExchangeError, ExchangeResult};
use crate::signer::{timestamp_ms, BybitSigner};

/// 잔고 조회에서 시도하는 계정 유형 순서 (UNIFIED 우선).
const ACCOUNT_TYPES: [&str; 5] = ["UNIFIED", "CONTRACT", "SPOT", "FUND", "OPTION"];

/// 잘못된 호스트를 뜻하는 retCode. 남은 계정 유형을 건너뛰고 다음
/// 호스트로 넘어갑니다.
const RET_WRONG_HOST: i64 = 10003;

/// 파라미터 문제 전반에 쓰이는 retCode (포지션 모드 불일치 포함).
const RET_PARAM_ERROR: i64 = 10001;

/// 조건부 주문 폴백이 통할 가능성이 있는 retCode 집합.
const FIXABLE_RET_CODES: [i64; 4] = [10001, 110043, 110046, 110049];

/// 조건부 주문 폴백을 시사하는 메시지 키워드.
const FIXABLE_KEYWORDS: [&str; 9] = [
    "price",
    "too close",
    "invalid",
    "trigger",
    "immediately",
    "minimum",
    "maximum",
    "exceed",
    "decimal",
];

// ==================== API 응답 타입 ====================

/// Bybit v5 공통 응답 봉투.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

impl BybitEnvelope {
    fn ok(&self) -> bool {
        self.ret_code == 0
    }

    fn order_id(&self) -> Option<String> {
        self.result
            .get("orderId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// 거래소 메시지를 그대로 담은 에러로 변환.
    fn venue_error(&self) -> ExchangeError {
        ExchangeError::Venue {
            code: self.ret_code,
            message: self.ret_msg.clone(),
        }
    }

    /// 포지션 모드 불일치 거절인지 확인.
    fn is_position_mode_mismatch(&self) -> bool {
        self.ret_code == RET_PARAM_ERROR
            && self.ret_msg.contains("position idx not match position mode")
    }

    /// 주문 형태 전환(조건부 주문)으로 고칠 수 있을 법한 거절인지 확인.
    fn is_fixable_reject(&self) -> bool {
        if FIXABLE_RET_CODES.contains(&self.ret_code) {
            return true;
        }
        let msg = self.ret_msg.to_lowercase();
        FIXABLE_KEYWORDS.iter().any(|kw| msg.contains(kw))
    }
}

// ==================== 클라이언트 ====================

/// Bybit 거래소 클라이언트.
pub struct BybitClient {
    http: Client,
    hosts: Vec<String>,
    signer: BybitSigner,
}

impl BybitClient {
    pub fn new(http: Client, hosts: Vec<String>, signer: BybitSigner) -> Self {
        Self {
            http,
            hosts,
            signer,
        }
    }

    fn primary_host(&self) -> &str {
        self.hosts.first().map(String::as_str).unwrap_or_default()
    }

    /// 서명된 POST. 본문 직렬화 결과 그대로를 서명하고 전송합니다.
    /// 호출마다 타임스탬프를 새로 찍으므로 재시도는 자동으로 재서명
    /// 됩니다.
    async fn post_signed(&self, path: &str, body: &Value) -> ExchangeResult<BybitEnvelope> {
        let payload = serde_json::to_string(body)?;
        let url = format!("{}{}", self.primary_host(), path);

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");
        for (name, value) in self.signer.auth_headers(&payload) {
            request = request.header(name, value);
        }

        let envelope: BybitEnvelope = request.body(payload).send().await?.json().await?;
        debug!(path, ret_code = envelope.ret_code, ret_msg = %envelope.ret_msg, "Bybit response");
        Ok(envelope)
    }

    /// 심볼의 상품 메타데이터를 조회합니다 (실패 시 None으로 강등).
    async fn instrument_info(&self, symbol: &str, category: &str) -> Option<Value> {
        let url = format!(
            "{}/v5/market/instruments-info?category={}&symbol={}",
            self.primary_host(),
            category,
            symbol
        );

        let envelope: BybitEnvelope = match self.http.get(&url).send().await {
            Ok(resp) => match resp.json().await {
                Ok(env) => env,
                Err(e) => {
                    warn!(symbol, error = %e, "Failed to parse instrument info");
                    return None;
                }
            },
            Err(e) => {
                warn!(symbol, error = %e, "Instrument info fetch failed");
                return None;
            }
        };

        if !envelope.ok() {
            warn!(symbol, ret_code = envelope.ret_code, "Instrument info returned no data");
            return None;
        }
        envelope
            .result
            .get("list")
            .and_then(|l| l.get(0))
            .cloned()
    }

    /// 수량 step 조회. 실패하면 0으로 강등합니다.
    pub async fn quantity_step(&self, symbol: &str, category: &str) -> Decimal {
        let step = self
            .instrument_info(symbol, category)
            .await
            .as_ref()
            .and_then(|info| info.pointer("/lotSizeFilter/qtyStep"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO);

        debug!(symbol, category, %step, "Bybit quantity step");
        step
    }

    /// 가격 tick 조회. 실패하면 None으로 강등합니다.
    pub async fn tick_size(&self, symbol: &str, category: &str) -> Option<Decimal> {
        self.instrument_info(symbol, category)
            .await
            .as_ref()
            .and_then(|info| info.pointer("/priceFilter/tickSize"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Decimal>().ok())
    }

    /// 지갑 잔고 조회.
    ///
    /// 호스트 × 계정 유형 사다리를 차례로 시도하고, 실패는 모두 0으로
    /// 강등합니다. 미실현 손익을 제외하기 위해 totalWalletBalance를
    /// 우선 사용하고, 없으면 코인별 walletBalance 합계로 폴백합니다.
    pub async fn wallet_balance(&self) -> Decimal {
        'hosts: for host in &self.hosts {
            for account_type in ACCOUNT_TYPES {
                let query = format!("accountType={}", account_type);
                let url = format!("{}/v5/account/wallet-balance?{}", host, query);

                let mut request = self.http.get(&url);
                for (name, value) in self.signer.auth_headers(&query) {
                    request = request.header(name, value);
                }

                let envelope: BybitEnvelope = match request.send().await {
                    Ok(resp) => match resp.json().await {
                        Ok(env) => env,
                        Err(e) => {
                            warn!(host, account_type, error = %e, "Balance parse failed");
                            continue;
                        }
                    },
                    Err(e) => {
                        warn!(host, account_type, error = %e, "Balance fetch failed");
                        continue;
                    }
                };

                if envelope.ret_code == RET_WRONG_HOST {
                    debug!(host, "Wrong Bybit host, trying next");
                    continue 'hosts;
                }
                if !envelope.ok() {
                    continue;
                }

                let Some(account) = envelope.result.pointer("/list/0") else {
                    continue;
                };

                let mut balance = account
                    .get("totalWalletBalance")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or(Decimal::ZERO);

                if balance.is_zero() {
                    if let Some(coins) = account.get("coin").and_then(Value::as_array) {
                        balance = coins
                            .iter()
                            .filter_map(|c| c.get("walletBalance"))
                            .filter_map(Value::as_str)
                            .filter_map(|s| s.parse::<Decimal>().ok())
                            .sum();
                    }
                }

                if !balance.is_zero() {
                    info!(host, account_type, %balance, "Bybit balance found");
                    return balance;
                }
            }
        }
        Decimal::ZERO
    }

    /// 시장가 주문을 제출합니다.
    ///
    /// 포지션 모드 불일치 거절이면 반대 관례로 정확히 한 번
    /// 재시도합니다. 재시도의 결과와 무관하게 두 번째 재시도는
    /// 없습니다. 성공 시 갱신된 포지션 모드 추정을 함께 반환합니다.
    pub async fn place_market(
        &self,
        symbol: &str,
        category: &str,
        side: Side,
        qty: &str,
        hint: PositionModeHint,
    ) -> ExchangeResult<(String, PositionModeHint)> {
        let mut body = json!({
            "category": category,
            "symbol": symbol,
            "side": side.as_bybit(),
            "orderType": "Market",
            "qty": qty,
        });

        let sent_index = if category == "spot" {
            None
        } else {
            hint.entry_index(side)
        };
        if let Some(index) = sent_index {
            body["positionIdx"] = index.into();
        }

        info!(symbol, %side, qty, category, ?sent_index, "Placing Bybit market order");
        let envelope = self.post_signed("/v5/order/create", &body).await?;

        if envelope.ok() {
            let order_id = envelope.order_id().unwrap_or_default();
            info!(symbol, order_id, "Bybit order placed");
            return Ok((order_id, hint));
        }

        if !envelope.is_position_mode_mismatch() {
            return Err(envelope.venue_error());
        }

        // 반대 관례로 단 한 번 재시도
        let new_hint = match sent_index {
            None => {
                body["positionIdx"] = PositionModeHint::hedge_index(side).into();
                PositionModeHint::Hedge
            }
            Some(_) => {
                body["positionIdx"] = 0.into();
                PositionModeHint::OneWay
            }
        };
        info!(symbol, ?new_hint, "Position mode mismatch, retrying with alternate index");

        let retry = self.post_signed("/v5/order/create", &body).await?;
        if retry.ok() {
            let order_id = retry.order_id().unwrap_or_default();
            info!(symbol, order_id, "Bybit order placed on retry");
            Ok((order_id, new_hint))
        } else {
            Err(retry.venue_error())
        }
    }

    /// 포지션에 손절/익절 트리거를 부착합니다.
    ///
    /// trading-stop은 positionIdx 명시가 필수입니다. 모드 불일치면
    /// 반대 인덱스로 한 번 재시도하고, 고칠 수 있을 법한 거절이면
    /// reduce-only 조건부 주문으로 폴백합니다.
    pub async fn attach_protective(
        &self,
        symbol: &str,
        category: &str,
        side: Side,
        qty: &str,
        trigger_price: &str,
        is_stop_loss: bool,
        hint: PositionModeHint,
    ) -> ExchangeResult<(String, PositionModeHint)> {
        if category == "spot" {
            return Err(ExchangeError::NotSupported(
                "trading stops are not available for spot instruments".to_string(),
            ));
        }

        let leg = if is_stop_loss { "SL" } else { "TP" };
        let index = hint.stop_index(side);
        let mut body = json!({
            "category": category,
            "symbol": symbol,
            "positionIdx": index,
        });
        if is_stop_loss {
            body["stopLoss"] = trigger_price.into();
            body["slTriggerBy"] = "MarkPrice".into();
        } else {
            body["takeProfit"] = trigger_price.into();
            body["tpTriggerBy"] = "MarkPrice".into();
        }

        info!(symbol, leg, trigger_price, index, "Attaching Bybit trading stop");
        let envelope = self.post_signed("/v5/position/trading-stop", &body).await?;

        if envelope.ok() {
            return Ok((format!("TS-{}-{}", leg, timestamp_ms()), hint));
        }

        if envelope.is_position_mode_mismatch() {
            let (alternate, new_hint) = if index == 0 {
                (PositionModeHint::hedge_index(side), PositionModeHint::Hedge)
            } else {
                (0, PositionModeHint::OneWay)
            };
            body["positionIdx"] = alternate.into();
            info!(symbol, leg, alternate, "Trading stop mode mismatch, retrying once");

            let retry = self.post_signed("/v5/position/trading-stop", &body).await?;
            if retry.ok() {
                return Ok((format!("TS-{}-{}", leg, timestamp_ms()), new_hint));
            }
        }

        if envelope.is_fixable_reject() {
            info!(symbol, leg, ret_code = envelope.ret_code, "Falling back to conditional order");
            let order_id = self
                .place_conditional(symbol, category, side, qty, trigger_price, is_stop_loss)
                .await?;
            return Ok((order_id, hint));
        }

        warn!(symbol, leg, ret_code = envelope.ret_code, ret_msg = %envelope.ret_msg, "Trading stop rejected");
        Err(envelope.venue_error())
    }

    /// reduce-only 조건부 시장가 주문 폴백.
    ///
    /// 포지션의 트리거 필드를 바꾸는 대신, 새 노출 없이 시장가 청산을
    /// 트리거하는 별도 주문을 냅니다.
    async fn place_conditional(
        &self,
        symbol: &str,
        category: &str,
        side: Side,
        qty: &str,
        trigger_price: &str,
        is_stop_loss: bool,
    ) -> ExchangeResult<String> {
        let trigger_direction = match (is_stop_loss, side) {
            // 손절: 매수 포지션은 하락(2), 매도 포지션은 상승(1) 트리거
            (true, Side::Buy) => 2,
            (true, Side::Sell) => 1,
            (false, Side::Buy) => 1,
            (false, Side::Sell) => 2,
        };

        let body = json!({
            "category": category,
            "symbol": symbol,
            "side": side.opposite().as_bybit(),
            "orderType": "Market",
            "qty": qty,
            "triggerDirection": trigger_direction,
            "triggerPrice": trigger_price,
            "triggerBy": "MarkPrice",
            "orderFilter": "Order",
            "reduceOnly": true,
        });

        let envelope = self.post_signed("/v5/order/create", &body).await?;
        if envelope.ok() {
            let leg = if is_stop_loss { "SL" } else { "TP" };
            let order_id = envelope
                .order_id()
                .unwrap_or_else(|| format!("CO-{}-{}", leg, timestamp_ms()));
            info!(symbol, order_id, "Conditional order placed");
            Ok(order_id)
        } else {
            Err(envelope.venue_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(code: i64, msg: &str) -> BybitEnvelope {
        BybitEnvelope {
            ret_code: code,
            ret_msg: msg.to_string(),
            result: Value::Null,
        }
    }

    #[test]
    fn test_position_mode_mismatch_detection() {
        assert!(envelope(10001, "position idx not match position mode")
            .is_position_mode_mismatch());
        assert!(!envelope(10001, "some other parameter error").is_position_mode_mismatch());
        assert!(!envelope(110043, "position idx not match position mode")
            .is_position_mode_mismatch());
    }

    #[test]
    fn test_fixable_reject_by_code_and_keyword() {
        assert!(envelope(110046, "").is_fixable_reject());
        assert!(envelope(110049, "whatever").is_fixable_reject());
        assert!(envelope(999, "Order would trigger IMMEDIATELY").is_fixable_reject());
        assert!(envelope(999, "below the MINIMUM notional").is_fixable_reject());
        assert!(!envelope(999, "insufficient balance").is_fixable_reject());
    }
}
