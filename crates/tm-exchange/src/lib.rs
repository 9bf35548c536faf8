//! 거래소 연동 계층.
//!
//! Binance USDT-M 선물과 Bybit v5 REST 클라이언트, 요청 서명,
//! 수량/가격 정규화, 마크 가격 스트림을 제공합니다.

pub mod binance;
pub mod bybit;
pub mod error;
pub mod instrument;
pub mod signer;
pub mod stream;

pub use binance::BinanceClient;
pub use bybit::BybitClient;
pub use error::{ExchangeError, ExchangeResult};
pub use instrument::{format_price, round_quantity};
pub use signer::{BinanceSigner, BybitSigner};
pub use stream::spawn_mark_price_stream;
