//! 핵심 도메인 모델.

mod credential;
mod market;
mod order;

pub use credential::CredentialSet;
pub use market::{ExchangeId, InstrumentKind, MarketContext, PositionModeHint, Side};
pub use order::OrderIntent;
