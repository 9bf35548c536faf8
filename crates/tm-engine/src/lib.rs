//! 주문 실행 엔진.
//!
//! 인바운드 프로토콜 디스패치, 세션 상태, 거래소별 주문
//! 파이프라인을 제공합니다.

pub mod engine;
pub mod session;

pub use engine::Engine;
pub use session::Session;
