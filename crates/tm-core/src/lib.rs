//! # TradeMate Core
//!
//! 자격증명 금고와 주문 실행 코어가 공유하는 기반 타입을 제공합니다:
//! - 시장/주문/자격증명 도메인 모델
//! - 패스프레이즈 기반 금고 암호화 (PBKDF2 + AES-256-GCM)
//! - UI 협력자와의 메시지 프로토콜 계약
//! - 설정 관리 및 로깅 인프라

pub mod config;
pub mod crypto;
pub mod domain;
pub mod logging;
pub mod protocol;

pub use config::AppConfig;
pub use crypto::{CryptoError, EncryptedBlob, PassphraseCipher};
pub use domain::*;
pub use logging::{init_logging, init_logging_from_env, LogFormat};
pub use protocol::{InboundMessage, OutboundEvent, UiChannel};
