//! # TradeMate Vault
//!
//! 거래소 자격증명의 영속 저장과 패스프레이즈 해석을 담당합니다.
//! 암호화 블롭/평문 폴백을 키-값 저장소에 보관하고, 비동기 UI
//! 표면을 가로지르는 대기-요청 조정 프로토콜로 패스프레이즈를
//! 해석합니다.

pub mod error;
pub mod resolver;
pub mod store;

pub use error::{VaultError, VaultResult};
pub use resolver::KeyResolver;
pub use store::{CredentialStore, FileStore, MemoryStore};
