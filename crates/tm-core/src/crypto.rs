//! # 자격증명 금고 암호화 모듈
//!
//! 사용자 패스프레이즈에서 유도한 키로 거래소 자격증명을
//! 암호화/복호화합니다.
//!
//! ## 보안 고려사항
//! - 키는 PBKDF2-HMAC-SHA256 (100,000회 반복)으로 유도하여 무차별 대입을
//!   늦추기 위해 의도적으로 느리게 설계
//! - 암호화마다 새로운 salt (16바이트)와 nonce (12바이트) 사용, 재사용 금지
//! - 패스프레이즈 검증은 AES-GCM 인증 태그가 유일한 수단 (별도 체크 없음)

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::CredentialSet;

/// 암호화 에러
#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// 잘못된 패스프레이즈 또는 변조된 암호문 (GCM 태그 불일치)
    #[error("Incorrect passphrase or data corrupted")]
    AuthenticationFailed,

    /// 저장된 블롭 자체가 손상됨 (base64, 길이, JSON 형식)
    #[error("Corrupted encrypted configuration: {0}")]
    Corrupted(String),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),
}

/// PBKDF2 반복 횟수
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// salt 크기 (바이트)
pub const SALT_SIZE: usize = 16;

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// 영속화되는 암호화 블롭.
///
/// salt/iv/data는 모두 base64 문자열로 저장됩니다. 전체 덮어쓰기
/// 외에는 불변입니다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// PBKDF2 salt (base64, 16바이트)
    pub salt: String,
    /// AES-GCM nonce (base64, 12바이트)
    pub iv: String,
    /// 암호문 (base64)
    pub data: String,
}

/// 패스프레이즈 기반 자격증명 암호화기.
pub struct PassphraseCipher {
    iterations: u32,
}

impl Default for PassphraseCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseCipher {
    /// 기본 반복 횟수(100,000회)로 생성.
    pub fn new() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }

    /// 반복 횟수를 지정하여 생성 (테스트용).
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// 패스프레이즈 + salt에서 256비트 키 유도.
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, self.iterations, &mut key);
        key
    }

    /// 자격증명 집합을 암호화합니다.
    ///
    /// 호출마다 새로운 salt와 nonce를 생성하므로 동일한 평문이라도
    /// 결과 암호문은 매번 다릅니다.
    pub fn encrypt(
        &self,
        set: &CredentialSet,
        passphrase: &str,
    ) -> Result<EncryptedBlob, CryptoError> {
        use base64::Engine;

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(passphrase, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let plaintext = serde_json::to_vec(set)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let b64 = base64::engine::general_purpose::STANDARD;
        Ok(EncryptedBlob {
            salt: b64.encode(salt),
            iv: b64.encode(nonce_bytes),
            data: b64.encode(ciphertext),
        })
    }

    /// 암호화 블롭을 복호화합니다.
    ///
    /// # Errors
    /// - 패스프레이즈가 틀리거나 암호문이 변조된 경우
    ///   [`CryptoError::AuthenticationFailed`]
    /// - 블롭 형식이 깨진 경우 [`CryptoError::Corrupted`]
    pub fn decrypt(
        &self,
        blob: &EncryptedBlob,
        passphrase: &str,
    ) -> Result<CredentialSet, CryptoError> {
        use base64::Engine;

        let b64 = base64::engine::general_purpose::STANDARD;
        let salt = b64.decode(&blob.salt)?;
        let nonce_bytes = b64.decode(&blob.iv)?;
        let ciphertext = b64.decode(&blob.data)?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::Corrupted(format!(
                "invalid nonce length: {}",
                nonce_bytes.len()
            )));
        }

        let key = self.derive_key(passphrase, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::Corrupted(e.to_string()))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Corrupted(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 테스트에서는 반복 횟수를 줄여 실행 시간 단축
    fn test_cipher() -> PassphraseCipher {
        PassphraseCipher::with_iterations(1_000)
    }

    fn sample_set() -> CredentialSet {
        CredentialSet {
            binance_key: Some("bk".to_string()),
            binance_secret: Some("bs".to_string()),
            bybit_key: Some("yk".to_string()),
            bybit_secret: Some("ys".to_string()),
        }
    }

    #[test]
    fn test_round_trip() {
        let cipher = test_cipher();
        let set = sample_set();

        let blob = cipher.encrypt(&set, "hunter2").unwrap();
        let decrypted = cipher.decrypt(&blob, "hunter2").unwrap();

        assert_eq!(set, decrypted);
    }

    #[test]
    fn test_wrong_passphrase_rejected() {
        let cipher = test_cipher();
        let blob = cipher.encrypt(&sample_set(), "correct").unwrap();

        let result = cipher.decrypt(&blob, "wrong");
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_encryption() {
        let cipher = test_cipher();
        let set = sample_set();

        let a = cipher.encrypt(&set, "p").unwrap();
        let b = cipher.encrypt(&set, "p").unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        use base64::Engine;
        let cipher = test_cipher();
        let mut blob = cipher.encrypt(&sample_set(), "p").unwrap();

        let b64 = base64::engine::general_purpose::STANDARD;
        let mut bytes = b64.decode(&blob.data).unwrap();
        bytes[0] ^= 0xFF;
        blob.data = b64.encode(bytes);

        let result = cipher.decrypt(&blob, "p");
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_corrupted_base64_rejected() {
        let cipher = test_cipher();
        let mut blob = cipher.encrypt(&sample_set(), "p").unwrap();
        blob.iv = "%%%not-base64%%%".to_string();

        assert!(cipher.decrypt(&blob, "p").is_err());
    }

    #[test]
    fn test_partial_set_round_trip() {
        let cipher = test_cipher();
        let set = CredentialSet {
            bybit_key: Some("only-key".to_string()),
            ..CredentialSet::default()
        };

        let blob = cipher.encrypt(&set, "p").unwrap();
        let decrypted = cipher.decrypt(&blob, "p").unwrap();
        assert_eq!(decrypted.bybit_key.as_deref(), Some("only-key"));
        assert!(decrypted.binance_key.is_none());
    }
}
