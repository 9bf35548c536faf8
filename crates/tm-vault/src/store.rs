//! 자격증명 영속 저장소.
//!
//! 암호화 블롭은 `encryptedConfig` 키 아래, 평문 폴백 자격증명은
//! 네 개의 고정 키 아래 저장됩니다. 같은 문서가 UI 위치 설정 같은
//! 무관한 키도 나를 수 있으므로, 다시 쓸 때 모르는 키는 보존합니다.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use tm_core::{CredentialSet, EncryptedBlob};

use crate::error::{VaultError, VaultResult};

/// 암호화 블롭 저장 키.
pub const ENCRYPTED_CONFIG_KEY: &str = "encryptedConfig";

/// 평문 자격증명 저장 키 (CredentialSet 직렬화 키와 동일).
pub const PLAINTEXT_KEYS: [&str; 4] = ["binanceKey", "binanceSecret", "bybitKey", "bybitSecret"];

/// 자격증명 저장소 trait.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 암호화 블롭을 통째로 덮어씁니다.
    async fn save_blob(&self, blob: &EncryptedBlob) -> VaultResult<()>;

    /// 암호화 블롭을 읽습니다. 저장된 적 없으면 `None`.
    async fn load_blob(&self) -> VaultResult<Option<EncryptedBlob>>;

    /// 평문 자격증명을 통째로 덮어씁니다 (None 필드는 삭제).
    async fn save_plaintext(&self, set: &CredentialSet) -> VaultResult<()>;

    /// 평문 자격증명을 읽습니다. 없는 필드는 `None`으로 남습니다.
    async fn load_plaintext(&self) -> VaultResult<CredentialSet>;
}

// ==================== 파일 저장소 ====================

/// JSON 문서 하나에 모든 키를 담는 파일 저장소.
pub struct FileStore {
    path: PathBuf,
    /// 문서 전체를 읽고-수정-쓰기 하므로 쓰기끼리 직렬화
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> VaultResult<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| VaultError::Storage(format!("corrupted store document: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(VaultError::Storage(e.to_string())),
        }
    }

    async fn write_document(&self, doc: &Map<String, Value>) -> VaultResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn save_blob(&self, blob: &EncryptedBlob) -> VaultResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.insert(
            ENCRYPTED_CONFIG_KEY.to_string(),
            serde_json::to_value(blob).map_err(|e| VaultError::Storage(e.to_string()))?,
        );
        self.write_document(&doc).await?;
        debug!(path = %self.path.display(), "Encrypted blob saved");
        Ok(())
    }

    async fn load_blob(&self) -> VaultResult<Option<EncryptedBlob>> {
        let doc = self.read_document().await?;
        match doc.get(ENCRYPTED_CONFIG_KEY) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| VaultError::Storage(format!("corrupted encrypted config: {}", e))),
            None => Ok(None),
        }
    }

    async fn save_plaintext(&self, set: &CredentialSet) -> VaultResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;

        let fields = serde_json::to_value(set)
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        for key in PLAINTEXT_KEYS {
            match fields.get(key) {
                Some(value) => {
                    doc.insert(key.to_string(), value.clone());
                }
                None => {
                    doc.remove(key);
                }
            }
        }

        self.write_document(&doc).await
    }

    async fn load_plaintext(&self) -> VaultResult<CredentialSet> {
        let doc = self.read_document().await?;
        let mut fields = Map::new();
        for key in PLAINTEXT_KEYS {
            if let Some(value) = doc.get(key) {
                fields.insert(key.to_string(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| VaultError::Storage(format!("corrupted plaintext keys: {}", e)))
    }
}

// ==================== 인메모리 저장소 ====================

/// 테스트 및 임베딩용 인메모리 저장소.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    blob: Option<EncryptedBlob>,
    plaintext: CredentialSet,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn save_blob(&self, blob: &EncryptedBlob) -> VaultResult<()> {
        self.inner.lock().await.blob = Some(blob.clone());
        Ok(())
    }

    async fn load_blob(&self) -> VaultResult<Option<EncryptedBlob>> {
        Ok(self.inner.lock().await.blob.clone())
    }

    async fn save_plaintext(&self, set: &CredentialSet) -> VaultResult<()> {
        self.inner.lock().await.plaintext = set.clone();
        Ok(())
    }

    async fn load_plaintext(&self) -> VaultResult<CredentialSet> {
        Ok(self.inner.lock().await.plaintext.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_core::PassphraseCipher;

    fn temp_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_blob_round_trip() {
        let (_dir, store) = temp_store();
        assert!(store.load_blob().await.unwrap().is_none());

        let cipher = PassphraseCipher::with_iterations(100);
        let blob = cipher.encrypt(&CredentialSet::default(), "p").unwrap();
        store.save_blob(&blob).await.unwrap();

        assert_eq!(store.load_blob().await.unwrap(), Some(blob));
    }

    #[tokio::test]
    async fn test_plaintext_overwrite_removes_cleared_fields() {
        let (_dir, store) = temp_store();

        let full = CredentialSet {
            binance_key: Some("bk".to_string()),
            binance_secret: Some("bs".to_string()),
            bybit_key: Some("yk".to_string()),
            bybit_secret: Some("ys".to_string()),
        };
        store.save_plaintext(&full).await.unwrap();
        assert!(store.load_plaintext().await.unwrap().is_complete());

        let partial = CredentialSet {
            bybit_key: Some("yk2".to_string()),
            ..CredentialSet::default()
        };
        store.save_plaintext(&partial).await.unwrap();

        let loaded = store.load_plaintext().await.unwrap();
        assert_eq!(loaded.bybit_key.as_deref(), Some("yk2"));
        assert!(loaded.binance_key.is_none());
        assert!(loaded.binance_secret.is_none());
    }

    #[tokio::test]
    async fn test_unrelated_document_keys_preserved() {
        let (dir, store) = temp_store();
        let path = dir.path().join("store.json");

        // UI 위치 설정 같은 무관한 키가 이미 있는 문서
        tokio::fs::write(&path, br#"{"panelPosition":{"x":10,"y":20}}"#)
            .await
            .unwrap();

        let set = CredentialSet {
            binance_key: Some("bk".to_string()),
            ..CredentialSet::default()
        };
        store.save_plaintext(&set).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["panelPosition"]["x"], 10);
        assert_eq!(doc["binanceKey"], "bk");
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        let set = store.load_plaintext().await.unwrap();
        assert!(set.is_empty());
    }
}
