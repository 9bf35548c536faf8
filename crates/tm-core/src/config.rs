//! 설정 관리.
//!
//! 기본값 ← 선택적 TOML 파일 ← `TM_` 접두사 환경변수 순으로
//! 겹쳐서 로드합니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 자격증명 금고 설정
    pub vault: VaultConfig,
    /// Binance 엔드포인트
    pub binance: BinanceConfig,
    /// Bybit 엔드포인트
    pub bybit: BybitConfig,
    /// 실행 엔진 설정
    pub engine: EngineConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터 (예: "info", "tm_engine=debug")
    pub level: String,
    /// 출력 형식 (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 자격증명 금고 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// 키-값 저장 파일 경로
    pub store_path: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("trademate-store.json"),
        }
    }
}

/// Binance 엔드포인트 설정 (선물).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BinanceConfig {
    /// REST API 기본 URL
    pub rest_url: String,
    /// 마크 가격 WebSocket 기본 URL
    pub ws_url: String,
    /// 수신 윈도우 (밀리초)
    pub recv_window_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://fapi.binance.com".to_string(),
            ws_url: "wss://fstream.binance.com/ws".to_string(),
            recv_window_ms: 5000,
        }
    }
}

/// Bybit 엔드포인트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BybitConfig {
    /// 호스트 폴백 순서 (레이트 리밋/오결제 호스트 대비)
    pub hosts: Vec<String>,
    /// 수신 윈도우 (밀리초)
    pub recv_window_ms: u64,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            hosts: vec![
                "https://api.bybit.com".to_string(),
                "https://api-testnet.bybit.com".to_string(),
            ],
            recv_window_ms: 5000,
        }
    }
}

/// 실행 엔진 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 진입 주문 후 보호 주문 부착 전 대기 시간 (밀리초, Bybit)
    ///
    /// 포지션이 등록될 때까지의 고정 대기 휴리스틱입니다. 보장이
    /// 아니므로 운영에서는 포지션 상태 폴링으로 대체할 여지가 있음.
    pub settle_delay_ms: u64,
    /// 패스프레이즈 프롬프트 수신 확인 대기 시간 (밀리초)
    pub prompt_ack_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 5000,
            prompt_ack_timeout_ms: 1000,
        }
    }
}

impl AppConfig {
    /// 설정 로드.
    ///
    /// # Errors
    /// 파일 파싱 또는 역직렬화에 실패하면 `ConfigError`를 반환합니다.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TM")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.binance.recv_window_ms, 5000);
        assert_eq!(cfg.bybit.hosts.len(), 2);
        assert_eq!(cfg.engine.settle_delay_ms, 5000);
        assert_eq!(cfg.engine.prompt_ack_timeout_ms, 1000);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[engine]\nsettle_delay_ms = 250\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.engine.settle_delay_ms, 250);
        assert_eq!(cfg.logging.level, "debug");
        // 파일에 없는 값은 기본값 유지
        assert_eq!(cfg.engine.prompt_ack_timeout_ms, 1000);
    }
}
