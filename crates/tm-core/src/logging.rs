//! tracing 기반 로깅 인프라.
//!
//! 개발용 pretty 형식과 로그 집계용 json 형식을 지원합니다.
//! 주문 파이프라인의 각 단계는 심볼/방향/수량/원시 거래소 응답을
//! 로그로 남기지만, 로깅은 정확성 계약의 일부가 아닙니다.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// JSON 형식 (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 설정으로 로깅 시스템을 초기화합니다.
///
/// `RUST_LOG` 환경변수가 설정된 경우 설정 파일의 레벨보다 우선합니다.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let format: LogFormat = config.format.parse().unwrap_or_default();

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_target(true))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_target(true))
                .try_init()?;
        }
    }

    tracing::info!(format = ?format, level = %config.level, "Logging initialized");
    Ok(())
}

/// 환경변수에서 로깅을 초기화합니다 (`RUST_LOG`, `LOG_FORMAT`).
pub fn init_logging_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggingConfig {
        level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
    };
    init_logging(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("invalid".parse::<LogFormat>().is_err());
    }
}
