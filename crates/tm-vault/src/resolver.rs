//! 자격증명 해석기.
//!
//! 요청 시점에 사용 가능한 자격증명 집합을 만들어 냅니다:
//! 평문 자격증명 우선, 다음은 세션에 캐시된 패스프레이즈, 마지막은
//! 대화형 패스프레이즈 프롬프트. 프롬프트는 한 번에 하나만 열리며
//! 그 사이 도착한 호출자는 전부 같은 결과를 공유합니다 (fan-in/out).

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use tm_core::{CredentialSet, OutboundEvent, PassphraseCipher, UiChannel};

use crate::error::{VaultError, VaultResult};
use crate::store::CredentialStore;

type Outcome = VaultResult<CredentialSet>;

/// 대기 중인 해석 요청 레지스트리.
///
/// 프롬프트 하나에 대해 대기하는 모든 호출자의 송신단을 모아 두고,
/// 해소/거부 시 전원에게 동일한 결과를 브로드캐스트합니다.
#[derive(Default)]
struct ResolverState {
    /// 세션 수명 동안만 유지되는 패스프레이즈 캐시. 복호화 실패 시 비움.
    cached_passphrase: Option<SecretString>,
    /// 진행 중인 프롬프트에 묶인 대기자들
    waiters: Vec<oneshot::Sender<Outcome>>,
    /// 대화형 프롬프트가 이미 떠 있는지 여부
    prompt_active: bool,
}

/// 자격증명 해석기.
pub struct KeyResolver<S: CredentialStore> {
    store: Arc<S>,
    channel: Arc<dyn UiChannel>,
    cipher: PassphraseCipher,
    /// 프롬프트 수신 확인 대기 한도
    prompt_ack_timeout: Duration,
    state: Mutex<ResolverState>,
}

impl<S: CredentialStore> KeyResolver<S> {
    pub fn new(store: Arc<S>, channel: Arc<dyn UiChannel>, prompt_ack_timeout: Duration) -> Self {
        Self {
            store,
            channel,
            cipher: PassphraseCipher::new(),
            prompt_ack_timeout,
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// 암호화기를 교체합니다 (테스트에서 반복 횟수 축소용).
    pub fn with_cipher(mut self, cipher: PassphraseCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// 사용 가능한 자격증명 집합을 해석합니다.
    ///
    /// 우선순위: 완전한 평문 → 부분 평문 (암호화 데이터보다 우선,
    /// 병합 없음) → 캐시된 패스프레이즈로 복호화 → 블롭 없으면 빈
    /// 집합 → 대화형 해석. 빈 필드는 호출자가 "해당 거래소 미설정"
    /// 으로 다뤄야 합니다.
    pub async fn resolve(&self) -> Outcome {
        let plain = self.store.load_plaintext().await?;
        if plain.is_complete() {
            debug!("Using plaintext credentials");
            return Ok(plain);
        }
        if plain.is_partial() {
            // 명시적 정책: 부분 평문이 어떤 암호화 데이터보다도 우선
            debug!("Using partial plaintext credentials");
            return Ok(plain);
        }

        let blob = self.store.load_blob().await?;

        let cached = { self.state.lock().await.cached_passphrase.clone() };
        if let (Some(pass), Some(blob)) = (cached, blob.as_ref()) {
            match self.cipher.decrypt(blob, pass.expose_secret()) {
                Ok(set) => return Ok(set),
                Err(e) => {
                    warn!(error = %e, "Cached passphrase no longer valid, clearing");
                    self.state.lock().await.cached_passphrase = None;
                }
            }
        }

        if blob.is_none() {
            debug!("No credentials configured (neither plaintext nor encrypted)");
            return Ok(CredentialSet::default());
        }

        self.resolve_interactive().await
    }

    /// 대화형 해석: 프롬프트 소유자가 되거나 기존 프롬프트에 합류.
    async fn resolve_interactive(&self) -> Outcome {
        let (tx, rx) = oneshot::channel();

        let is_owner = {
            let mut state = self.state.lock().await;
            state.waiters.push(tx);
            if state.prompt_active {
                debug!("Joining pending passphrase request");
                false
            } else {
                state.prompt_active = true;
                true
            }
        };

        if is_owner {
            info!("Requesting passphrase from UI surfaces");
            let acked = tokio::time::timeout(
                self.prompt_ack_timeout,
                self.channel.request_passphrase(),
            )
            .await
            .unwrap_or(false);

            if !acked {
                warn!("No UI surface acknowledged the passphrase request");
                self.reject_waiters(VaultError::NoPromptSurface).await;
            }
        }

        rx.await
            .map_err(|_| VaultError::Internal("resolver dropped before completion".to_string()))?
    }

    /// UI에서 도착한 패스프레이즈 응답을 처리합니다.
    ///
    /// 호출 흐름의 반환값이 아니라 비동기 메시지로 도착합니다. 빈 값
    /// 또는 부재는 취소로 간주해 대기자 전원을 거부합니다. 복호화
    /// 실패 시에는 에러만 브로드캐스트하고 큐를 남겨 재입력을
    /// 기다립니다.
    pub async fn submit_passphrase(&self, passphrase: Option<String>) {
        let passphrase = passphrase.filter(|p| !p.is_empty());
        let Some(passphrase) = passphrase else {
            info!("Passphrase entry canceled");
            self.reject_waiters(VaultError::PromptCanceled).await;
            return;
        };

        let blob = match self.store.load_blob().await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                warn!("Passphrase submitted but no encrypted configuration exists");
                self.channel
                    .broadcast(OutboundEvent::PassphraseError {
                        message: "No encrypted configuration found".to_string(),
                    })
                    .await;
                return;
            }
            Err(e) => {
                self.reject_waiters(e).await;
                return;
            }
        };

        match self.cipher.decrypt(&blob, &passphrase) {
            Ok(set) => {
                info!("Decryption successful, resolving queued requests");
                let waiters = {
                    let mut state = self.state.lock().await;
                    state.cached_passphrase = Some(SecretString::from(passphrase));
                    state.prompt_active = false;
                    std::mem::take(&mut state.waiters)
                };
                for waiter in waiters {
                    let _ = waiter.send(Ok(set.clone()));
                }
            }
            Err(e) => {
                // 치명적이지 않음. 사용자가 다시 제출할 수 있도록 큐 유지
                warn!(error = %e, "Decryption failed with provided passphrase");
                self.channel
                    .broadcast(OutboundEvent::PassphraseError {
                        message: "Incorrect passphrase".to_string(),
                    })
                    .await;
            }
        }
    }

    /// 대기자 전원에게 동일한 에러를 팬아웃하고 프롬프트를 닫습니다.
    async fn reject_waiters(&self, error: VaultError) {
        let waiters = {
            let mut state = self.state.lock().await;
            state.prompt_active = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    /// 현재 세션에 캐시된 패스프레이즈가 있는지 (진단용).
    pub async fn has_cached_passphrase(&self) -> bool {
        self.state.lock().await.cached_passphrase.is_some()
    }
}
