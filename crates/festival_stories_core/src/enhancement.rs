//! crates/festival_stories_core/src/enhancement.rs
//!
//! Routes calls to the AI collaborators through the key rotation manager:
//! picks the credential, records usage, rotates on rate limits, and logs what
//! the rotation policy decided.

use crate::key_rotation::{ApiCredential, KeyRotationManager, KeyStatus, RotationEvent};
use crate::ports::{
    EnhancedText, EnhancementRequest, OrganizeRequest, OrganizedStory, PortError, PortResult,
    SectionOrganizerService, TextEnhancementService,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

const EXHAUSTED: &str = "all configured API keys have reached their rate limits";

/// Process-wide entry point for enhancement and section organization.
pub struct EnhancementGateway {
    rotation: Mutex<KeyRotationManager>,
    enhancer: Arc<dyn TextEnhancementService>,
    organizer: Arc<dyn SectionOrganizerService>,
}

impl EnhancementGateway {
    pub fn new(
        rotation: KeyRotationManager,
        enhancer: Arc<dyn TextEnhancementService>,
        organizer: Arc<dyn SectionOrganizerService>,
    ) -> Self {
        Self {
            rotation: Mutex::new(rotation),
            enhancer,
            organizer,
        }
    }

    fn rotation(&self) -> MutexGuard<'_, KeyRotationManager> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// False when no credentials are configured; AI features are then unavailable.
    pub fn is_available(&self) -> bool {
        self.rotation().key_count() > 0
    }

    pub fn usage_status(&self) -> Vec<KeyStatus> {
        self.rotation().status()
    }

    pub async fn enhance_text(&self, request: &EnhancementRequest) -> PortResult<EnhancedText> {
        self.with_rotation("enhance_text", |credential| {
            let enhancer = self.enhancer.clone();
            let request = request.clone();
            async move { enhancer.enhance_text(&credential, &request).await }
        })
        .await
    }

    pub async fn organize_sections(&self, request: &OrganizeRequest) -> PortResult<OrganizedStory> {
        self.with_rotation("organize_sections", |credential| {
            let organizer = self.organizer.clone();
            let request = request.clone();
            async move { organizer.organize_sections(&credential, &request).await }
        })
        .await
    }

    /// Runs `call` with the current credential, trying each configured
    /// credential at most once while the service keeps answering with rate limits.
    async fn with_rotation<T, F, Fut>(&self, operation: &'static str, call: F) -> PortResult<T>
    where
        F: Fn(ApiCredential) -> Fut,
        Fut: Future<Output = PortResult<T>>,
    {
        let attempts = self.rotation().key_count();
        for _ in 0..attempts {
            let credential = self
                .rotation()
                .current_key()
                .cloned()
                .ok_or_else(|| PortError::Unavailable("no API keys are configured".to_string()))?;

            match call(credential.clone()).await {
                Ok(value) => {
                    let event = self.rotation().record_usage(true);
                    if let Some(event) = event {
                        log_rotation(&event);
                    }
                    return Ok(value);
                }
                Err(PortError::RateLimited(reason)) => {
                    self.rotation().record_usage(false);
                    warn!(operation, key = %credential.name, %reason, "API key hit its rate limit");
                    let event = self.rotation().handle_rate_limit_error();
                    log_rotation(&event);
                    if event == RotationEvent::Exhausted {
                        return Err(PortError::RateLimited(EXHAUSTED.to_string()));
                    }
                }
                Err(e) => {
                    self.rotation().record_usage(false);
                    warn!(operation, key = %credential.name, error = %e, "AI call failed");
                    return Err(e);
                }
            }
        }

        if attempts == 0 {
            Err(PortError::Unavailable("no API keys are configured".to_string()))
        } else {
            Err(PortError::RateLimited(EXHAUSTED.to_string()))
        }
    }
}

fn log_rotation(event: &RotationEvent) {
    match event {
        RotationEvent::ProactiveSwitch {
            from,
            to,
            from_requests,
            to_requests,
        } => info!(
            %from, %to, from_requests, to_requests,
            "Proactively switched API key to avoid rate limits"
        ),
        RotationEvent::ReactiveSwitch { from, to } => {
            warn!(%from, %to, "Switched API key after a rate limit rejection")
        }
        RotationEvent::Exhausted => warn!("{}", EXHAUSTED),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::key_rotation::UsageLedger;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// Rate-limits the listed key names, fails outright on `fail_all`.
    #[derive(Default)]
    pub(crate) struct ScriptedAi {
        pub limited: Vec<String>,
        pub fail_all: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedAi {
        fn respond(&self, credential: &ApiCredential) -> PortResult<()> {
            self.calls.lock().unwrap().push(credential.name.clone());
            if self.fail_all {
                return Err(PortError::Unexpected("model returned garbage".into()));
            }
            if self.limited.contains(&credential.name) {
                return Err(PortError::RateLimited("429 Too Many Requests".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TextEnhancementService for ScriptedAi {
        async fn enhance_text(
            &self,
            credential: &ApiCredential,
            request: &EnhancementRequest,
        ) -> PortResult<EnhancedText> {
            self.respond(credential)?;
            Ok(EnhancedText {
                cleaned_text: format!("{} (polished)", request.text),
                improvements_made: vec!["punctuation".into()],
                confidence_score: 0.9,
                cultural_notes: String::new(),
            })
        }
    }

    #[async_trait]
    impl SectionOrganizerService for ScriptedAi {
        async fn organize_sections(
            &self,
            credential: &ApiCredential,
            request: &OrganizeRequest,
        ) -> PortResult<OrganizedStory> {
            self.respond(credential)?;
            Ok(OrganizedStory {
                sections: Vec::new(),
                story_title: request.text.clone(),
                story_summary: String::new(),
            })
        }
    }

    fn fixed_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
    }

    pub(crate) fn gateway(key_names: &[&str], ai: Arc<ScriptedAi>) -> EnhancementGateway {
        let keys = key_names
            .iter()
            .map(|name| ApiCredential::new(*name, format!("sk-{}", name)))
            .collect();
        let rotation = KeyRotationManager::with_ledger(keys, UsageLedger::new(), fixed_day);
        EnhancementGateway::new(rotation, ai.clone(), ai)
    }

    fn request() -> EnhancementRequest {
        EnhancementRequest {
            text: "diya jale".into(),
            language: "Hindi".into(),
            context: "festival story".into(),
        }
    }

    #[tokio::test]
    async fn unavailable_without_keys() {
        let gateway = gateway(&[], Arc::new(ScriptedAi::default()));
        assert!(!gateway.is_available());
        assert!(matches!(
            gateway.enhance_text(&request()).await,
            Err(PortError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn rate_limit_rotates_and_retries_with_next_key() {
        let ai = Arc::new(ScriptedAi {
            limited: vec!["Primary".into()],
            ..Default::default()
        });
        let gateway = gateway(&["Primary", "Secondary"], ai.clone());

        let enhanced = gateway.enhance_text(&request()).await.unwrap();

        assert_eq!(enhanced.cleaned_text, "diya jale (polished)");
        assert_eq!(*ai.calls.lock().unwrap(), vec!["Primary", "Secondary"]);
        let status = gateway.usage_status();
        assert_eq!((status[0].requests, status[0].errors), (1, 1));
        assert!(status[1].active);
    }

    #[tokio::test]
    async fn exhaustion_is_reported_after_every_key_was_tried() {
        let ai = Arc::new(ScriptedAi {
            limited: vec!["Primary".into(), "Secondary".into()],
            ..Default::default()
        });
        let gateway = gateway(&["Primary", "Secondary"], ai.clone());

        let request = OrganizeRequest {
            text: "story".into(),
            num_sections: 2,
            language: "Hindi".into(),
        };
        let result = gateway.organize_sections(&request).await;

        assert!(matches!(result, Err(PortError::RateLimited(_))));
        assert_eq!(ai.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn single_key_rate_limit_is_exhaustion() {
        let ai = Arc::new(ScriptedAi {
            limited: vec!["Primary".into()],
            ..Default::default()
        });
        let gateway = gateway(&["Primary"], ai);
        assert!(matches!(
            gateway.enhance_text(&request()).await,
            Err(PortError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn other_failures_do_not_rotate() {
        let ai = Arc::new(ScriptedAi {
            fail_all: true,
            ..Default::default()
        });
        let gateway = gateway(&["Primary", "Secondary"], ai.clone());

        assert!(matches!(
            gateway.enhance_text(&request()).await,
            Err(PortError::Unexpected(_))
        ));
        assert_eq!(ai.calls.lock().unwrap().len(), 1);
        assert!(gateway.usage_status()[0].active);
    }
}
