//! The two-check gate

use std::sync::Arc;
use std::time::Duration;

use super::phrases::GuardrailPhrases;
use super::verdict::{CheckKind, GateOutcome, GuardrailVerdict, Verifier};
use crate::config::TimeoutSettings;
use crate::context::{ContextField, ContextStore};
use crate::error::TriageResult;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::remote::bounded_retry_once;
use crate::{log_debug, log_info};

/// Runs the resource-group check, then the resource check
pub struct GuardrailGate {
    phrases: GuardrailPhrases,
    verifier: Arc<dyn Verifier>,
    timeout: Duration,
    logger: SharedLogger,
}

impl GuardrailGate {
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        Self {
            phrases: GuardrailPhrases::default(),
            verifier,
            timeout: TimeoutSettings::default().verification(),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_phrases(mut self, phrases: GuardrailPhrases) -> Self {
        self.phrases = phrases;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn phrases(&self) -> &GuardrailPhrases {
        &self.phrases
    }

    /// Evaluate `text` against `context`
    ///
    /// Confirmed names are written to the context before returning; a
    /// tripped check writes nothing.
    pub async fn evaluate(&self, text: &str, context: &ContextStore) -> TriageResult<GateOutcome> {
        let mut verdicts = Vec::with_capacity(2);
        for check in [CheckKind::ResourceGroup, CheckKind::Resource] {
            let verdict = self.run_check(check, text, context).await?;
            if !verdict.exists {
                log_info!(self.logger, "[GuardrailGate] {} check tripped: {}", check, verdict.reasoning);
                return Ok(GateOutcome::Tripped(verdict));
            }
            if verdict.verified {
                self.record(&verdict, context);
            }
            verdicts.push(verdict);
        }
        Ok(GateOutcome::Pass(verdicts))
    }

    async fn run_check(
        &self,
        check: CheckKind,
        text: &str,
        context: &ContextStore,
    ) -> TriageResult<GuardrailVerdict> {
        if let Some(reason) = self.skip_reason(check, text, context) {
            log_debug!(self.logger, "[GuardrailGate] {} check skipped: {}", check, reason);
            return Ok(GuardrailVerdict::skipped(check, reason));
        }

        let operation = format!("verify {}", check);
        log_debug!(self.logger, "[GuardrailGate] {} check needs verification", check);
        bounded_retry_once(&operation, self.timeout, self.logger.as_ref(), || {
            self.verifier.verify(check, context, text)
        })
        .await
    }

    fn skip_reason(&self, check: CheckKind, text: &str, context: &ContextStore) -> Option<&'static str> {
        let phrases = &self.phrases;
        match check {
            CheckKind::ResourceGroup => {
                if phrases.is_generic_group_query(text) {
                    Some("generic request")
                } else if context.has(ContextField::GroupName) && phrases.is_same_scope(text) {
                    Some("same-scope follow-up")
                } else if !phrases.mentions_group(text) {
                    Some("no resource group mentioned")
                } else {
                    None
                }
            }
            CheckKind::Resource => {
                let has_scope =
                    context.has(ContextField::ResourceName) || context.has(ContextField::GroupName);
                if phrases.is_generic_resource_query(text) {
                    Some("generic request")
                } else if has_scope && phrases.is_same_scope(text) {
                    Some("same-scope follow-up")
                } else if !phrases.mentions_resource(text) {
                    Some("no resource mentioned")
                } else {
                    None
                }
            }
        }
    }

    /// Persist a confirmed name
    ///
    /// A different confirmed group replaces the old one and drops the
    /// resource and pool that belonged to it.
    fn record(&self, verdict: &GuardrailVerdict, context: &ContextStore) {
        let name = verdict.resolved_name.trim();
        if name.is_empty() {
            return;
        }
        let field = verdict.check.field();
        match context.get(field) {
            None => {
                context.set_if_absent(field, name);
            }
            Some(current) if current == name => {}
            Some(current) => {
                log_info!(
                    self.logger,
                    "[GuardrailGate] {} changed from '{}' to '{}'",
                    verdict.check,
                    current,
                    name
                );
                context.replace(field, name);
                if field == ContextField::GroupName {
                    context.clear(ContextField::ResourceName);
                    context.clear(ContextField::PoolName);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriageError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns canned verdicts and counts calls per check
    struct ScriptedVerifier {
        calls: AtomicUsize,
        seen: Mutex<Vec<CheckKind>>,
        group: Option<GuardrailVerdict>,
        resource: Option<GuardrailVerdict>,
    }

    impl ScriptedVerifier {
        fn new(group: Option<GuardrailVerdict>, resource: Option<GuardrailVerdict>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                group,
                resource,
            })
        }
    }

    #[async_trait]
    impl Verifier for ScriptedVerifier {
        async fn verify(
            &self,
            check: CheckKind,
            _context: &ContextStore,
            _text: &str,
        ) -> TriageResult<GuardrailVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(check);
            let canned = match check {
                CheckKind::ResourceGroup => self.group.clone(),
                CheckKind::Resource => self.resource.clone(),
            };
            canned.ok_or_else(|| TriageError::Tool("unexpected verification".into()))
        }
    }

    #[tokio::test]
    async fn test_generic_phrase_skips_verification() {
        let verifier = ScriptedVerifier::new(None, None);
        let gate = GuardrailGate::new(verifier.clone());
        let outcome = gate
            .evaluate("List all subscriptions I have access to", &ContextStore::new())
            .await
            .unwrap();
        match outcome {
            GateOutcome::Pass(verdicts) => {
                assert_eq!(verdicts.len(), 2);
                assert!(verdicts.iter().all(|v| v.exists && !v.verified));
            }
            other => panic!("expected pass, got {:?}", other),
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_group_keyword_verifies_once_and_records() {
        let verifier = ScriptedVerifier::new(
            Some(GuardrailVerdict::found(CheckKind::ResourceGroup, "Sales-RG", "found")),
            None,
        );
        let gate = GuardrailGate::new(verifier.clone());
        let context = ContextStore::new();
        let outcome = gate
            .evaluate("show the locks in resource group sales-rg", &context)
            .await
            .unwrap();
        assert!(outcome.is_pass());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*verifier.seen.lock(), vec![CheckKind::ResourceGroup]);
        assert_eq!(context.get(ContextField::GroupName).as_deref(), Some("Sales-RG"));
    }

    #[tokio::test]
    async fn test_missing_group_trips_and_writes_nothing() {
        let verifier = ScriptedVerifier::new(
            Some(GuardrailVerdict::not_found(
                CheckKind::ResourceGroup,
                "marketing-rg",
                "Resource group 'marketing-rg' does not exist.",
            )),
            None,
        );
        let gate = GuardrailGate::new(verifier.clone());
        let context = ContextStore::new();
        let outcome = gate
            .evaluate("list pipelines in resource group marketing-rg", &context)
            .await
            .unwrap();
        match outcome {
            GateOutcome::Tripped(verdict) => {
                assert_eq!(verdict.check, CheckKind::ResourceGroup);
                assert!(verdict.reasoning.contains("does not exist"));
            }
            other => panic!("expected trip, got {:?}", other),
        }
        assert!(!context.has(ContextField::GroupName));
    }

    #[tokio::test]
    async fn test_same_scope_follow_up_needs_context() {
        let verifier = ScriptedVerifier::new(
            None,
            Some(GuardrailVerdict::found(CheckKind::Resource, "adf-prod", "found")),
        );
        let gate = GuardrailGate::new(verifier.clone());

        let scoped = ContextStore::new();
        scoped.set_if_absent(ContextField::GroupName, "SQL-RG");
        let text = "test the linked service in the same data factory";
        assert!(gate.evaluate(text, &scoped).await.unwrap().is_pass());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);

        // without a scope in context the resource keyword forces verification
        let empty = ContextStore::new();
        assert!(gate.evaluate(text, &empty).await.unwrap().is_pass());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(empty.get(ContextField::ResourceName).as_deref(), Some("adf-prod"));
    }

    #[tokio::test]
    async fn test_confirmed_new_group_replaces_scope() {
        let verifier = ScriptedVerifier::new(
            Some(GuardrailVerdict::found(CheckKind::ResourceGroup, "rg-new", "found")),
            None,
        );
        let gate = GuardrailGate::new(verifier);
        let context = ContextStore::new();
        context.set_if_absent(ContextField::GroupName, "rg-old");
        context.set_if_absent(ContextField::ResourceName, "adf-old");

        gate.evaluate("now look at resource group rg-new", &context).await.unwrap();
        assert_eq!(context.get(ContextField::GroupName).as_deref(), Some("rg-new"));
        assert!(!context.has(ContextField::ResourceName));
    }

    #[tokio::test]
    async fn test_verifier_errors_propagate() {
        let verifier = ScriptedVerifier::new(None, None);
        let gate = GuardrailGate::new(verifier.clone());
        let err = gate
            .evaluate("restart vault kv-prod", &ContextStore::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TriageError::Tool(_)));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_phrases() {
        let verifier = ScriptedVerifier::new(None, None);
        let phrases = GuardrailPhrases {
            generic_resource_queries: vec!["inventory".to_string()],
            ..GuardrailPhrases::default()
        };
        let gate = GuardrailGate::new(verifier.clone()).with_phrases(phrases);
        assert!(gate
            .evaluate("inventory of every key vault", &ContextStore::new())
            .await
            .unwrap()
            .is_pass());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    /// First build outlasts the build bound; later builds are immediate
    struct SlowFirstBuilder {
        inner: crate::handlers::CannedHandlerBuilder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl crate::handlers::HandlerBuilder for SlowFirstBuilder {
        async fn build(
            &self,
            params: &crate::handlers::HandlerParams,
            auth: Arc<crate::auth::TokenCache>,
        ) -> TriageResult<Arc<dyn crate::handlers::ResourceHandle>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(45)).await;
            }
            self.inner.build(params, auth).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_retry_fits_inside_verification_bound() {
        use crate::auth::{StaticCredential, TokenCache};
        use crate::guardrail::ListingVerifier;
        use crate::handlers::{CannedHandlerBuilder, HandlerFactory, HandlerKind};

        let builder = Arc::new(SlowFirstBuilder {
            inner: CannedHandlerBuilder::new().with_names(HandlerKind::ResourceGroups, &["rg-data"]),
            calls: AtomicUsize::new(0),
        });
        let factory = Arc::new(HandlerFactory::new(builder.clone()));
        let gate = GuardrailGate::new(Arc::new(ListingVerifier::new(factory)));
        let context = ContextStore::with_auth(Arc::new(TokenCache::new(
            Arc::new(StaticCredential::new("tok", Duration::from_secs(3600))),
            "scope",
        )));
        context.set_if_absent(ContextField::AccountId, "sub-00001234");

        let outcome = gate
            .evaluate("show the locks in resource group rg-data", &context)
            .await
            .unwrap();

        assert!(outcome.is_pass());
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(context.get(ContextField::GroupName).as_deref(), Some("rg-data"));
    }
}
