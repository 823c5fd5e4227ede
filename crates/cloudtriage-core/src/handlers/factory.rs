//! Memoizing handler factory

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use super::cache::BoundedCache;
use super::handle::{HandlerBuilder, ResourceHandle};
use super::kind::HandlerKind;
use super::params::{HandlerCacheKey, HandlerParams};
use crate::config::{HandlerCacheSettings, TimeoutSettings};
use crate::context::ContextStore;
use crate::error::TriageResult;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::remote::bounded_retry_once;
use crate::{log_debug, log_info, log_warn};

/// Per-key slot; its lock is held for the whole build
type HandleSlot = Arc<AsyncMutex<Option<Arc<dyn ResourceHandle>>>>;

/// Hands out at most one live handle per (kind, relevant context)
///
/// The cache lock is only held to find or insert the per-key slot; the
/// build runs under the slot's own lock, so concurrent callers for the
/// same key queue behind one build. A failed build drops its slot, and a
/// caller that was queued on a dropped slot starts over from the cache.
pub struct HandlerFactory {
    builder: Arc<dyn HandlerBuilder>,
    slots: Mutex<BoundedCache<HandlerCacheKey, HandleSlot>>,
    build_timeout: Duration,
    builds: AtomicUsize,
    logger: SharedLogger,
}

impl HandlerFactory {
    pub fn new(builder: Arc<dyn HandlerBuilder>) -> Self {
        Self::with_settings(
            builder,
            &HandlerCacheSettings::default(),
            &TimeoutSettings::default(),
        )
    }

    pub fn with_settings(
        builder: Arc<dyn HandlerBuilder>,
        cache: &HandlerCacheSettings,
        timeouts: &TimeoutSettings,
    ) -> Self {
        Self {
            builder,
            slots: Mutex::new(BoundedCache::new(cache.capacity, cache.ttl())),
            build_timeout: timeouts.handler_build(),
            builds: AtomicUsize::new(0),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Handle for `kind` built from the current context
    pub async fn get_handler(
        &self,
        kind: HandlerKind,
        context: &ContextStore,
    ) -> TriageResult<Arc<dyn ResourceHandle>> {
        let params = HandlerParams::from_snapshot(kind, &context.snapshot())?;
        let key = params.cache_key();

        loop {
            let slot = self.slot_for(&key, &params);
            let mut built = slot.lock().await;
            if let Some(handle) = built.as_ref() {
                log_debug!(self.logger, "[HandlerFactory] cache hit ({})", params.redacted());
                return Ok(handle.clone());
            }
            if !self.is_current(&key, &slot) {
                log_debug!(self.logger, "[HandlerFactory] slot dropped while waiting ({})", params.redacted());
                continue;
            }

            let operation = format!("build {} handler", kind);
            let auth = context.ensure_auth();
            self.builds.fetch_add(1, Ordering::SeqCst);
            log_info!(self.logger, "[HandlerFactory] building handler ({})", params.redacted());
            let result = bounded_retry_once(&operation, self.build_timeout, self.logger.as_ref(), || {
                self.builder.build(&params, auth.clone())
            })
            .await;

            return match result {
                Ok(handle) => {
                    *built = Some(handle.clone());
                    Ok(handle)
                }
                Err(e) => {
                    log_warn!(self.logger, "[HandlerFactory] build failed ({}): {}", params.redacted(), e);
                    // still under the slot lock, so queued callers see the drop
                    self.slots.lock().remove_if(&key, |s| Arc::ptr_eq(s, &slot));
                    Err(e)
                }
            };
        }
    }

    /// Cache misses that started a build, since creation
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn cached_len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Drop every cached handle
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    fn slot_for(&self, key: &HandlerCacheKey, params: &HandlerParams) -> HandleSlot {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key, now) {
            return slot;
        }
        let slot: HandleSlot = Arc::new(AsyncMutex::new(None));
        if let Some(evicted) = slots.insert(key.clone(), slot.clone(), now) {
            log_debug!(self.logger, "[HandlerFactory] evicted {} handler", evicted.kind);
        }
        log_debug!(self.logger, "[HandlerFactory] cache miss ({})", params.redacted());
        slot
    }

    fn is_current(&self, key: &HandlerCacheKey, slot: &HandleSlot) -> bool {
        self.slots.lock().peek(key).is_some_and(|s| Arc::ptr_eq(s, slot))
    }
}

impl std::fmt::Debug for HandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFactory")
            .field("cached", &self.cached_len())
            .field("builds", &self.build_count())
            .field("build_timeout", &self.build_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticCredential, TokenCache};
    use crate::context::ContextField;
    use crate::error::TriageError;
    use crate::handlers::{OperationSpec, ResourceHandle};
    use crate::logging::MemoryLogger;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FakeHandle(HandlerKind);

    #[async_trait]
    impl ResourceHandle for FakeHandle {
        fn kind(&self) -> HandlerKind {
            self.0
        }

        fn operations(&self) -> Vec<OperationSpec> {
            vec![OperationSpec::new("list", "list", json!({"type": "object"}))]
        }

        async fn invoke(&self, _operation: &str, _args: Value) -> TriageResult<Value> {
            Ok(json!({"value": []}))
        }
    }

    #[derive(Default)]
    struct FakeBuilder {
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail_first: bool,
    }

    #[async_trait]
    impl HandlerBuilder for FakeBuilder {
        async fn build(
            &self,
            params: &HandlerParams,
            auth: Arc<TokenCache>,
        ) -> TriageResult<Arc<dyn ResourceHandle>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_first && n == 0 {
                return Err(TriageError::remote("build", params.redacted(), "boom"));
            }
            auth.get_token().await?;
            Ok(Arc::new(FakeHandle(params.kind())))
        }
    }

    fn context() -> ContextStore {
        let auth = Arc::new(TokenCache::new(
            Arc::new(StaticCredential::new("tok", Duration::from_secs(3600))),
            "scope",
        ));
        let ctx = ContextStore::with_auth(auth);
        ctx.set_if_absent(ContextField::AccountId, "sub-00001234");
        ctx.set_if_absent(ContextField::GroupName, "rg-data");
        ctx.set_if_absent(ContextField::ResourceName, "adf-prod");
        ctx
    }

    #[tokio::test]
    async fn test_same_context_same_instance() {
        let builder = Arc::new(FakeBuilder::default());
        let factory = HandlerFactory::new(builder.clone());
        let ctx = context();

        let first = factory.get_handler(HandlerKind::AdfPipelines, &ctx).await.unwrap();
        let second = factory.get_handler(HandlerKind::AdfPipelines, &ctx).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_changed_field_builds_new_instance() {
        let factory = HandlerFactory::new(Arc::new(FakeBuilder::default()));
        let ctx = context();
        let first = factory.get_handler(HandlerKind::KeyVault, &ctx).await.unwrap();

        ctx.replace(ContextField::ResourceName, "kv-other");
        let second = factory.get_handler(HandlerKind::KeyVault, &ctx).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.build_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_parameter_builds_nothing() {
        let factory = HandlerFactory::new(Arc::new(FakeBuilder::default()));
        let ctx = context();
        let err = factory.get_handler(HandlerKind::BatchPool, &ctx).await.err().unwrap();
        assert!(matches!(
            err,
            TriageError::MissingParameter { kind: HandlerKind::BatchPool, field: ContextField::PoolName }
        ));
        assert_eq!(factory.build_count(), 0);
        assert_eq!(factory.cached_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_builds_once() {
        let builder = Arc::new(FakeBuilder {
            delay: Some(Duration::from_millis(50)),
            ..FakeBuilder::default()
        });
        let factory = Arc::new(HandlerFactory::new(builder.clone()));
        let ctx = Arc::new(context());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { factory.get_handler(HandlerKind::AdfTriggers, &ctx).await })
            })
            .collect();
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let builder = Arc::new(FakeBuilder {
            fail_first: true,
            ..FakeBuilder::default()
        });
        let logger = Arc::new(MemoryLogger::new());
        let factory = HandlerFactory::new(builder.clone()).with_logger(logger.clone());
        let ctx = context();

        assert!(factory.get_handler(HandlerKind::Locks, &ctx).await.is_err());
        assert_eq!(factory.cached_len(), 0);
        assert!(factory.get_handler(HandlerKind::Locks, &ctx).await.is_ok());
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
        assert!(!logger.contains("sub-00001234"));
        assert!(logger.contains("****1234"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callers_queued_behind_failed_build_share_one_handle() {
        let builder = Arc::new(FakeBuilder {
            delay: Some(Duration::from_millis(200)),
            fail_first: true,
            ..FakeBuilder::default()
        });
        let factory = HandlerFactory::new(builder.clone());
        let ctx = context();

        let (a, b, c) = tokio::join!(
            factory.get_handler(HandlerKind::KeyVault, &ctx),
            factory.get_handler(HandlerKind::KeyVault, &ctx),
            factory.get_handler(HandlerKind::KeyVault, &ctx)
        );
        let results = [a, b, c];
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        let handles: Vec<_> = results.into_iter().filter_map(|r| r.ok()).collect();
        assert!(Arc::ptr_eq(&handles[0], &handles[1]));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(factory.cached_len(), 1);

        // the surviving handle is the one a later caller finds
        let later = factory.get_handler(HandlerKind::KeyVault, &ctx).await.unwrap();
        assert!(Arc::ptr_eq(&later, &handles[0]));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_timeout_is_retried_once() {
        let builder = Arc::new(FakeBuilder {
            delay: Some(Duration::from_secs(120)),
            ..FakeBuilder::default()
        });
        let factory = HandlerFactory::new(builder.clone());
        let err = factory
            .get_handler(HandlerKind::Subscriptions, &context())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TriageError::RemoteTimeout { .. }));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let builder = Arc::new(FakeBuilder::default());
        let factory = HandlerFactory::with_settings(
            builder.clone(),
            &HandlerCacheSettings { capacity: 4, ttl_secs: 60 },
            &TimeoutSettings::default(),
        );
        let ctx = context();
        let first = factory.get_handler(HandlerKind::ResourceGroups, &ctx).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = factory.get_handler(HandlerKind::ResourceGroups, &ctx).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let builder = Arc::new(FakeBuilder::default());
        let factory = HandlerFactory::with_settings(
            builder.clone(),
            &HandlerCacheSettings { capacity: 2, ttl_secs: 3600 },
            &TimeoutSettings::default(),
        );
        let ctx = context();
        factory.get_handler(HandlerKind::AdfPipelines, &ctx).await.unwrap();
        factory.get_handler(HandlerKind::AdfTriggers, &ctx).await.unwrap();
        factory.get_handler(HandlerKind::AdfPipelines, &ctx).await.unwrap();
        factory.get_handler(HandlerKind::KeyVault, &ctx).await.unwrap();
        assert_eq!(factory.cached_len(), 2);
        assert_eq!(builder.calls.load(Ordering::SeqCst), 3);

        factory.get_handler(HandlerKind::AdfPipelines, &ctx).await.unwrap();
        assert_eq!(builder.calls.load(Ordering::SeqCst), 3);
        factory.get_handler(HandlerKind::AdfTriggers, &ctx).await.unwrap();
        assert_eq!(builder.calls.load(Ordering::SeqCst), 4);
    }
}
