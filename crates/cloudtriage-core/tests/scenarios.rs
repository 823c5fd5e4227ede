//! End-to-end conversations against canned handlers and a scripted model

use std::sync::Arc;
use std::time::Duration;

use cloudtriage_core::{
    CannedHandlerBuilder, ContextField, ContextStore, HandlerFactory, HandlerKind, MemoryLogger,
    MockModel, Orchestrator, RouteOutcome, Settings, SpecialistKind, StaticCredential, TokenCache,
};
use serde_json::json;

const ACCOUNT: &str = "11111111-2222-3333-4444-555555555555";

struct Harness {
    orchestrator: Orchestrator,
    builder: Arc<CannedHandlerBuilder>,
    model: Arc<MockModel>,
    credential: Arc<StaticCredential>,
    logger: Arc<MemoryLogger>,
}

fn token_cache(credential: Arc<StaticCredential>) -> Arc<TokenCache> {
    Arc::new(TokenCache::new(credential, "https://management.azure.com/.default"))
}

async fn harness(builder: CannedHandlerBuilder, model: MockModel) -> Harness {
    let builder = Arc::new(builder);
    let model = Arc::new(model);
    let credential = Arc::new(StaticCredential::new("token", Duration::from_secs(3600)));
    let logger = Arc::new(MemoryLogger::new());
    let orchestrator = Orchestrator::assemble(
        &Settings::default(),
        token_cache(credential.clone()),
        builder.clone(),
        model.clone(),
        None,
        logger.clone(),
    )
    .await
    .unwrap();
    Harness {
        orchestrator,
        builder,
        model,
        credential,
        logger,
    }
}

fn invoked_kinds(builder: &CannedHandlerBuilder) -> Vec<HandlerKind> {
    builder.invocations().into_iter().map(|i| i.kind).collect()
}

#[tokio::test]
async fn list_subscriptions_needs_no_verification() {
    let h = harness(
        CannedHandlerBuilder::new().with_items(
            HandlerKind::Subscriptions,
            vec![json!({"subscriptionId": ACCOUNT, "displayName": "EDW Production"})],
        ),
        MockModel::new().then_tool("list_subscriptions", json!({})),
    )
    .await;
    let mut session = h.orchestrator.session();

    let reply = session.ask("List all subscriptions I have access to").await.unwrap();

    assert_eq!(reply.outcome, RouteOutcome::Answered);
    assert!(reply.text.contains("EDW Production"));
    // the only remote call is the listing itself
    assert_eq!(invoked_kinds(&h.builder), vec![HandlerKind::Subscriptions]);
    assert_eq!(h.model.requests().len(), 1);
}

#[tokio::test]
async fn same_scope_follow_up_reuses_context() {
    let h = harness(
        CannedHandlerBuilder::new().with_names(HandlerKind::AdfLinkedServices, &["ls_sql", "ls_blob"]),
        MockModel::new()
            .then_tool("transfer_to_adf_linked_services", json!({}))
            .then_tool("list_adf_linked_services", json!({})),
    )
    .await;
    let mut session = h.orchestrator.session();
    let ctx = session.context().clone();
    ctx.set_if_absent(ContextField::AccountId, ACCOUNT);
    ctx.set_if_absent(ContextField::GroupName, "SQL-RG");
    ctx.set_if_absent(ContextField::ResourceName, "adf-prod");

    let reply = session
        .ask("test the connection for linked service X in the same data factory")
        .await
        .unwrap();

    assert_eq!(reply.outcome, RouteOutcome::Handoff(SpecialistKind::AdfLinkedServices));
    assert_eq!(reply.text, "Found 2 data factory linked services: ls_sql, ls_blob");
    // no resource group or resource listing was needed
    assert_eq!(invoked_kinds(&h.builder), vec![HandlerKind::AdfLinkedServices]);
    assert_eq!(ctx.get(ContextField::GroupName), Some("SQL-RG".to_string()));
}

#[tokio::test]
async fn missing_group_halts_before_any_specialist() {
    let h = harness(
        CannedHandlerBuilder::new().with_names(HandlerKind::ResourceGroups, &["SQL-RG", "rg-data"]),
        MockModel::new().then_tool("transfer_to_locks", json!({})),
    )
    .await;
    let mut session = h.orchestrator.session();
    session.context().set_if_absent(ContextField::AccountId, ACCOUNT);

    let reply = session
        .ask("list the locks on resource group marketing-rg")
        .await
        .unwrap();

    match &reply.outcome {
        RouteOutcome::Halted(verdict) => {
            assert!(!verdict.exists);
            assert_eq!(verdict.resolved_name, "marketing-rg");
        }
        other => panic!("expected a halt, got {:?}", other),
    }
    assert_eq!(
        reply.text,
        "Resource group 'marketing-rg' was not found in subscription ****5555. Available: SQL-RG, rg-data."
    );
    assert!(h.model.requests().is_empty());
    assert_eq!(invoked_kinds(&h.builder), vec![HandlerKind::ResourceGroups]);
    assert!(!session.context().has(ContextField::GroupName));
}

#[tokio::test]
async fn named_group_without_subscription_halts() {
    let h = harness(CannedHandlerBuilder::new(), MockModel::new()).await;
    let mut session = h.orchestrator.session();

    let reply = session.ask("list the locks on resource group marketing-rg").await.unwrap();

    assert!(matches!(reply.outcome, RouteOutcome::Halted(_)));
    assert!(reply.text.contains("Which subscription should I use?"));
    assert!(session.context().snapshot().is_empty());
    assert_eq!(h.builder.builds(), 0);
}

#[tokio::test]
async fn confirmed_names_reach_the_specialist() {
    let h = harness(
        CannedHandlerBuilder::new()
            .with_names(HandlerKind::ResourceGroups, &["rg-data"])
            .with_items(
                HandlerKind::Resources,
                vec![
                    json!({"name": "kv-main", "type": "Microsoft.KeyVault/vaults"}),
                    json!({"name": "adf-prod", "type": "Microsoft.DataFactory/factories"}),
                ],
            )
            .with_names(HandlerKind::KeyVault, &["db-password"]),
        MockModel::new()
            .then_tool("transfer_to_key_vault", json!({}))
            .then_tool("list_key_vault", json!({})),
    )
    .await;
    let mut session = h.orchestrator.session();
    session.context().set_if_absent(ContextField::AccountId, ACCOUNT);

    let reply = session
        .ask("show the secrets in key vault kv-main in resource group rg-data")
        .await
        .unwrap();

    assert_eq!(reply.outcome, RouteOutcome::Handoff(SpecialistKind::KeyVault));
    assert_eq!(reply.text, "Found 1 key vault secrets: db-password");
    let ctx = session.context();
    assert_eq!(ctx.get(ContextField::GroupName), Some("rg-data".to_string()));
    assert_eq!(ctx.get(ContextField::ResourceName), Some("kv-main".to_string()));
    assert_eq!(
        invoked_kinds(&h.builder),
        vec![HandlerKind::ResourceGroups, HandlerKind::Resources, HandlerKind::KeyVault]
    );
    // every handle was built with the one cached token
    assert_eq!(h.credential.acquisitions(), 1);
    assert!(!h.logger.contains(ACCOUNT));
}

#[tokio::test]
async fn context_accumulates_across_turns() {
    let h = harness(
        CannedHandlerBuilder::new().with_names(HandlerKind::Locks, &["do-not-delete"]),
        MockModel::new()
            .then_tool("set_context", json!({"resource_group_name": "rg-data", "intent": "audit locks"}))
            .then_tool("transfer_to_locks", json!({}))
            .then_tool("list_locks", json!({})),
    )
    .await;
    let mut session = h.orchestrator.session();
    session.context().set_if_absent(ContextField::AccountId, ACCOUNT);

    let first = session.ask("I want to audit locks").await.unwrap();
    assert_eq!(first.outcome, RouteOutcome::Answered);
    assert!(first.text.contains("Newly set"));

    let second = session.ask("now check the same resource group").await.unwrap();
    assert_eq!(second.outcome, RouteOutcome::Handoff(SpecialistKind::Locks));
    assert_eq!(second.text, "Found 1 resource locks: do-not-delete");
    assert_eq!(session.transcript().len(), 4);
    assert_eq!(
        session.context().get(ContextField::Intent),
        Some("audit locks".to_string())
    );
}

#[tokio::test]
async fn sessions_do_not_share_context() {
    let h = harness(CannedHandlerBuilder::new(), MockModel::fixed("Hello!")).await;
    let first = h.orchestrator.session();
    let second = h.orchestrator.session();

    first.context().set_if_absent(ContextField::GroupName, "rg-data");
    assert!(!second.context().has(ContextField::GroupName));
    assert!(!Arc::ptr_eq(first.context(), second.context()));
}

#[tokio::test]
async fn failures_are_reported_not_raised() {
    let h = harness(
        CannedHandlerBuilder::new(),
        MockModel::new().then_tool("transfer_to_batch_pool", json!({})),
    )
    .await;
    let mut session = h.orchestrator.session();
    session.context().set_if_absent(ContextField::AccountId, ACCOUNT);

    let reply = session.ask("resize the pool").await.unwrap();

    assert_eq!(reply.outcome, RouteOutcome::Failed);
    assert!(reply.text.contains("batch pools"));
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn concurrent_first_requests_build_one_handle() {
    let builder = Arc::new(CannedHandlerBuilder::new());
    let factory = HandlerFactory::new(builder.clone());
    let credential = Arc::new(StaticCredential::new("token", Duration::from_secs(3600)));
    let ctx = ContextStore::with_auth(token_cache(credential));
    ctx.set_if_absent(ContextField::AccountId, ACCOUNT);
    ctx.set_if_absent(ContextField::GroupName, "rg-data");
    ctx.set_if_absent(ContextField::ResourceName, "kv-main");

    let (a, b) = tokio::join!(
        factory.get_handler(HandlerKind::KeyVault, &ctx),
        factory.get_handler(HandlerKind::KeyVault, &ctx)
    );

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(builder.builds(), 1);
    assert_eq!(factory.cached_len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_across_tasks_build_one_handle() {
    let builder = Arc::new(CannedHandlerBuilder::new());
    let factory = Arc::new(HandlerFactory::new(builder.clone()));
    let credential = Arc::new(StaticCredential::new("token", Duration::from_secs(3600)));
    let ctx = Arc::new(ContextStore::with_auth(token_cache(credential)));
    ctx.set_if_absent(ContextField::AccountId, ACCOUNT);
    ctx.set_if_absent(ContextField::GroupName, "rg-data");
    ctx.set_if_absent(ContextField::ResourceName, "kv-main");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let factory = factory.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { factory.get_handler(HandlerKind::KeyVault, &ctx).await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(builder.builds(), 1);
}

#[tokio::test]
async fn concurrent_first_requests_from_two_sessions_build_one_handle() {
    let h = harness(CannedHandlerBuilder::new(), MockModel::new()).await;
    let first = h.orchestrator.session();
    let second = h.orchestrator.session();
    for ctx in [first.context(), second.context()] {
        ctx.set_if_absent(ContextField::AccountId, ACCOUNT);
        ctx.set_if_absent(ContextField::GroupName, "rg-data");
        ctx.set_if_absent(ContextField::ResourceName, "kv-main");
    }
    let factory = h.orchestrator.router().factory();

    let (a, b) = tokio::join!(
        factory.get_handler(HandlerKind::KeyVault, first.context()),
        factory.get_handler(HandlerKind::KeyVault, second.context())
    );

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(h.builder.builds(), 1);
    assert_eq!(h.credential.acquisitions(), 1);
    assert!(!Arc::ptr_eq(first.context(), second.context()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_from_separate_stores_build_one_handle() {
    let builder = Arc::new(CannedHandlerBuilder::new());
    let factory = Arc::new(HandlerFactory::new(builder.clone()));
    let credential = Arc::new(StaticCredential::new("token", Duration::from_secs(3600)));
    let auth = token_cache(credential);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ContextStore::with_auth(auth.clone());
            ctx.set_if_absent(ContextField::AccountId, ACCOUNT);
            ctx.set_if_absent(ContextField::GroupName, "rg-data");
            ctx.set_if_absent(ContextField::ResourceName, "kv-main");
            let factory = factory.clone();
            tokio::spawn(async move { factory.get_handler(HandlerKind::KeyVault, &ctx).await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(builder.builds(), 1);
}
