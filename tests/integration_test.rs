//! End-to-end tests over the full service stack: validation, storage, tag
//! synchronization, ranking, and authorization working together.

#![allow(clippy::unwrap_used, clippy::panic)]

use promptvault::{
    CallerContext, ListRequest, PromptInput, PromptService, SearchRequest, SqlitePromptStore,
    TagStrategy,
};

fn service() -> PromptService {
    PromptService::in_memory().unwrap()
}

fn ctx(owner: &str) -> CallerContext {
    CallerContext::new(owner)
}

fn input(slug: &str) -> PromptInput {
    PromptInput::new(slug, format!("Prompt {slug}"), format!("Body for {slug}"))
}

#[test]
fn test_full_lifecycle() {
    let svc = service();
    let ctx = ctx("alice");

    let created = svc
        .create(
            &ctx,
            &input("code-review")
                .with_description("Reviews a diff")
                .with_tags(vec!["Coding".to_string(), "review".to_string()]),
        )
        .unwrap();
    assert_eq!(created.slug, "code-review");
    // Tags are normalized to lowercase and sorted.
    assert_eq!(created.tags, vec!["coding", "review"]);

    svc.record_usage(&ctx, "code-review").unwrap();

    let updated = svc
        .update(
            &ctx,
            "code-review",
            &PromptInput::new("code-review", "Code Review v2", "Review this diff carefully")
                .with_tags(vec!["coding".to_string()]),
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Code Review v2");
    assert_eq!(updated.tags, vec!["coding"]);
    assert_eq!(updated.usage_count, 1);

    assert!(svc.delete(&ctx, "code-review").unwrap());
    assert!(svc.get(&ctx, "code-review").unwrap().is_none());
}

#[test]
fn test_batch_import_is_atomic() {
    let svc = service();
    let ctx = ctx("alice");
    svc.create(&ctx, &input("existing")).unwrap();

    // One invalid member rejects the whole batch.
    let err = svc
        .create_batch(&ctx, &[input("good-one"), input("bad slug!")])
        .unwrap_err();
    assert!(matches!(err, promptvault::Error::Validation(_)));
    assert!(svc.get(&ctx, "good-one").unwrap().is_none());

    // A slug collision against existing data rejects the whole batch too.
    let err = svc
        .create_batch(&ctx, &[input("fresh"), input("existing")])
        .unwrap_err();
    assert!(matches!(err, promptvault::Error::Conflict(_)));
    assert!(svc.get(&ctx, "fresh").unwrap().is_none());

    // An intra-batch duplicate is caught before storage is touched.
    let err = svc
        .create_batch(&ctx, &[input("twin"), input("twin")])
        .unwrap_err();
    assert!(matches!(err, promptvault::Error::Conflict(_)));
    assert!(svc.get(&ctx, "twin").unwrap().is_none());
}

#[test]
fn test_owners_are_isolated() {
    let svc = service();
    let alice = ctx("alice");
    let bob = ctx("bob");

    svc.create(&alice, &input("shared-slug")).unwrap();
    svc.create(&bob, &input("shared-slug")).unwrap();

    svc.record_usage(&alice, "shared-slug").unwrap();

    let alices = svc.get(&alice, "shared-slug").unwrap().unwrap();
    let bobs = svc.get(&bob, "shared-slug").unwrap().unwrap();
    assert_eq!(alices.usage_count, 1);
    assert_eq!(bobs.usage_count, 0);

    // Listing and searching never leak across owners.
    svc.create(&alice, &PromptInput::new("secret", "Secret", "classified material"))
        .unwrap();
    let bob_hits = svc.search(&bob, &SearchRequest::new("classified")).unwrap();
    assert!(bob_hits.is_empty());
    let bob_list = svc.list(&bob, &ListRequest::new()).unwrap();
    assert_eq!(bob_list.len(), 1);
}

#[test]
fn test_tag_vocabulary_converges_across_prompts() {
    let store = SqlitePromptStore::in_memory(TagStrategy::Relational).unwrap();
    let svc = PromptService::with_store(store).unwrap();
    let ctx = ctx("alice");

    svc.create(&ctx, &input("one").with_tags(vec!["rust".to_string()]))
        .unwrap();
    svc.create(&ctx, &input("two").with_tags(vec!["RUST".to_string()]))
        .unwrap();

    // Both prompts share one canonical tag record.
    let tags = svc.store().list_tags("alice").unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "rust");

    // Removing the tag from one prompt keeps the record alive for the other.
    svc.update(&ctx, "one", &input("one")).unwrap().unwrap();
    assert_eq!(svc.store().list_tags("alice").unwrap().len(), 1);

    // Deleting the last referencing prompt cleans the orphan up.
    assert!(svc.delete(&ctx, "two").unwrap());
    assert!(svc.store().list_tags("alice").unwrap().is_empty());
}

#[test]
fn test_inline_strategy_has_same_outward_shape() {
    let store = SqlitePromptStore::in_memory(TagStrategy::Inline).unwrap();
    let svc = PromptService::with_store(store).unwrap();
    let ctx = ctx("alice");

    let dto = svc
        .create(
            &ctx,
            &input("tagged").with_tags(vec!["zeta".to_string(), "Alpha".to_string()]),
        )
        .unwrap();
    assert_eq!(dto.tags, vec!["alpha", "zeta"]);

    let listed = svc
        .list(&ctx, &ListRequest::new().with_tags(vec!["alpha".to_string()]))
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn test_engagement_reorders_list() {
    let svc = service();
    let ctx = ctx("alice");
    svc.create_batch(&ctx, &[input("aaa"), input("bbb"), input("ccc")])
        .unwrap();

    // Untouched library: alphabetical within the never-used group.
    let before = svc.list(&ctx, &ListRequest::new()).unwrap();
    let slugs: Vec<&str> = before.iter().map(|d| d.slug.as_str()).collect();
    assert_eq!(slugs, vec!["aaa", "bbb", "ccc"]);

    for _ in 0..5 {
        svc.record_usage(&ctx, "ccc").unwrap();
    }
    svc.record_usage(&ctx, "bbb").unwrap();

    let after = svc.list(&ctx, &ListRequest::new()).unwrap();
    let slugs: Vec<&str> = after.iter().map(|d| d.slug.as_str()).collect();
    assert_eq!(slugs, vec!["ccc", "bbb", "aaa"]);
}

#[test]
fn test_search_reranks_by_engagement() {
    let svc = service();
    let ctx = ctx("alice");
    svc.create_batch(
        &ctx,
        &[
            PromptInput::new("sql-one", "SQL Helper", "Helps with sql queries"),
            PromptInput::new("sql-two", "SQL Helper", "Helps with sql queries"),
        ],
    )
    .unwrap();

    for _ in 0..10 {
        svc.record_usage(&ctx, "sql-two").unwrap();
    }

    // Equal text relevance: the heavily-used prompt surfaces first.
    let hits = svc.search(&ctx, &SearchRequest::new("sql")).unwrap();
    assert_eq!(hits[0].slug, "sql-two");
    assert_eq!(hits[1].slug, "sql-one");
}

#[test]
fn test_search_with_tag_filter_and_limit() {
    let svc = service();
    let ctx = ctx("alice");

    let mut batch: Vec<PromptInput> = (0..30)
        .map(|i| PromptInput::new(format!("memo-{i:02}"), "Memo", "meeting notes template"))
        .collect();
    batch.push(
        PromptInput::new("memo-special", "Memo", "meeting notes template")
            .with_tags(vec!["standup".to_string()]),
    );
    svc.create_batch(&ctx, &batch).unwrap();

    let hits = svc
        .search(
            &ctx,
            &SearchRequest::new("meeting")
                .with_tags(vec!["standup".to_string()])
                .with_limit(10),
        )
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].slug, "memo-special");
}

#[test]
fn test_empty_search_browses() {
    let svc = service();
    let ctx = ctx("alice");
    svc.create_batch(&ctx, &[input("a"), input("b").pinned(true)])
        .unwrap();

    let hits = svc.search(&ctx, &SearchRequest::new("   ")).unwrap();
    assert_eq!(hits.len(), 2);
    // Browse semantics: pinned grouping applies.
    assert_eq!(hits[0].slug, "b");
}

#[test]
fn test_validation_limits_enforced() {
    let svc = service();
    let ctx = ctx("alice");

    let long_name = "x".repeat(201);
    let err = svc
        .create(&ctx, &PromptInput::new("ok-slug", long_name, "body"))
        .unwrap_err();
    assert!(matches!(err, promptvault::Error::Validation(_)));

    let too_many_tags: Vec<String> = (0..51).map(|i| format!("tag-{i}")).collect();
    let err = svc
        .create(&ctx, &input("tagged").with_tags(too_many_tags))
        .unwrap_err();
    assert!(matches!(err, promptvault::Error::Validation(_)));

    let err = svc
        .create(&ctx, &PromptInput::new("ns:reserved", "Name", "body"))
        .unwrap_err();
    match err {
        promptvault::Error::Validation(msg) => {
            assert!(msg.contains("colon"));
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_persistence_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("vault.db");

    {
        let store = SqlitePromptStore::new(&db_path, TagStrategy::Relational).unwrap();
        let svc = PromptService::with_store(store).unwrap();
        svc.create(&ctx("alice"), &input("durable").with_tags(vec!["keep".to_string()]))
            .unwrap();
        svc.record_usage(&ctx("alice"), "durable").unwrap();
    }

    let store = SqlitePromptStore::new(&db_path, TagStrategy::Relational).unwrap();
    let svc = PromptService::with_store(store).unwrap();
    let dto = svc.get(&ctx("alice"), "durable").unwrap().unwrap();
    assert_eq!(dto.usage_count, 1);
    assert_eq!(dto.tags, vec!["keep"]);

    let hits = svc
        .search(&ctx("alice"), &SearchRequest::new("durable"))
        .unwrap();
    assert_eq!(hits.len(), 1);
}
