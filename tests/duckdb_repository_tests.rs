use std::sync::Arc;
use std::time::Duration;

use shoprec::application::{
    KeyValueCache, LlmRankingRepository, ProductCatalog, TrendingBooster,
};
use shoprec::connector::{
    DuckdbCommerceStore, DuckdbKeyValueCache, DuckdbLlmRankingRepository, DuckdbProductCatalog,
    DuckdbTrendingRepository, OrderLine,
};
use shoprec::domain::{unix_now, LlmRanking, Product, RecommendationType};
use tempfile::tempdir;

#[tokio::test]
async fn duckdb_ranking_repository_upsert_keeps_id() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("shoprec.duckdb");
    let repo = DuckdbLlmRankingRepository::new(&db_path).expect("duckdb init");

    let first = LlmRanking::new(7, 10, RecommendationType::Related, 1, vec![20, 30]).with_ttl(3600);
    let id = repo.save(&first).await.expect("save");

    let second = LlmRanking::new(7, 10, RecommendationType::Related, 1, vec![30, 40, 50])
        .with_ttl(3600)
        .with_model(Some("claude-3-5-sonnet-20240620".to_string()), Some(0.0042));
    let same_id = repo.save(&second).await.expect("save again");
    assert_eq!(id, same_id);

    let loaded = repo.get_by_id(id).await.expect("get_by_id");
    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.ranked_product_ids, vec![30, 40, 50]);
    assert_eq!(loaded.model_used.as_deref(), Some("claude-3-5-sonnet-20240620"));
    assert_eq!(loaded.estimated_cost, Some(0.0042));

    let other_type = LlmRanking::new(7, 10, RecommendationType::Upsell, 1, vec![60]).with_ttl(3600);
    let other_id = repo.save(&other_type).await.expect("save upsell");
    assert_ne!(id, other_id);
}

#[tokio::test]
async fn duckdb_ranking_repository_missing_id_is_not_found() {
    let repo = DuckdbLlmRankingRepository::in_memory().expect("duckdb init");
    let err = repo.get_by_id(404).await.expect_err("missing row");
    assert!(err.is_not_found());

    let none = repo
        .get_by_product_and_customer(10, 7, RecommendationType::Related, 1)
        .await
        .expect("lookup");
    assert!(none.is_none());
}

#[tokio::test]
async fn duckdb_ranking_repository_expired_rows_are_hidden_and_purged() {
    let repo = DuckdbLlmRankingRepository::in_memory().expect("duckdb init");
    let now = unix_now();

    let stale = LlmRanking::new(7, 10, RecommendationType::Related, 1, vec![20])
        .with_expires_at(now - 60);
    repo.save(&stale).await.expect("save stale");
    let fresh = LlmRanking::new(8, 10, RecommendationType::Related, 1, vec![30])
        .with_expires_at(now + 3600);
    repo.save(&fresh).await.expect("save fresh");

    let hidden = repo
        .get_by_product_and_customer(10, 7, RecommendationType::Related, 1)
        .await
        .expect("lookup");
    assert!(hidden.is_none());

    assert_eq!(repo.delete_expired().await.expect("delete_expired"), 1);
    let kept = repo
        .get_by_product_and_customer(10, 8, RecommendationType::Related, 1)
        .await
        .expect("lookup")
        .expect("fresh row kept");
    assert_eq!(kept.ranked_product_ids, vec![30]);
}

#[tokio::test]
async fn duckdb_ranking_repository_bulk_deletes() {
    let repo = DuckdbLlmRankingRepository::in_memory().expect("duckdb init");
    for (customer, product) in [(1, 10), (1, 11), (2, 10), (3, 12)] {
        let ranking = LlmRanking::new(customer, product, RecommendationType::Related, 1, vec![99])
            .with_ttl(3600);
        repo.save(&ranking).await.expect("save");
    }

    assert_eq!(repo.delete_by_product(10).await.expect("by product"), 2);
    assert_eq!(repo.delete_by_customer(1).await.expect("by customer"), 1);

    let id = repo
        .get_by_product_and_customer(12, 3, RecommendationType::Related, 1)
        .await
        .expect("lookup")
        .and_then(|r| r.id)
        .expect("row for customer 3");
    repo.delete_by_id(id).await.expect("delete_by_id");
    assert!(repo.get_by_id(id).await.expect_err("deleted").is_not_found());
}

#[tokio::test]
async fn duckdb_key_value_cache_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("shoprec.duckdb");

    {
        let cache = DuckdbKeyValueCache::new(&db_path).expect("duckdb init");
        cache
            .save("key", "value", &["tag"], Some(Duration::from_secs(3600)))
            .await
            .expect("save");
    }

    let cache = DuckdbKeyValueCache::new(&db_path).expect("duckdb reopen");
    assert_eq!(cache.load("key").await.expect("load").as_deref(), Some("value"));
}

#[tokio::test]
async fn duckdb_adapters_share_one_connection() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("shoprec.duckdb");

    let catalog = DuckdbProductCatalog::new(&db_path).expect("duckdb init");
    let shared = catalog.shared_connection();
    let rankings = DuckdbLlmRankingRepository::with_connection(Arc::clone(&shared))
        .await
        .expect("rankings");
    let cache = DuckdbKeyValueCache::with_connection(shared)
        .await
        .expect("cache");

    catalog
        .save(&Product::new(10, "DESK-10", "Oak desk", 300.0))
        .await
        .expect("save product");
    rankings
        .save(&LlmRanking::new(7, 10, RecommendationType::Related, 1, vec![20]).with_ttl(60))
        .await
        .expect("save ranking");
    cache.save("k", "v", &[], None).await.expect("save cache");

    assert!(catalog.get_by_id(10, 1).await.expect("get").is_some());
    assert_eq!(cache.load("k").await.expect("load").as_deref(), Some("v"));
}

#[tokio::test]
async fn trending_refresh_scores_recent_orders() {
    let commerce = DuckdbCommerceStore::in_memory().expect("duckdb init");
    let repository = Arc::new(
        DuckdbTrendingRepository::with_connection(commerce.shared_connection())
            .await
            .expect("trending"),
    );
    let now = unix_now();

    commerce
        .record_order(1, Some(5), 1, "complete", now - 3600, &[OrderLine::new(10, 2.0), OrderLine::new(20, 1.0)])
        .await
        .expect("order 1");
    commerce
        .record_order(2, None, 1, "complete", now - 7200, &[OrderLine::new(10, 1.0)])
        .await
        .expect("order 2");
    commerce
        .record_order(3, Some(6), 1, "canceled", now - 60, &[OrderLine::new(20, 10.0)])
        .await
        .expect("order 3");
    commerce
        .record_order(4, Some(6), 1, "complete", now - 30 * 86_400, &[OrderLine::new(30, 5.0)])
        .await
        .expect("old order");

    let booster = TrendingBooster::new(repository);
    let stored = booster.refresh(1, 7).await.expect("refresh");
    assert_eq!(stored, 2);

    let top = booster.top_trending(1, 10).await;
    assert_eq!(top[0].product_id, 10);
    assert_eq!(top[0].sales_count, 2);
    assert!((top[0].score - 1.0).abs() < 1e-9);
    assert!(booster.is_trending(10, 1).await);
    assert_eq!(booster.trending_score(30, 1).await, 0.0);
}
