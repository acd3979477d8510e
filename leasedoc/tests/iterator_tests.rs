//! Listing, pagination, named queries and the change feed.

mod common;

use common::*;
use leasedoc::{memory::InMemoryStore, prelude::*, serde_json::json};

async fn seeded(ids_to_create: &[&str]) -> DocumentClient<ClusterDocument> {
    let (_, store) = store();
    let clusters = store.client::<ClusterDocument>().sorter(by_id).build().unwrap();
    let ctx = Context::background();

    for id in ids_to_create {
        clusters
            .create(&ctx, SUBSCRIPTION, &cluster(id), &Options::default())
            .await
            .unwrap();
    }

    clusters
}

#[tokio::test]
async fn test_pages_follow_sorter_and_continuation() {
    let clusters = seeded(&["c", "a", "b"]).await;
    let ctx = Context::background();

    let mut iter = clusters.list(&ctx, &Options::default()).await.unwrap();

    let first = iter.next(&ctx, MaxItemCount::Limit(2)).await.unwrap();
    assert_eq!(ids(&first.items), vec!["a", "b"]);
    assert_eq!(first.count, 2);
    assert_eq!(first.continuation.as_deref(), Some("2"));

    let second = iter.next(&ctx, MaxItemCount::Limit(2)).await.unwrap();
    assert_eq!(ids(&second.items), vec!["c"]);
    assert_eq!(second.continuation, None);
    assert!(iter.is_exhausted());

    let after = iter.next(&ctx, MaxItemCount::Limit(2)).await.unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_unbounded_page_returns_the_rest() {
    let clusters = seeded(&["a", "b", "c", "d"]).await;
    let ctx = Context::background();

    let mut iter = clusters.list(&ctx, &Options::default()).await.unwrap();
    let first = iter.next(&ctx, MaxItemCount::Limit(1)).await.unwrap();
    assert_eq!(ids(&first.items), vec!["a"]);

    let rest = iter
        .next(&ctx, MaxItemCount::try_from(MaxItemCount::UNBOUNDED_SENTINEL).unwrap())
        .await
        .unwrap();
    assert_eq!(ids(&rest.items), vec!["b", "c", "d"]);
    assert!(iter.next(&ctx, MaxItemCount::Unbounded).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_continuation_resumes_a_new_listing() {
    let clusters = seeded(&["a", "b", "c"]).await;
    let ctx = Context::background();

    let mut iter = clusters.list(&ctx, &Options::default()).await.unwrap();
    let first = iter.next(&ctx, MaxItemCount::Limit(1)).await.unwrap();
    let token = first.continuation.unwrap();

    let resumed = clusters
        .list_all(&ctx, &Options::builder().continuation(token).build())
        .await
        .unwrap();
    assert_eq!(ids(&resumed), vec!["b", "c"]);

    let err = clusters
        .list(&ctx, &Options::builder().continuation("not-a-cursor").build())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DocumentStoreError::Validation(_)));
}

#[tokio::test]
async fn test_raw_pages_are_json_objects() {
    let clusters = seeded(&["a"]).await;
    let ctx = Context::background();

    let mut iter = clusters.list(&ctx, &Options::default()).await.unwrap();
    let page = iter.next_raw(&ctx, MaxItemCount::Unbounded).await.unwrap();

    assert_eq!(page.count, 1);
    assert_eq!(page.items[0]["id"], json!("a"));
    assert!(page.items[0].get("_etag").is_some());
}

#[tokio::test]
async fn test_listing_empty_collection_is_empty() {
    let clusters = seeded(&[]).await;
    let ctx = Context::background();

    let mut iter = clusters.list(&ctx, &Options::default()).await.unwrap();
    let page = iter.next(&ctx, MaxItemCount::Limit(10)).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(page.continuation, None);
}

struct ByInfraId;

#[leasedoc::async_trait]
impl QueryHandler<ClusterDocument> for ByInfraId {
    async fn execute(
        &self,
        ctx: &Context,
        client: &DocumentClient<ClusterDocument>,
        query: &QueryDescriptor,
        options: &Options,
    ) -> DocumentStoreResult<BoxDocumentIterator<ClusterDocument>> {
        let infra_id: String = query.parameter("@infraId")?;
        let matching = client
            .list_all(ctx, options)
            .await?
            .into_iter()
            .filter(|doc| doc.infra_id.as_deref() == Some(infra_id.as_str()))
            .collect();

        Ok(Box::new(SnapshotIterator::new(matching)))
    }
}

#[tokio::test]
async fn test_unregistered_query_is_not_implemented() {
    let clusters = seeded(&["a"]).await;

    let err = clusters
        .query(
            &Context::background(),
            "byInfraId",
            &QueryDescriptor::new("SELECT * FROM doc WHERE doc.infraId = @infraId"),
            &Options::default(),
        )
        .await
        .err()
        .unwrap();
    assert!(err.is_not_implemented());
    assert_eq!(err.status_code(), 501);
}

#[tokio::test]
async fn test_registered_query_returns_handler_results() {
    let (_, store) = store();
    let clusters = store
        .client::<ClusterDocument>()
        .query("byInfraId", ByInfraId)
        .build()
        .unwrap();
    let ctx = Context::background();

    for (id, infra) in [("a", "x"), ("b", "y"), ("c", "x")] {
        let mut doc = cluster(id);
        doc.infra_id = Some(infra.into());
        clusters.create(&ctx, SUBSCRIPTION, &doc, &Options::default()).await.unwrap();
    }

    let query = QueryDescriptor::new("SELECT * FROM doc WHERE doc.infraId = @infraId")
        .with_parameter("@infraId", "x")
        .unwrap();
    let mut found = clusters
        .query_all(&ctx, "byInfraId", &query, &Options::default())
        .await
        .unwrap();
    by_id(&mut found);

    assert_eq!(ids(&found), vec!["a", "c"]);
}

#[tokio::test]
async fn test_change_feed_reports_writes_after_checkpoint() {
    let clusters = seeded(&["a", "b"]).await;
    let ctx = Context::background();

    let mut feed = clusters.change_feed(&ctx, &Options::default()).await.unwrap();
    let initial = feed.documents.drain(&ctx).await.unwrap();
    assert_eq!(ids(&initial), vec!["a", "b"]);

    let quiet = clusters
        .change_feed(&ctx, &Options::builder().continuation(feed.checkpoint.clone()).build())
        .await
        .unwrap();
    assert_eq!(quiet.checkpoint, feed.checkpoint);

    clusters
        .patch_with_lease(&ctx, SUBSCRIPTION, "b", |doc| {
            doc.counter = 7;
            Ok(())
        })
        .await
        .unwrap();

    let mut next = clusters
        .change_feed(&ctx, &Options::builder().continuation(feed.checkpoint).build())
        .await
        .unwrap();
    let changed = next.documents.drain(&ctx).await.unwrap();
    assert_eq!(ids(&changed), vec!["b"]);
    assert_eq!(changed[0].counter, 7);
}

#[tokio::test]
async fn test_change_feed_without_support_is_not_implemented() {
    let backend = InMemoryStore::builder().without_change_feed().build().await.unwrap();
    let clusters = DocumentStore::new(backend).default_client::<ClusterDocument>().unwrap();

    let err = clusters
        .change_feed(&Context::background(), &Options::default())
        .await
        .err()
        .unwrap();
    assert!(err.is_not_implemented());
}
