use anyhow::Result;
use cms_dashboard::core::server;
use cms_dashboard::domain::model::{
    BlogPost, BlogPostPatch, ListQuery, NewBlogPost, NewSubscriber, Subscriber,
};
use cms_dashboard::{
    ApiClient, DashboardConfig, DashboardError, HttpTransport, RequestForwarder, ResourceStore,
};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn post_store(origin: &str) -> ResourceStore<BlogPost, RequestForwarder> {
    let config = DashboardConfig::with_upstream(origin);
    let api = ApiClient::new(RequestForwarder::new(&config).unwrap())
        .with_auth_token(Some("admin-token".to_string()));
    ResourceStore::new(api)
}

/// 完整的文章 CRUD 流程
#[tokio::test]
async fn test_blog_post_lifecycle() -> Result<()> {
    let server = MockServer::start_async().await;

    let list_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/blogs")
                .query_param("page", "1")
                .query_param("limit", "2")
                .header("authorization", "Bearer admin-token");
            then.status(200).json_body(json!({
                "blogs": [
                    { "_id": "a1", "title": "First", "published": true },
                    { "_id": "a2", "title": "Second" }
                ],
                "pagination": { "page": 1, "limit": 2, "total": 3, "totalPages": 2 }
            }));
        })
        .await;

    let detail_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/blogs/a2");
            then.status(200).json_body(json!({
                "blog": { "_id": "a2", "title": "Second", "content": "Full body" }
            }));
        })
        .await;

    let create_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/blogs")
                .json_body(json!({ "title": "Third", "content": "New", "tags": [], "published": false }));
            then.status(201)
                .json_body(json!({ "data": { "_id": "a3", "title": "Third", "content": "New" } }));
        })
        .await;

    let update_mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/blogs/a2")
                .json_body(json!({ "title": "Second (edited)" }));
            then.status(200).json_body(json!({
                "_id": "a2", "title": "Second (edited)", "content": "Full body"
            }));
        })
        .await;

    let delete_mock = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/blogs/a1");
            then.status(204);
        })
        .await;

    let store = post_store(&server.url("/api"));

    // 列表
    let page = store.fetch_all(&ListQuery::new(1, 2)).await?;
    list_mock.assert_async().await;
    assert_eq!(page.items.len(), 2);
    let state = store.snapshot();
    assert!(!state.loading);
    assert_eq!(state.pagination.total, 3);
    assert_eq!(state.pagination.total_pages, 2);

    // 單筆
    store.fetch_one("a2").await?;
    detail_mock.assert_async().await;
    assert_eq!(store.snapshot().selected.unwrap().content, "Full body");

    // 新增
    let draft = NewBlogPost {
        title: "Third".to_string(),
        content: "New".to_string(),
        ..Default::default()
    };
    let created = store.create(&draft).await?;
    create_mock.assert_async().await;
    assert_eq!(created.id, "a3");
    let state = store.snapshot();
    assert_eq!(state.items[0].id, "a3");
    assert_eq!(state.pagination.total, 4);

    // 更新
    let patch = BlogPostPatch {
        title: Some("Second (edited)".to_string()),
        ..Default::default()
    };
    store.update("a2", &patch).await?;
    update_mock.assert_async().await;
    let state = store.snapshot();
    assert_eq!(state.find("a2").unwrap().title, "Second (edited)");
    assert_eq!(state.selected.unwrap().title, "Second (edited)");

    // 刪除
    store.delete("a1").await?;
    delete_mock.assert_async().await;
    let state = store.snapshot();
    assert!(state.find("a1").is_none());
    assert_eq!(state.pagination.total, 3);
    assert!(state.error.is_none());

    Ok(())
}

#[tokio::test]
async fn test_rejected_request_records_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blogs/missing");
            then.status(404).json_body(json!({ "message": "Blog not found" }));
        })
        .await;

    let store = post_store(&server.base_url());
    let err = store.fetch_one("missing").await.unwrap_err();

    assert!(matches!(err, DashboardError::Upstream { status: 404, .. }));
    let state = store.snapshot();
    assert!(!state.loading);
    assert!(state.selected.is_none());
    assert!(state.error.unwrap().contains("Blog not found"));

    store.clear_error();
    assert!(store.snapshot().error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_watchers_see_pending_then_settled() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blogs");
            then.status(200)
                .delay(Duration::from_millis(200))
                .json_body(json!([{ "id": "1", "title": "Slow" }]));
        })
        .await;

    let store = Arc::new(post_store(&server.base_url()));
    let mut watcher = store.subscribe();

    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_all(&ListQuery::default()).await })
    };

    watcher.changed().await?;
    assert!(watcher.borrow_and_update().loading);

    task.await??;
    let state = store.snapshot();
    assert!(!state.loading);
    assert_eq!(state.items[0].title, "Slow");
    Ok(())
}

/// 同一個 store 的請求依序執行，後到的呼叫會排隊
#[tokio::test]
async fn test_concurrent_calls_are_queued() -> Result<()> {
    let server = MockServer::start_async().await;
    let list_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/blogs");
            then.status(200)
                .delay(Duration::from_millis(300))
                .json_body(json!({
                    "blogs": [{ "id": "1", "title": "Listed" }],
                    "pagination": { "page": 1, "limit": 10, "total": 1 }
                }));
        })
        .await;
    let create_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/blogs");
            then.status(201)
                .delay(Duration::from_millis(300))
                .json_body(json!({ "id": "2", "title": "Created" }));
        })
        .await;

    let store = Arc::new(post_store(&server.base_url()));
    let mut watcher = store.subscribe();
    let started = std::time::Instant::now();

    let list_task = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_all(&ListQuery::default()).await })
    };
    // 等列表請求進入 pending 再送出新增
    watcher.changed().await?;
    assert!(watcher.borrow_and_update().loading);

    let create_task = {
        let store = store.clone();
        tokio::spawn(async move {
            let draft = NewBlogPost {
                title: "Created".to_string(),
                ..Default::default()
            };
            store.create(&draft).await
        })
    };

    list_task.await??;
    let created = create_task.await??;
    let elapsed = started.elapsed();

    list_mock.assert_async().await;
    create_mock.assert_async().await;
    assert_eq!(created.id, "2");
    // 兩個 300ms 的請求沒有重疊
    assert!(elapsed >= Duration::from_millis(600), "elapsed {:?}", elapsed);

    let state = store.snapshot();
    assert!(!state.loading);
    assert!(state.error.is_none());
    let ids: Vec<&str> = state.items.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert_eq!(state.pagination.total, 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_id_is_rejected_without_request() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    let store = post_store(&server.base_url());
    assert!(store.delete("  ").await.is_err());
    assert_eq!(mock.hits_async().await, 0);
    assert!(store.snapshot().error.is_some());
    Ok(())
}

/// 透過執行中的 proxy route 呼叫上游
#[tokio::test]
async fn test_subscribers_through_running_proxy() -> Result<()> {
    let upstream = MockServer::start_async().await;
    let create_mock = upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path("/newsletter")
                .header("authorization", "Bearer admin-token")
                .json_body(json!({ "email": "reader@example.com" }));
            then.status(201).json_body(json!({
                "subscriber": { "_id": "s1", "email": "reader@example.com" }
            }));
        })
        .await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/newsletter");
            then.status(503).body("upstream maintenance");
        })
        .await;

    let config = DashboardConfig::with_upstream(&upstream.base_url());
    let forwarder = Arc::new(RequestForwarder::new(&config)?);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(server::run(listener, forwarder));

    let transport = HttpTransport::new(
        &format!("http://{}/api/proxy", addr),
        Duration::from_secs(5),
    )?;
    let api = ApiClient::new(transport).with_auth_token(Some("admin-token".to_string()));
    let store: ResourceStore<Subscriber, HttpTransport> = ResourceStore::new(api);

    let subscriber = store
        .create(&NewSubscriber {
            email: "reader@example.com".to_string(),
            name: None,
        })
        .await?;
    create_mock.assert_async().await;
    assert_eq!(subscriber.id, "s1");
    assert!(subscriber.active);

    let err = store.fetch_all(&ListQuery::default()).await.unwrap_err();
    match err {
        DashboardError::Upstream { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream maintenance");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(store.snapshot().items.len(), 1);

    Ok(())
}
