use jiff::Timestamp;
use linkshelf_cache::RedisRemoteStore;
use linkshelf_core::{DocumentKey, PreviewRecord, PreviewSource, RemoteStore};
use linkshelf_test_infra::RedisServer;
use redis::AsyncCommands;

fn fetched_record(url: &str, title: &str) -> PreviewRecord {
    PreviewRecord {
        url: url.to_string(),
        title: title.to_string(),
        description: "A description".to_string(),
        image: Some("https://a.com/og.png".to_string()),
        site_name: "A".to_string(),
        timestamp: Timestamp::now(),
        source: PreviewSource::Fetch,
        is_custom: false,
    }
}

#[tokio::test]
async fn test_redis_store_round_trip() {
    let server = RedisServer::start().await.expect("Failed to start Redis");
    let store = RedisRemoteStore::new(server.connection().await.unwrap());

    let key = DocumentKey::from_url("https://a.com");
    let record = fetched_record("https://a.com", "A");

    assert!(store.get(&key).await.unwrap().is_none());

    store.put(&key, &record).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_redis_store_uses_document_key() {
    let server = RedisServer::start().await.expect("Failed to start Redis");
    let mut conn = server.connection().await.unwrap();
    let store = RedisRemoteStore::new(conn.clone());

    let key = DocumentKey::from_url("https://a.com");
    store
        .put(&key, &fetched_record("https://a.com", "A"))
        .await
        .unwrap();

    let raw: Option<String> = conn.get("preview:https_3A_2F_2Fa_com").await.unwrap();
    let raw = raw.expect("document should be stored under the sanitized key");
    assert!(raw.contains("\"siteName\":\"A\""));
}

#[tokio::test]
async fn test_redis_store_overwrites_document() {
    let server = RedisServer::start().await.expect("Failed to start Redis");
    let store = RedisRemoteStore::new(server.connection().await.unwrap());

    let key = DocumentKey::from_url("https://a.com");
    store
        .put(&key, &fetched_record("https://a.com", "Old"))
        .await
        .unwrap();
    store
        .put(&key, &fetched_record("https://a.com", "New"))
        .await
        .unwrap();

    assert_eq!(store.get(&key).await.unwrap().unwrap().title, "New");
}

#[tokio::test]
async fn test_redis_store_rejects_invalid_document() {
    let server = RedisServer::start().await.expect("Failed to start Redis");
    let mut conn = server.connection().await.unwrap();
    let store = RedisRemoteStore::with_prefix(conn.clone(), "test:");

    let key = DocumentKey::from_url("https://broken.com");
    let _: () = conn
        .set(format!("test:{key}"), "not json")
        .await
        .unwrap();

    assert!(store.get(&key).await.is_err());
}

#[tokio::test]
async fn test_redis_store_connect_by_url() {
    let server = RedisServer::start().await.expect("Failed to start Redis");
    let store = RedisRemoteStore::connect(&server.url().await.unwrap())
        .await
        .unwrap();

    let key = DocumentKey::from_url("https://b.com");
    assert!(store.get(&key).await.unwrap().is_none());
}
