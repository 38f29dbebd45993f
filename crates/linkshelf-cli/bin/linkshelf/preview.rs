use crate::cli::{PreviewArgs, RemoteStoreArg};
use anyhow::Context;
use linkshelf_cache::{FileKeyValueStore, InMemoryRemoteStore, LocalPreviewCache, RedisRemoteStore};
use linkshelf_core::{normalize_url, FetchState, Preview, RemoteStore};
use linkshelf_preview::{HttpMetadataFetcher, PreviewCacheManager, PreviewConfig};
use std::time::Duration;
use tracing::{info, warn};

pub async fn run(store: FileKeyValueStore, args: PreviewArgs) -> anyhow::Result<()> {
    let mut urls = Vec::with_capacity(args.urls.len());
    for raw in &args.urls {
        match normalize_url(raw) {
            Ok(url) => urls.push(url),
            Err(e) => println!("invalid\t{raw}\t{e}"),
        }
    }
    if urls.is_empty() {
        warn!("no valid urls to resolve");
        return Ok(());
    }

    let fetcher = HttpMetadataFetcher::new(&args.metadata_endpoint)
        .context("invalid metadata endpoint")?;
    let config = PreviewConfig::builder()
        .slow_after(Duration::from_millis(args.slow_after_ms))
        .hard_timeout(Duration::from_millis(args.hard_timeout_ms))
        .build();
    let local = LocalPreviewCache::new(store);

    info!(remote = %args.remote, urls = urls.len(), "resolving previews");
    match args.remote {
        RemoteStoreArg::InMemory => {
            resolve_all(local, InMemoryRemoteStore::new(), fetcher, config, &urls).await;
        }
        RemoteStoreArg::Redis => {
            let redis_url = args
                .redis_url
                .context("redis url is required when the remote store is redis")?;
            let remote = RedisRemoteStore::connect(&redis_url)
                .await
                .context("failed to connect to the remote store")?;
            resolve_all(local, remote, fetcher, config, &urls).await;
        }
    }

    Ok(())
}

async fn resolve_all<R: RemoteStore>(
    local: LocalPreviewCache<FileKeyValueStore>,
    remote: R,
    fetcher: HttpMetadataFetcher,
    config: PreviewConfig,
    urls: &[String],
) {
    let manager = PreviewCacheManager::new(local, remote, fetcher, config);

    for (url, preview) in manager.request_all(urls).await {
        if !preview.is_pending() {
            continue;
        }
        let Some(mut state) = manager.watch(&url) else {
            continue;
        };
        tokio::spawn(async move {
            if let Ok(seen) = state.wait_for(|s| *s != FetchState::Loading).await {
                if *seen == FetchState::Slow {
                    eprintln!("{url}: still loading, this may take a moment");
                }
            }
        });
    }

    for url in urls {
        println!("{}", format_outcome(url, &manager.resolve(url).await));
    }

    let stats = manager.queue_stats();
    info!(fetched = stats.succeeded, failed = stats.failed, "done");
    manager.shutdown();
}

fn format_outcome(url: &str, preview: &Preview) -> String {
    match preview {
        Preview::Success(record) => {
            let source = serde_json::to_value(record.source)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            format!("ok\t{url}\t{source}\t{}", record.title)
        }
        Preview::Pending { .. } => format!("pending\t{url}"),
        Preview::Failed(e) => format!("failed\t{url}\t{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkshelf_core::{FetchError, PreviewRecord};

    #[test]
    fn formats_outcomes() {
        let mut record = PreviewRecord::placeholder("https://a.com");
        record.title = "A".to_string();
        assert_eq!(
            format_outcome("https://a.com", &Preview::Success(record)),
            "ok\thttps://a.com\tremote\tA"
        );

        let failed = Preview::Failed(FetchError::Failure("boom".to_string()));
        assert!(format_outcome("https://a.com", &failed).starts_with("failed\thttps://a.com\t"));
    }
}
