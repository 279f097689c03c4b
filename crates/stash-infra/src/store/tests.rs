#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use stash_core::domain::{CacheEvent, CacheEventKind, Expiration, KeyTtl};
    use stash_core::ports::CacheStore;
    use stash_core::{CacheClient, CacheConfig, CacheError};

    use crate::store::InMemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        name: String,
    }

    fn client() -> CacheClient<InMemoryStore> {
        CacheClient::new(InMemoryStore::new(), CacheConfig::default())
    }

    fn client_with_prefix(prefix: &str) -> (CacheClient<Arc<InMemoryStore>>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let cache = CacheClient::new(
            store.clone(),
            CacheConfig::default().with_prefix(prefix),
        );
        (cache, store)
    }

    fn record_events(cache: &CacheClient<impl CacheStore>) -> Arc<Mutex<Vec<CacheEventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cache.add_listener(Arc::new(move |event: &CacheEvent| {
            sink.lock().unwrap().push(event.kind);
        }));
        seen
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let cache = client();
        let value = Session {
            name: "a".to_string(),
        };

        assert!(cache.put("user:42", &value, Expiration::Default).await.unwrap());
        let fetched: Option<Session> = cache.get("user:42").await.unwrap();
        assert_eq!(fetched, Some(value));

        let absent: Option<Session> = cache.get("user:43").await.unwrap();
        assert_eq!(absent, None);
    }

    #[tokio::test]
    async fn test_get_or_falls_back_on_miss() {
        let cache = client();
        let fallback: i64 = cache.get_or("counter", 7).await.unwrap();
        assert_eq!(fallback, 7);
    }

    #[tokio::test]
    async fn test_prefix_qualifies_backend_keys() {
        let (cache, store) = client_with_prefix("sess_");
        let value = Session {
            name: "a".to_string(),
        };

        cache.put("user:42", &value, Expiration::Seconds(60)).await.unwrap();

        // The wire key carries the prefix; the logical key does not.
        assert!(store.get("sess_user:42").await.unwrap().is_some());
        let fetched: Option<Session> = cache.get("user:42").await.unwrap();
        assert_eq!(fetched, Some(value));

        // Compound keys join parts with ':' after prefixing.
        cache.put(vec!["user", "42", "roles"], &1, Expiration::Default).await.unwrap();
        assert!(store.get("sess_user:42:roles").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_stores_only_when_absent() {
        let cache = client();

        assert!(cache.add("slot", &"first", Expiration::Default).await.unwrap());
        assert!(!cache.add("slot", &"second", Expiration::Default).await.unwrap());

        let stored: Option<String> = cache.get("slot").await.unwrap();
        assert_eq!(stored, Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_has_and_missing_are_duals() {
        let cache = client();

        assert!(!cache.has("k").await.unwrap());
        assert!(cache.missing("k").await.unwrap());

        cache.put("k", &1, Expiration::Default).await.unwrap();
        assert!(cache.has("k").await.unwrap());
        assert!(!cache.missing("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert!(cache.missing("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_returns_then_removes() {
        let cache = client();
        cache.put("token", &"abc", Expiration::Default).await.unwrap();

        let pulled: Option<String> = cache.pull("token").await.unwrap();
        assert_eq!(pulled, Some("abc".to_string()));
        assert!(!cache.has("token").await.unwrap());

        let empty: Option<String> = cache.pull("token").await.unwrap();
        assert_eq!(empty, None);
    }

    #[tokio::test]
    async fn test_remember_computes_at_most_once() {
        let cache = client();
        let computations = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = computations.clone();
            let value: Session = cache
                .remember("profile", Expiration::Default, || async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(Session {
                        name: "computed".to_string(),
                    })
                })
                .await
                .unwrap();
            assert_eq!(value.name, "computed");
        }

        assert_eq!(computations.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_remember_failure_leaves_cache_untouched() {
        let cache = client();

        let result: Result<Session, _> = cache
            .remember("profile", Expiration::Default, || async {
                Err(CacheError::Operation {
                    operation: "load_profile",
                    key: None,
                    detail: "database unavailable".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert!(!cache.has("profile").await.unwrap());
    }

    #[tokio::test]
    async fn test_remember_forever_stores_without_expiry() {
        let cache = client();

        let _: i64 = cache
            .remember_forever("pinned", || async { Ok(11) })
            .await
            .unwrap();
        assert_eq!(cache.ttl("pinned").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_ttl_reflects_expiration_policy() {
        let cache = CacheClient::new(
            InMemoryStore::new(),
            CacheConfig::default().with_default_ttl(Duration::from_secs(120)),
        );

        cache.put("default", &1, Expiration::Default).await.unwrap();
        cache.put("timed", &1, Expiration::Seconds(60)).await.unwrap();
        cache.put("forever", &1, Expiration::Never).await.unwrap();

        assert!(matches!(cache.ttl("default").await.unwrap(), KeyTtl::ExpiresIn(d) if d <= Duration::from_secs(120)));
        assert!(matches!(cache.ttl("timed").await.unwrap(), KeyTtl::ExpiresIn(d) if d <= Duration::from_secs(60)));
        assert_eq!(cache.ttl("forever").await.unwrap(), KeyTtl::Persistent);
        assert_eq!(cache.ttl("ghost").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_counters_create_and_adjust() {
        let cache = client();

        assert_eq!(cache.increment("count", 5).await.unwrap(), 5);
        assert_eq!(cache.decrement("count", 2).await.unwrap(), 3);

        // Counter wire text deserializes as a plain integer.
        let value: Option<i64> = cache.get("count").await.unwrap();
        assert_eq!(value, Some(3));
    }

    #[tokio::test]
    async fn test_many_maps_missing_keys_to_none() {
        let (cache, _) = client_with_prefix("app_");

        assert!(cache
            .put_many(vec![("a", 1), ("b", 2)], Expiration::Default)
            .await
            .unwrap());

        let values: HashMap<String, Option<i64>> =
            cache.many(vec!["a", "b", "c"]).await.unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["app_a"], Some(1));
        assert_eq!(values["app_b"], Some(2));
        assert_eq!(values["app_c"], None);
    }

    #[tokio::test]
    async fn test_many_with_no_keys_skips_backend() {
        let cache = client();
        let values: HashMap<String, Option<i64>> =
            cache.many(Vec::<&str>::new()).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_delete_multiple_removes_each_key() {
        let cache = client();
        cache.put("a", &1, Expiration::Default).await.unwrap();
        cache.put("b", &2, Expiration::Default).await.unwrap();

        assert!(cache.delete_multiple(vec!["a", "b", "c"]).await.unwrap());
        assert!(cache.missing("a").await.unwrap());
        assert!(cache.missing("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_clears_everything() {
        let cache = client();
        cache.put("a", &1, Expiration::Default).await.unwrap();
        cache.put("b", &2, Expiration::Default).await.unwrap();

        cache.flush().await.unwrap();

        assert!(cache.missing("a").await.unwrap());
        assert!(cache.missing("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let cache = client();
        assert_eq!(cache.stats().hit_rate, 0.0);

        let _: Option<i64> = cache.get("absent").await.unwrap();
        let _: Option<i64> = cache.get("absent").await.unwrap();
        cache.put("present", &1, Expiration::Default).await.unwrap();
        let _: Option<i64> = cache.get("present").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.hit_rate, 0.33);
    }

    #[tokio::test]
    async fn test_events_follow_operations() {
        let cache = client();
        let seen = record_events(&cache);

        cache.put("k", &1, Expiration::Default).await.unwrap();
        let _: Option<i64> = cache.get("k").await.unwrap();
        let _: Option<i64> = cache.get("ghost").await.unwrap();
        cache.delete("k").await.unwrap();
        cache.flush().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                CacheEventKind::Set,
                CacheEventKind::Hit,
                CacheEventKind::Miss,
                CacheEventKind::Delete,
                CacheEventKind::Flush,
            ]
        );
    }

    #[tokio::test]
    async fn test_set_event_carries_applied_ttl() {
        let cache = client();
        let metadata = Arc::new(Mutex::new(Vec::new()));
        let sink = metadata.clone();
        cache.add_listener(Arc::new(move |event: &CacheEvent| {
            if event.kind == CacheEventKind::Set {
                sink.lock().unwrap().push(event.metadata.clone());
            }
        }));

        cache.put("timed", &1, Expiration::Seconds(60)).await.unwrap();
        cache.put("forever", &1, Expiration::Never).await.unwrap();

        let metadata = metadata.lock().unwrap();
        assert_eq!(metadata[0], serde_json::json!({ "ttl": 60 }));
        assert_eq!(metadata[1], serde_json::json!({ "ttl": null }));
    }

    #[tokio::test]
    async fn test_delete_event_fires_even_for_absent_keys() {
        let cache = client();
        let seen = record_events(&cache);

        assert!(!cache.delete("ghost").await.unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![CacheEventKind::Delete]);
    }

    #[tokio::test]
    async fn test_decode_failure_raises_serialization_error() {
        let (cache, store) = client_with_prefix("");
        store.set("broken", "not json").await.unwrap();

        let seen = record_events(&cache);
        let err = cache.get::<Session>("broken").await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
        assert_eq!(*seen.lock().unwrap(), vec![CacheEventKind::Error]);

        // A failed get counts toward neither hits nor misses.
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_break_operations() {
        let cache = client();
        cache.add_listener(Arc::new(|_: &CacheEvent| panic!("bad listener")));
        let seen = record_events(&cache);

        assert!(cache.put("k", &1, Expiration::Default).await.unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![CacheEventKind::Set]);
    }

    #[tokio::test]
    async fn test_removed_listener_stops_receiving() {
        let cache = client();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let id = cache.add_listener(Arc::new(move |_: &CacheEvent| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        cache.put("k", &1, Expiration::Default).await.unwrap();
        cache.remove_listener(id);
        cache.remove_listener(id);
        cache.put("k", &2, Expiration::Default).await.unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_tags_always_fail() {
        let cache = client();

        let err = cache.tags(["users", "sessions"]).unwrap_err();
        match err {
            CacheError::Unsupported { detail, .. } => {
                assert!(detail.contains("users"));
                assert!(detail.contains("sessions"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_operations_reconnect_after_disconnect() {
        let cache = client();
        cache.put("k", &1, Expiration::Default).await.unwrap();

        cache.disconnect().await.unwrap();
        assert!(!cache.is_connected().await);

        let value: Option<i64> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(1));
        assert!(cache.is_connected().await);
    }
}
