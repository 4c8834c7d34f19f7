//! Behaviour every engine must share
//!
//! Each check takes a trait object so the same assertions run against every
//! engine and composition.

use std::collections::HashMap;
use std::time::Duration;
use tiercache_cache::{BatchCache, Cache};

const TTL: Duration = Duration::from_secs(10);

fn sample() -> Vec<(String, i64)> {
    vec![
        ("123".to_string(), 234),
        ("234".to_string(), 456),
        ("789".to_string(), 789),
    ]
}

/// Set, hit, miss and presence checks on single keys
pub async fn check_single_key(cache: &dyn Cache<String, i64>) {
    for (key, value) in sample() {
        for _ in 0..5 {
            let set = cache.set(&key, &value, TTL).await;
            assert!(set.err().is_none(), "set {key}: {:?}", set.err());
        }

        let hit = cache.get(&key).await;
        assert!(hit.err().is_none(), "get {key}: {:?}", hit.err());
        assert_eq!(hit.value().unwrap(), Some(value), "get {key}");

        let miss = cache.get(&format!("miss_{key}")).await;
        assert!(miss.err().is_none());
        assert_eq!(miss.value().unwrap(), None);

        let has = cache.has(&key).await;
        assert!(has.err().is_none());
        assert!(has.has(), "has {key}");
    }

    let delete = cache.delete(&"not_exists".to_string()).await;
    assert!(delete.err().is_none());
    assert_eq!(delete.count(), 0);
}

/// Entries vanish once their TTL has passed
pub async fn check_expiry(cache: &dyn Cache<String, i64>) {
    let key = "key_expire".to_string();
    assert!(cache
        .set(&key, &0, Duration::from_millis(50))
        .await
        .is_ok());
    assert_eq!(cache.get(&key).await.value().unwrap(), Some(0));

    tokio::time::sleep(Duration::from_millis(120)).await;

    let expired = cache.get(&key).await;
    assert!(expired.err().is_none());
    assert_eq!(expired.value().unwrap(), None);
    assert!(!cache.has(&key).await.has());
}

/// Multi-key set, get and delete
pub async fn check_batch(cache: &dyn BatchCache<String, i64>) {
    let entries: HashMap<String, i64> = sample()
        .into_iter()
        .map(|(k, v)| (format!("m{k}"), v))
        .collect();
    let keys: Vec<String> = entries.keys().cloned().collect();

    let set = cache.mset(entries.clone(), TTL).await;
    assert!(!set.has_error(), "mset: {:?}", set.err());

    let got = cache.mget(&keys).await;
    assert_eq!(got.len(), keys.len());
    for (key, value) in &entries {
        assert_eq!(got.value(key).unwrap(), Some(*value), "mget {key}");
    }

    let has = cache.mhas(&keys).await;
    assert!(keys.iter().all(|k| has.has(k)));

    assert_eq!(cache.mdelete(&keys).await.deleted(), keys.len());
    assert_eq!(cache.mdelete(&keys).await.deleted(), 0);
}
