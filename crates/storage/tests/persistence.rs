//! Cenários de persistência: tudo que foi confirmado antes do close tem
//! que reaparecer após reabrir o mesmo log.

use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;

use tidedb_common::StorageError;
use tidedb_storage::{Options, Store};

fn b(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn reopen(store: &Store, path: &std::path::Path) -> Store {
    store.close().unwrap();
    Store::open(path, Options::default()).unwrap()
}

#[tokio::test]
async fn scalar_persistence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(&path, Options::default()).unwrap();

    store.set("k1", b("v1"), Some(Duration::from_secs(10))).unwrap();
    store.set("k2", b("v2"), None).unwrap();
    store.set("k3", b("v3"), None).unwrap();
    store.set("k3", b("v4"), None).unwrap();
    store.remove("k2").unwrap();

    let store = reopen(&store, &path);

    assert_eq!(store.get("k1").unwrap(), b("v1"));
    assert_eq!(store.get("k3").unwrap(), b("v4"));
    assert!(matches!(store.get("k2"), Err(StorageError::KeyNotFound)));
}

#[tokio::test]
async fn hash_merge_persistence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(&path, Options::default()).unwrap();

    store
        .hash_set("h", &[b("k1"), b("v1"), b("k2"), b("v2")])
        .unwrap();
    store.hash_set("h", &[b("k3"), b("v3")]).unwrap();
    store.hash_del("h", "k2").unwrap();

    let store = reopen(&store, &path);

    let all = store.hash_get_all("h").unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["k1"], b("v1"));
    assert_eq!(all["k3"], b("v3"));
}

#[tokio::test]
async fn list_push_pop_persistence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(&path, Options::default()).unwrap();

    store.list_push("l", vec![b("a"), b("b"), b("c")]).unwrap();
    store.list_pop("l").unwrap();

    let store = reopen(&store, &path);

    assert_eq!(store.list_range("l", 0, 1).unwrap(), vec![b("a"), b("b")]);
    assert_eq!(store.list_len("l").unwrap(), 2);
}

#[tokio::test]
async fn remove_and_recreate_persistence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(&path, Options::default()).unwrap();

    store.hash_set("h1", &[b("k1"), b("v1"), b("k2"), b("v2")]).unwrap();
    store.remove("h1").unwrap();
    store.list_push("l1", vec![b("a"), b("b"), b("c")]).unwrap();
    store.remove("l1").unwrap();
    store.list_push("l1", vec![b("a"), b("b"), b("c")]).unwrap();
    store.list_pop("l1").unwrap();

    let store = reopen(&store, &path);

    assert!(matches!(
        store.hash_keys("h1"),
        Err(StorageError::KeyNotFound)
    ));
    assert_eq!(store.list_range("l1", 0, 1).unwrap(), vec![b("a"), b("b")]);
}

#[tokio::test]
async fn empty_and_binary_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(&path, Options::default()).unwrap();

    store.set("vazio", Bytes::new(), None).unwrap();
    store.set("crlf", b("str1\r\nstr2"), None).unwrap();
    store.set("bin", Bytes::from(vec![0u8, 1, 2, 255]), None).unwrap();

    let store = reopen(&store, &path);

    assert_eq!(store.get("vazio").unwrap(), Bytes::new());
    assert_eq!(store.get("crlf").unwrap(), b("str1\r\nstr2"));
    assert_eq!(store.get("bin").unwrap(), Bytes::from(vec![0u8, 1, 2, 255]));
}

#[tokio::test]
async fn truncated_tail_keeps_complete_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(&path, Options::default()).unwrap();

    store.set("k1", b("v1"), None).unwrap();
    store.set("k2", b("v2"), None).unwrap();
    store.close().unwrap();

    // Rastro de uma queda: opcode Set + comprimento de chave anunciando
    // 5 bytes, mas só 2 presentes.
    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap();
    f.write_all(&[1u8]).unwrap();
    f.write_all(&5u64.to_le_bytes()).unwrap();
    f.write_all(b"ab").unwrap();
    drop(f);

    let store = Store::open(&path, Options::default()).unwrap();
    assert_eq!(store.get("k1").unwrap(), b("v1"));
    assert_eq!(store.get("k2").unwrap(), b("v2"));
}

#[tokio::test]
async fn no_async_mode_persists_without_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let opts = Options {
        no_async: true,
        ..Options::default()
    };

    {
        let store = Store::open(&path, opts.clone()).unwrap();
        store.set("k", b("v"), None).unwrap();
        // Sem close: escrita direta já está no arquivo.
    }

    let store = Store::open(&path, opts).unwrap();
    assert_eq!(store.get("k").unwrap(), b("v"));
}

#[tokio::test]
async fn sharded_store_replays_into_any_shard_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");

    let store = Store::open(
        &path,
        Options {
            shard_count: 100,
            ..Options::default()
        },
    )
    .unwrap();
    for i in 0..200 {
        store.set(&format!("k{i}"), b(&format!("v{i}")), None).unwrap();
    }
    store.close().unwrap();

    // O log não carrega o número de shards; reabrir com outro layout
    // reconstrói o mesmo estado.
    let store = Store::open(&path, Options::default()).unwrap();
    for i in 0..200 {
        assert_eq!(store.get(&format!("k{i}")).unwrap(), b(&format!("v{i}")));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_disjoint_writers_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.aol");
    let store = Store::open(
        &path,
        Options {
            shard_count: 16,
            ..Options::default()
        },
    )
    .unwrap();

    let mut handles = Vec::new();
    for t in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10_000 {
                let key = format!("t{t}:k{i}");
                store.set(&key, Bytes::from(format!("{t}:{i}")), None).unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    for t in 0..8 {
        for i in 0..10_000 {
            let key = format!("t{t}:k{i}");
            assert_eq!(store.get(&key).unwrap(), Bytes::from(format!("{t}:{i}")));
        }
    }
    assert_eq!(store.keys().count(), 80_000);

    // E o log reconstrói tudo.
    let store = reopen(&store, &path);
    assert_eq!(store.keys().count(), 80_000);
}
