use futures::future::join_all;
use solo_actors::counter::{self, CounterOp};
use solo_actors::kv;
use solo_actors::rate::{self, BucketCfg};
use solo_actors::shard::ShardedKv;
use solo_actors::{Failure, Operation, Value};
use std::collections::HashSet;
use std::time::Duration;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_never_lost() {
    common::init_test_tracing();
    let hits = counter::spawn(0);

    let callers: Vec<_> = (0..100)
        .map(|_| {
            let hits = hits.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    hits.increment().await.unwrap();
                }
            })
        })
        .collect();
    for caller in join_all(callers).await {
        caller.unwrap();
    }

    assert_eq!(hits.get().await.unwrap(), 1000);
    hits.shutdown_and_wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_caller_receives_its_own_reply() {
    common::init_test_tracing();
    let hits = counter::spawn(0);

    let callers: Vec<_> = (0..100)
        .map(|_| {
            let addr = hits.addr();
            tokio::spawn(async move {
                let (op, pending) = Operation::new(CounterOp::Increment, None, None);
                let id = op.id();
                assert_eq!(pending.id(), id);
                addr.send(op).await.unwrap();
                // `recv` asserts the reply carries this operation's id.
                pending.recv().await.unwrap().unwrap()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for caller in join_all(callers).await {
        let n = caller.unwrap().as_int().unwrap();
        assert!(seen.insert(n), "reply {n} delivered twice");
    }
    assert_eq!(seen, (1..=100).collect::<HashSet<i64>>());
    hits.shutdown_and_wait().await;
}

#[tokio::test]
async fn counter_increment_and_reset_scenario() {
    let hits = counter::spawn(0);
    for _ in 0..3 {
        hits.increment().await.unwrap();
    }
    assert_eq!(hits.get().await.unwrap(), 3);
    hits.reset().await.unwrap();
    assert_eq!(hits.get().await.unwrap(), 0);
    hits.shutdown_and_wait().await;
}

#[tokio::test]
async fn kv_set_len_delete_scenario() {
    let store = kv::spawn([]);
    store.set("a", 1).await.unwrap();
    store.set("b", 2).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 2);
    assert_eq!(store.delete("a").await.unwrap(), Some(Value::Int(1)));
    assert_eq!(store.len().await.unwrap(), 1);

    let err = store.get("a").await.unwrap_err();
    assert_eq!(
        err.failure(),
        Some(&Failure::NotFound { key: "a".into() })
    );
    store.shutdown_and_wait().await;
}

#[tokio::test]
async fn kv_reads_see_the_latest_write() {
    let store = kv::spawn([]);
    let samples = [
        ("flag", Value::Bool(true)),
        ("name", Value::from("solo")),
        ("n", Value::Int(-7)),
        ("flag", Value::Bool(false)),
    ];
    for (key, value) in samples {
        store.set(key, value.clone()).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), value);
    }
    assert!(store.exists("name").await.unwrap());
    store.delete("name").await.unwrap();
    assert!(!store.exists("name").await.unwrap());
    assert_eq!(store.delete("name").await.unwrap(), None);
    store.shutdown_and_wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sharded_kv_behaves_like_one_store() {
    common::init_test_tracing();
    let store = ShardedKv::spawn(4, 64);

    let writers: Vec<_> = (0..200)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.set(format!("k{i}"), i).await })
        })
        .collect();
    for writer in join_all(writers).await {
        assert_eq!(writer.unwrap().unwrap(), None);
    }

    assert_eq!(store.len().await.unwrap(), 200);
    for i in (0..200).step_by(17) {
        let key = format!("k{i}");
        assert_eq!(store.get(&key).await.unwrap(), Value::Int(i));
        assert_eq!(
            store.shard_for(&key).get(&key).await.unwrap(),
            Value::Int(i)
        );
    }
    store.shutdown_and_wait().await;
    assert!(store.shards().iter().all(|s| s.is_stopped()));
}

#[tokio::test(start_paused = true)]
async fn token_bucket_stays_within_bounds() {
    common::init_test_tracing();
    let bucket = BucketCfg::new(3, Duration::from_millis(100)).with_refill_amount(2);
    let limiter = rate::spawn(bucket);

    for _ in 0..3 {
        assert!(limiter.try_acquire().await.unwrap());
    }
    assert!(!limiter.try_acquire().await.unwrap());
    assert_eq!(limiter.available().await.unwrap(), 0);

    // Several refills in a row never overfill the bucket.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(limiter.available().await.unwrap(), 3);

    assert!(limiter.try_acquire_many(2).await.unwrap());
    assert!(!limiter.try_acquire_many(2).await.unwrap());
    assert_eq!(limiter.available().await.unwrap(), 1);
    limiter.shutdown_and_wait().await;
}

#[tokio::test(start_paused = true)]
async fn parked_acquires_are_released_on_refill_and_on_stop() {
    common::init_test_tracing();
    let limiter = rate::spawn(BucketCfg::new(1, Duration::from_millis(100)));
    limiter.acquire().await.unwrap();

    let waiter = {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.acquire().await })
    };
    waiter.await.unwrap().unwrap();
    assert_eq!(limiter.available().await.unwrap(), 0);

    let stranded = {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.acquire().await })
    };
    tokio::task::yield_now().await;
    limiter.shutdown_and_wait().await;
    assert!(stranded.await.unwrap().unwrap_err().is_unreachable());
}
