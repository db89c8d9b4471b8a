use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use schoolgraph::{BatchFunction, BoxError, LoadError, Loader, LoaderConfig, Many, One};

#[derive(Debug, PartialEq, Eq, Clone)]
struct DummyData {
    id: i64,
    name: String,
}

fn dummy(id: i64, name: &str) -> Option<DummyData> {
    Some(DummyData { id, name: name.to_owned() })
}

#[derive(Default)]
struct DummyContext {
    map: HashMap<i64, String>,
    calls: Mutex<Vec<Vec<i64>>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl DummyContext {
    fn with(rows: &[(i64, &str)]) -> Arc<Self> {
        Arc::new(Self {
            map: rows.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            ..Default::default()
        })
    }

    fn calls(&self) -> Vec<Vec<i64>> {
        self.calls.lock().unwrap().clone()
    }
}

struct DummyDataLoader;

#[async_trait]
impl BatchFunction<i64> for DummyDataLoader {
    type Context = Arc<DummyContext>;
    type Record = DummyData;
    type Cardinality = One;

    fn key_of(record: &DummyData) -> i64 {
        record.id
    }

    async fn load(keys: &[i64], context: &Arc<DummyContext>) -> Result<Vec<DummyData>, BoxError> {
        context.calls.lock().unwrap().push(keys.to_vec());
        if let Some(delay) = context.delay {
            tokio::time::sleep(delay).await;
        }
        if context.fail.load(Ordering::SeqCst) {
            return Err("database unavailable".into());
        }
        // Answer in reverse so the loader has to restore key order itself.
        Ok(keys
            .iter()
            .rev()
            .filter_map(|k| context.map.get(k).map(|v| DummyData { id: *k, name: v.clone() }))
            .collect())
    }
}

#[tokio::test]
async fn basic_load() {
    let context = DummyContext::with(&[(42, "Foo")]);
    let loader = Loader::new(DummyDataLoader, context);
    assert_eq!(loader.load(42).await.unwrap(), dummy(42, "Foo"));
}

#[tokio::test]
async fn missing_key_is_none() {
    let context = DummyContext::with(&[(42, "Foo")]);
    let loader = Loader::new(DummyDataLoader, context);
    assert_eq!(loader.load(7).await.unwrap(), None);
}

#[tokio::test]
async fn repeated_load() {
    let context = DummyContext::with(&[(42, "Foo")]);
    let loader = Loader::new(DummyDataLoader, context.clone());
    assert_eq!(loader.load(42).await.unwrap(), dummy(42, "Foo"));
    assert_eq!(loader.load(42).await.unwrap(), dummy(42, "Foo"));
    assert_eq!(context.calls(), vec![vec![42]]);
}

#[tokio::test]
async fn basic_load_many() {
    let context =
        DummyContext::with(&[(42, "one fish"), (12, "two fish"), (5, "red fish"), (8, "blue fish")]);
    let loader = Loader::new(DummyDataLoader, context.clone());
    assert_eq!(
        loader.load_many(vec![5, 12, 8]).await.unwrap(),
        vec![dummy(5, "red fish"), dummy(12, "two fish"), dummy(8, "blue fish")]
    );
    assert_eq!(context.calls(), vec![vec![5, 8, 12]]);
}

#[tokio::test]
async fn load_async() {
    let context =
        DummyContext::with(&[(42, "one fish"), (12, "two fish"), (5, "red fish"), (8, "blue fish")]);
    let loader = Loader::new(DummyDataLoader, context.clone());

    let tuple = future::join4(
        loader.load(5),
        loader.load_many(vec![5, 42]),
        loader.load(99),
        loader.load(12),
    );

    let (a, b, c, d) = tuple.await;
    assert_eq!(a.unwrap(), dummy(5, "red fish"));
    assert_eq!(b.unwrap(), vec![dummy(5, "red fish"), dummy(42, "one fish")]);
    assert_eq!(c.unwrap(), None);
    assert_eq!(d.unwrap(), dummy(12, "two fish"));

    // One batch, with duplicate keys collapsed.
    assert_eq!(context.calls(), vec![vec![5, 12, 42, 99]]);
}

#[tokio::test]
async fn many_concurrent_loads_make_one_call() {
    let rows = (0..50).map(|i| (i, "row")).collect::<Vec<_>>();
    let context = DummyContext::with(&rows);
    let loader = Loader::new(DummyDataLoader, context.clone());

    let values = future::join_all((0..50).rev().map(|i| loader.load(i))).await;
    assert!(values.iter().all(|v| matches!(v, Ok(Some(_)))));
    assert_eq!(context.calls().len(), 1);
    assert_eq!(context.calls()[0], (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn loaders_do_not_share_caches() {
    let context = DummyContext::with(&[(1, "a")]);
    let first = Loader::new(DummyDataLoader, context.clone());
    let second = Loader::new(DummyDataLoader, context.clone());

    assert_eq!(first.load(1).await.unwrap(), dummy(1, "a"));
    assert_eq!(second.load(1).await.unwrap(), dummy(1, "a"));
    assert_eq!(context.calls(), vec![vec![1], vec![1]]);
}

#[tokio::test]
async fn failed_batch_fails_every_request() {
    let context = DummyContext::with(&[(1, "a"), (2, "b"), (3, "c")]);
    let loader = Loader::new(DummyDataLoader, context.clone());

    context.fail.store(true, Ordering::SeqCst);
    let (a, b, c) = future::join3(loader.load(1), loader.load(2), loader.load_many(vec![2, 3])).await;
    let (a, b, c) = (a.unwrap_err(), b.unwrap_err(), c.unwrap_err());
    assert!(matches!(a, LoadError::Fetch(_)));
    assert!(a.same_batch_failure(&b));
    assert!(a.same_batch_failure(&c));
    assert_eq!(context.calls(), vec![vec![1, 2, 3]]);

    // A fresh key in a new batch loads normally, and failed keys are fetched again.
    context.fail.store(false, Ordering::SeqCst);
    assert_eq!(loader.load(3).await.unwrap(), dummy(3, "c"));
    assert_eq!(loader.load(1).await.unwrap(), dummy(1, "a"));
    assert_eq!(context.calls(), vec![vec![1, 2, 3], vec![3], vec![1]]);
}

#[tokio::test]
async fn invalid_keys_never_reach_the_batch() {
    struct ByName;

    #[async_trait]
    impl BatchFunction<String> for ByName {
        type Context = Arc<Mutex<usize>>;
        type Record = String;
        type Cardinality = One;

        fn key_of(record: &String) -> String {
            record.clone()
        }

        async fn load(keys: &[String], calls: &Arc<Mutex<usize>>) -> Result<Vec<String>, BoxError> {
            *calls.lock().unwrap() += 1;
            Ok(keys.to_vec())
        }
    }

    let calls = Arc::new(Mutex::new(0));
    let loader = Loader::new(ByName, calls.clone());
    assert!(matches!(loader.load(" ".to_owned()).await, Err(LoadError::InvalidKey { .. })));
    assert!(matches!(
        loader.load_many(vec!["ok".to_owned(), String::new()]).await,
        Err(LoadError::InvalidKey { .. })
    ));
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(loader.load_many(vec![]).await.unwrap(), Vec::<Option<String>>::new());
    assert_eq!(loader.load("ok".to_owned()).await.unwrap(), Some("ok".to_owned()));
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn order_follows_request_not_fetch() {
    struct Letters;

    #[async_trait]
    impl BatchFunction<&'static str> for Letters {
        type Context = ();
        type Record = (&'static str, u32);
        type Cardinality = One;

        fn key_of(record: &(&'static str, u32)) -> &'static str {
            record.0
        }

        async fn load(_: &[&'static str], _: &()) -> Result<Vec<(&'static str, u32)>, BoxError> {
            Ok(vec![("b", 2), ("a", 1)])
        }
    }

    let loader = Loader::new(Letters, ());
    assert_eq!(
        loader.load_many(vec!["a", "b", "c"]).await.unwrap(),
        vec![Some(("a", 1)), Some(("b", 2)), None]
    );
}

struct PetsByOwner;

#[async_trait]
impl BatchFunction<i64> for PetsByOwner {
    type Context = Vec<(i64, &'static str)>;
    type Record = (i64, &'static str);
    type Cardinality = Many;

    fn key_of(record: &(i64, &'static str)) -> i64 {
        record.0
    }

    async fn load(
        keys: &[i64],
        pets: &Vec<(i64, &'static str)>,
    ) -> Result<Vec<(i64, &'static str)>, BoxError> {
        Ok(pets.iter().filter(|(owner, _)| keys.contains(owner)).cloned().collect())
    }
}

#[tokio::test]
async fn one_to_many_yields_empty_collections() {
    let loader = Loader::new(PetsByOwner, vec![(1, "cat"), (2, "dog"), (1, "fish")]);
    let (one, two, three) = future::join3(loader.load(1), loader.load(2), loader.load(3)).await;
    assert_eq!(one.unwrap(), vec![(1, "cat"), (1, "fish")]);
    assert_eq!(two.unwrap(), vec![(2, "dog")]);
    assert_eq!(three.unwrap(), vec![]);
}

#[tokio::test]
async fn prime_and_clear() {
    let context = DummyContext::with(&[(1, "stored")]);
    let loader = Loader::new(DummyDataLoader, context.clone());

    loader.prime(1, dummy(1, "primed")).unwrap();
    assert_eq!(loader.load(1).await.unwrap(), dummy(1, "primed"));
    assert!(context.calls().is_empty());

    loader.clear(1).unwrap();
    assert_eq!(loader.load(1).await.unwrap(), dummy(1, "stored"));

    loader.prime_many(vec![(1, None), (2, dummy(2, "two"))]).unwrap();
    assert_eq!(loader.load_many(vec![1, 2]).await.unwrap(), vec![None, dummy(2, "two")]);

    loader.clear_many(vec![1, 2]).unwrap();
    assert_eq!(loader.load_many(vec![1, 2]).await.unwrap(), vec![dummy(1, "stored"), None]);
    assert_eq!(context.calls(), vec![vec![1], vec![1, 2]]);
}

#[tokio::test]
async fn max_batch_size_splits_calls() {
    let context = DummyContext::with(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")]);
    let loader = Loader::with_config(
        DummyDataLoader,
        context.clone(),
        LoaderConfig::default().with_max_batch_size(2),
    );
    assert_eq!(
        loader.load_many(vec![5, 4, 3, 2, 1]).await.unwrap(),
        vec![dummy(5, "e"), dummy(4, "d"), dummy(3, "c"), dummy(2, "b"), dummy(1, "a")]
    );
    assert_eq!(context.calls(), vec![vec![1, 2], vec![3, 4], vec![5]]);
}

#[tokio::test]
async fn slow_batch_times_out() {
    let context = Arc::new(DummyContext {
        map: [(1, "a".to_owned())].into_iter().collect(),
        delay: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    let loader = Loader::with_config(
        DummyDataLoader,
        context,
        LoaderConfig::default().with_batch_timeout(Duration::from_millis(20)),
    );
    let (a, b) = future::join(loader.load(1), loader.load(2)).await;
    assert!(matches!(a, Err(LoadError::Timeout(_))));
    assert!(matches!(b, Err(LoadError::Timeout(_))));
}

#[tokio::test]
async fn clear_all_empties_the_cache() {
    let context = DummyContext::with(&[(1, "stored"), (2, "two")]);
    let loader = Loader::new(DummyDataLoader, context.clone());

    loader.prime_many(vec![(1, dummy(1, "primed")), (2, None)]).unwrap();
    assert_eq!(loader.load_many(vec![1, 2]).await.unwrap(), vec![dummy(1, "primed"), None]);
    assert!(context.calls().is_empty());

    loader.clear_all().unwrap();
    assert_eq!(
        loader.load_many(vec![1, 2]).await.unwrap(),
        vec![dummy(1, "stored"), dummy(2, "two")]
    );
    assert_eq!(context.calls(), vec![vec![1, 2]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_loads_make_one_call_on_multi_thread_runtime() {
    let rows = (0..50).map(|i| (i, "row")).collect::<Vec<_>>();
    for _ in 0..20 {
        let context = DummyContext::with(&rows);
        let loader = Loader::new(DummyDataLoader, context.clone());

        let values = future::join_all((0..50).map(|i| loader.load(i))).await;
        assert!(values.iter().all(|v| matches!(v, Ok(Some(_)))));
        assert_eq!(context.calls(), vec![(0..50).collect::<Vec<_>>()]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn loads_from_spawned_tasks_share_a_batch_within_the_delay() {
    let rows = (0..8).map(|i| (i, "row")).collect::<Vec<_>>();
    let context = DummyContext::with(&rows);
    let loader = Arc::new(Loader::with_config(
        DummyDataLoader,
        context.clone(),
        LoaderConfig::default().with_batch_delay(Duration::from_millis(50)),
    ));

    let handles = (0..8)
        .map(|i| {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(i).await })
        })
        .collect::<Vec<_>>();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), dummy(i as i64, "row"));
    }
    assert_eq!(context.calls(), vec![(0..8).collect::<Vec<_>>()]);
}

#[tokio::test]
async fn zero_yield_count_without_delay_still_batches_joined_loads() {
    let context = DummyContext::with(&[(1, "a"), (2, "b"), (3, "c")]);
    let loader = Loader::with_config(
        DummyDataLoader,
        context.clone(),
        LoaderConfig::default().with_batch_delay(Duration::ZERO).with_yield_count(0),
    );
    let (a, b, c) = future::join3(loader.load(3), loader.load(1), loader.load(2)).await;
    assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (dummy(3, "c"), dummy(1, "a"), dummy(2, "b")));
    assert_eq!(context.calls(), vec![vec![1, 2, 3]]);
}
