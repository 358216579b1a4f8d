//! Auto-save behaviour under virtual time.

use aac_vocab::{
    AggregateKind, AutoSave, AutoSaveConfig, MemoryStore, NewWord, PersistOp, Repository,
    SaveCallbacks, SaveStatus, StoreError, Timestamp, Vocabulary, VocabularyConfig, Word,
    WordChanges, WordId, WordType,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

type Events = Arc<Mutex<Vec<String>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn recording(events: &Events) -> SaveCallbacks {
    let (a, b, c) = (events.clone(), events.clone(), events.clone());
    SaveCallbacks::new()
        .on_saving(move || a.lock().push("saving".into()))
        .on_saved(move || b.lock().push("saved".into()))
        .on_error(move |e| c.lock().push(format!("error: {}", e)))
}

fn config(debounce_ms: u64) -> AutoSaveConfig {
    AutoSaveConfig {
        debounce: Duration::from_millis(debounce_ms),
        ..Default::default()
    }
}

// --- Debounce Window ---

#[tokio::test(start_paused = true)]
async fn test_text_field_example() {
    init_tracing();
    let saved: Arc<Mutex<Vec<Value>>> = Arc::default();
    let events: Events = Arc::default();

    let sink = saved.clone();
    let autosave = AutoSave::new(
        move |payload: Value| {
            sink.lock().push(payload);
            async { Ok(()) }
        },
        config(500),
        recording(&events),
    )
    .unwrap();

    let called_at = Timestamp::now();
    autosave.trigger(json!({"text": "a"}));
    sleep(Duration::from_millis(100)).await;
    autosave.trigger(json!({"text": "b"}));

    // 500ms in: the window restarted at 100ms
    sleep(Duration::from_millis(400)).await;
    assert!(saved.lock().is_empty());

    sleep(Duration::from_millis(500)).await;
    assert_eq!(*saved.lock(), vec![json!({"text": "b"})]);
    assert_eq!(*events.lock(), vec!["saving", "saved"]);
    assert!(autosave.last_saved().unwrap() >= called_at);
}

#[tokio::test(start_paused = true)]
async fn test_window_reset_at_400ms() {
    let saved: Arc<Mutex<Vec<u32>>> = Arc::default();
    let sink = saved.clone();
    let autosave = AutoSave::new(
        move |payload: u32| {
            sink.lock().push(payload);
            async { Ok(()) }
        },
        config(500),
        SaveCallbacks::new(),
    )
    .unwrap();

    autosave.trigger(1);
    sleep(Duration::from_millis(400)).await;
    autosave.trigger(2);

    sleep(Duration::from_millis(499)).await;
    assert!(saved.lock().is_empty());

    sleep(Duration::from_millis(2)).await;
    assert_eq!(*saved.lock(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_cycles_are_independent() {
    let saved: Arc<Mutex<Vec<u32>>> = Arc::default();
    let events: Events = Arc::default();
    let sink = saved.clone();
    let autosave = AutoSave::new(
        move |payload: u32| {
            sink.lock().push(payload);
            async { Ok(()) }
        },
        config(500),
        recording(&events),
    )
    .unwrap();

    autosave.trigger(1);
    sleep(Duration::from_millis(600)).await;
    autosave.trigger(2);
    sleep(Duration::from_millis(600)).await;

    assert_eq!(*saved.lock(), vec![1, 2]);
    assert_eq!(*events.lock(), vec!["saving", "saved", "saving", "saved"]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_payloads_forwarded() {
    let saved: Arc<Mutex<Vec<Option<Value>>>> = Arc::default();
    let sink = saved.clone();
    let autosave = AutoSave::new(
        move |payload: Option<Value>| {
            sink.lock().push(payload);
            async { Ok(()) }
        },
        config(100),
        SaveCallbacks::new(),
    )
    .unwrap();

    for payload in [None, Some(Value::Null), Some(json!({}))] {
        autosave.trigger(payload);
        sleep(Duration::from_millis(200)).await;
    }

    assert_eq!(
        *saved.lock(),
        vec![None, Some(Value::Null), Some(json!({}))]
    );
}

// --- Callback Ordering ---

#[tokio::test(start_paused = true)]
async fn test_one_terminal_callback_per_cycle() {
    let events: Events = Arc::default();
    let attempt = Arc::new(Mutex::new(0u32));

    let counter = attempt.clone();
    let autosave = AutoSave::new(
        move |_: ()| {
            let n = {
                let mut attempt = counter.lock();
                *attempt += 1;
                *attempt
            };
            async move {
                if n % 2 == 0 {
                    Err(StoreError::Persist(format!("attempt {}", n)))
                } else {
                    Ok(())
                }
            }
        },
        config(50),
        recording(&events),
    )
    .unwrap();

    for _ in 0..4 {
        autosave.trigger(());
        sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(
        *events.lock(),
        vec![
            "saving",
            "saved",
            "saving",
            "error: Persist failed: attempt 2",
            "saving",
            "saved",
            "saving",
            "error: Persist failed: attempt 4",
        ]
    );
}

// --- Teardown ---

#[tokio::test(start_paused = true)]
async fn test_dropping_coordinator_cancels_pending_save() {
    let calls = Arc::new(Mutex::new(0u32));
    let counter = calls.clone();
    let autosave = AutoSave::new(
        move |_: u32| {
            *counter.lock() += 1;
            async { Ok(()) }
        },
        config(100),
        SaveCallbacks::new(),
    )
    .unwrap();

    autosave.trigger(1);
    drop(autosave);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(*calls.lock(), 0);
}

// --- Through the Vocabulary ---

#[tokio::test(start_paused = true)]
async fn test_failed_word_save_rolls_back_then_retries() {
    init_tracing();
    let store = MemoryStore::new();
    Repository::<Word>::create(&store, NewWord::new("yes", WordType::Social))
        .await
        .unwrap();

    let vocab = Vocabulary::open(
        Arc::new(store.clone()),
        VocabularyConfig {
            autosave: config(100),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let events: Events = Arc::default();
    let autosave = vocab
        .word_autosave(WordId(1), recording(&events))
        .unwrap();

    store.fail_next(AggregateKind::Word, PersistOp::Update);
    autosave.trigger(WordChanges::text("yes please"));
    sleep(Duration::from_millis(150)).await;

    assert_eq!(autosave.status(), SaveStatus::Error);
    assert_eq!(vocab.words().get(WordId(1)).unwrap().text, "yes");

    assert!(autosave.retry());
    sleep(Duration::from_millis(10)).await;

    assert_eq!(autosave.status(), SaveStatus::Saved);
    assert_eq!(vocab.words().get(WordId(1)).unwrap().text, "yes please");
    assert_eq!(events.lock().len(), 4);
}
