use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::Error;
use crate::NetworkError;
use crate::StorageError;

fn unreachable() -> Error {
    NetworkError::Unreachable {
        member: "m1".to_string(),
    }
    .into()
}

#[tokio::test]
async fn test_task_with_timeout_and_exponential_backoff_success() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            let current = counter.fetch_add(1, Ordering::SeqCst);
            if current == 0 {
                Err(unreachable())
            } else {
                Ok::<_, crate::Error>(current)
            }
        }
    };

    let policy = BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 1000,
        max_retries: 3,
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 2); // 1 failure + 1 success
}

#[tokio::test]
async fn test_task_with_timeout_and_exponential_backoff_max_retries() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(unreachable())
        }
    };

    let policy = BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 1000,
        max_retries: 3,
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy).await;

    assert!(matches!(
        result,
        Err(Error::Network(NetworkError::Unreachable { .. }))
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_task_with_timeout_and_exponential_backoff_stops_on_storage_error() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(Error::Storage(StorageError::SlotNotFound {
                store: "test".to_string(),
                location: 7,
            }))
        }
    };

    let policy = BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 1000,
        max_retries: 5,
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy).await;

    assert!(result.unwrap_err().is_slot_not_found());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_task_with_timeout_and_exponential_backoff_timeout() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            // Simulate a long-running task that will timeout
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<u32, _>(42)
        }
    };

    let policy = BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 50, // Short timeout
        max_retries: 2,
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy).await;

    assert!(matches!(result, Err(Error::RetryTimeoutError)));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_max_retries_still_runs_once() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move { Ok::<_, Error>(counter.fetch_add(1, Ordering::SeqCst)) }
    };

    let policy = BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 100,
        max_retries: 0,
    };

    assert_eq!(task_with_timeout_and_exponential_backoff(task, policy).await.unwrap(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
