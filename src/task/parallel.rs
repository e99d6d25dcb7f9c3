//! Bounded fan-out of per-host work

use crate::context::Context;
use crate::error::{ClusterError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `f` for every item with at most `ctx.concurrency()` in flight
///
/// Returns once every unit finished. After the first failure no new unit is
/// started, units already running see a cancelled context, and the first
/// error is returned. Units skipped because the parent context was cancelled
/// turn the result into [`ClusterError::Cancelled`].
pub async fn run_bounded<T, F, Fut>(ctx: &Context, items: Vec<T>, f: F) -> Result<()>
where
    T: Send + 'static,
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    ctx.check_cancelled()?;
    if items.is_empty() {
        return Ok(());
    }

    let scope = ctx.child();
    let permits = Arc::new(Semaphore::new(ctx.concurrency()));
    let f = Arc::new(f);
    let mut tasks = JoinSet::new();

    for item in items {
        let scope = scope.clone();
        let permits = permits.clone();
        let f = f.clone();

        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ClusterError::Internal(e.to_string()))?;
            if scope.is_cancelled() {
                return Ok(false);
            }
            // cancel while still holding the permit so no waiting unit starts
            match (*f)(scope.clone(), item).await {
                Ok(()) => Ok(true),
                Err(e) => {
                    scope.cancel_token().cancel();
                    Err(e)
                }
            }
        });
    }

    let mut first_err = None;
    let mut skipped = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let result = joined
            .map_err(|e| ClusterError::Internal(format!("worker failed: {}", e)))
            .and_then(|r| r);

        match result {
            Ok(true) => {}
            Ok(false) => skipped += 1,
            Err(e) => {
                if first_err.is_none() {
                    scope.cancel_token().cancel();
                    first_err = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_err {
        return Err(e);
    }
    if skipped > 0 {
        return Err(ClusterError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_budget() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let (r, p, d) = (running.clone(), peak.clone(), done.clone());
        run_bounded(&Context::new(3), (0..10).collect(), move |_ctx, _i: i32| {
            let (r, p, d) = (r.clone(), p.clone(), d.clone());
            async move {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                r.fetch_sub(1, Ordering::SeqCst);
                d.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_error_stops_new_work() {
        let started = Arc::new(AtomicUsize::new(0));

        let s = started.clone();
        let err = run_bounded(&Context::new(1), (0..5).collect(), move |_ctx, _i: i32| {
            let s = s.clone();
            async move {
                if s.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ClusterError::Internal("first unit failed".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("first unit failed"));
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_on_many_workers_start_one_unit() {
        let started = Arc::new(AtomicUsize::new(0));

        let s = started.clone();
        let result = run_bounded(&Context::new(1), (0..20).collect(), move |_ctx, i: i32| {
            let s = s.clone();
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                Err(ClusterError::Internal(format!("unit {} failed", i)))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_failure_blocks_waiting_units() {
        let started = Arc::new(AtomicUsize::new(0));

        let s = started.clone();
        let result = run_bounded(&Context::new(1), (0..3).collect(), move |_ctx, _i: i32| {
            let s = s.clone();
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(ClusterError::Internal("slow failure".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_parent_runs_nothing() {
        let ctx = Context::new(4);
        ctx.cancel_token().cancel();

        let err = run_bounded(&ctx, vec![1, 2, 3], |_ctx, _i: i32| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_items() {
        run_bounded(&Context::new(1), Vec::<i32>::new(), |_ctx, _i| async { Ok(()) })
            .await
            .unwrap();
    }
}
