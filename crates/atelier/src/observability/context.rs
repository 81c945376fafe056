//! Ambient execution context, visible to logging and handlers for the
//! dynamic extent of one invocation.

use std::future::Future;

tokio::task_local! {
    static CURRENT: ExecutionContext;
}

/// Correlation identifiers of one invocation. Task-local: concurrent
/// invocations never observe each other's values, and nested scopes restore
/// the outer binding when they finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub request_id: String,
    pub run_id: String,
    pub trace_id: String,
    pub tool_name: String,
}

impl ExecutionContext {
    /// Run `future` with this context bound. The binding is released when
    /// the future completes, on every exit path.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, future).await
    }

    /// The context bound to the current task, if any.
    pub fn current() -> Option<ExecutionContext> {
        CURRENT.try_with(ExecutionContext::clone).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn ctx(run_id: &str) -> ExecutionContext {
        ExecutionContext {
            request_id: format!("req-{run_id}"),
            run_id: run_id.to_string(),
            trace_id: format!("trace-{run_id}"),
            tool_name: "mock.tool".to_string(),
        }
    }

    #[tokio::test]
    async fn absent_outside_any_scope() {
        assert!(ExecutionContext::current().is_none());
    }

    #[tokio::test]
    async fn visible_inside_scope_and_released_after() {
        ctx("run-1")
            .scope(async {
                let current = ExecutionContext::current().expect("bound");
                assert_eq!(current.run_id, "run-1");
            })
            .await;
        assert!(ExecutionContext::current().is_none());
    }

    #[tokio::test]
    async fn nested_scope_restores_outer_binding() {
        ctx("outer")
            .scope(async {
                ctx("inner")
                    .scope(async {
                        assert_eq!(ExecutionContext::current().unwrap().run_id, "inner");
                    })
                    .await;
                assert_eq!(ExecutionContext::current().unwrap().run_id, "outer");
            })
            .await;
    }

    #[tokio::test]
    async fn concurrent_tasks_are_isolated() {
        let barrier = Arc::new(Barrier::new(2));

        let spawn_probe = |run_id: &str| {
            let barrier = barrier.clone();
            let context = ctx(run_id);
            let expected = run_id.to_string();
            tokio::spawn(async move {
                context
                    .scope(async move {
                        // Hold both tasks inside their scopes at the same time.
                        barrier.wait().await;
                        assert_eq!(ExecutionContext::current().unwrap().run_id, expected);
                        barrier.wait().await;
                        assert_eq!(ExecutionContext::current().unwrap().run_id, expected);
                    })
                    .await;
            })
        };

        let a = spawn_probe("run-a");
        let b = spawn_probe("run-b");
        a.await.expect("task a");
        b.await.expect("task b");
    }
}
