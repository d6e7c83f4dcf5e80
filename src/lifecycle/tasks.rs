//! Detached background tasks.

use std::future::Future;

use tokio::task::JoinHandle;

/// Spawn a task nobody has to await. A panic inside it is logged and dropped.
///
/// The returned handle resolves once the task finished either way.
pub fn spawn_detached<F>(name: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::spawn(future).await {
            if e.is_panic() {
                tracing::error!(task = name, error = %e, "Background task panicked");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handle = spawn_detached("boom", async { panic!("boom") });
        assert!(handle.await.is_ok());
    }
}
