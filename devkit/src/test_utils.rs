/*!
Utilitaires communs aux tests du relais
*/

use std::time::Duration;

/// Init logging pour tests (idempotent)
pub fn init_test_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Attend qu'une condition devienne vraie, retourne false au timeout
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let ok = condition();
    if !ok {
        log::warn!("⏰ Timeout after {:?} waiting for condition", timeout);
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_until() {
        init_test_logging();
        let calls = AtomicUsize::new(0);
        assert!(wait_until(Duration::from_secs(1), || calls.fetch_add(1, Ordering::SeqCst) >= 2).await);
        assert!(!wait_until(Duration::from_millis(50), || false).await);
    }
}
