//! Periodic refresh scheduler
//!
//! Table kinds fed by background activity (runs, scheduled tasks, live
//! services) get a per-instance ticker that silently reloads the grid,
//! provided the user has been recently active. An idle user skips the work
//! but never stops the ticker. The tick immediately following construction
//! is always skipped: the mount just fetched.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::instance::PageReset;
use super::GridContext;

/// Spawn the refresh task for one instance. The handle is stored in the
/// instance record and aborted on destruction; nothing else stops it.
pub(super) fn spawn_periodic_refresh(context: Arc<GridContext>, id: String) -> JoinHandle<()> {
    let period = context.settings().refresh_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The interval fires once immediately; consuming it here is the
        // skipped first tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !context.shell().is_user_active() {
                tracing::trace!(instance = %id, "user idle, skipping refresh tick");
                continue;
            }
            let Some(instance) = context.instance(&id) else {
                continue;
            };
            context.reload(&instance, PageReset::Keep).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::client::testing::StubTransport;
    use crate::registry::builtin;
    use crate::shell::testing::RecordingShell;
    use crate::table::{GridContext, GridSettings};

    struct Harness {
        context: Arc<GridContext>,
        transport: Arc<StubTransport>,
        shell: Arc<RecordingShell>,
    }

    fn harness() -> Harness {
        let transport = Arc::new(StubTransport::new());
        let shell = Arc::new(RecordingShell::new());
        let context = GridContext::new(
            builtin::registry().unwrap(),
            GridSettings::default(),
            transport.clone(),
            shell.clone(),
        );
        Harness {
            context,
            transport,
            shell,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_mount_is_skipped() {
        let h = harness();
        h.context.mount("run").await.unwrap();
        assert_eq!(h.transport.fetch_count(), 1);

        // Right after the mount no scheduler fetch has piled on
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.transport.fetch_count(), 1);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(h.transport.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_user_skips_tick_but_timer_survives() {
        let h = harness();
        h.context.mount("run").await.unwrap();
        h.shell.set_active(false);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(h.transport.fetch_count(), 1, "idle tick issues no fetch");

        // A later tick with activity restored fetches again, proving the
        // ticker never stopped
        h.shell.set_active(true);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(h.transport.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_refresh_task() {
        let h = harness();
        h.context.mount("run").await.unwrap();
        h.context.destroy("run");

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(h.transport.fetch_count(), 1, "no fetch after destruction");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_keeps_current_page() {
        let h = harness();
        let instance = h.context.mount("run").await.unwrap();
        h.context.set_page(&instance, 2).await;

        tokio::time::sleep(Duration::from_millis(3100)).await;
        let query = h.transport.last_query().unwrap();
        assert_eq!(query.page, 2, "scheduler refresh does not reset paging");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_live_kinds_never_tick() {
        let h = harness();
        h.context.mount("device").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(h.transport.fetch_count(), 1);
    }
}
