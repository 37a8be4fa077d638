//! Simulate command handler
//!
//! Signs a synthetic identity in, publishes live events (optionally dropping
//! the channel), exercises read-state operations and prints what the engine
//! and the backend observed.

use anyhow::{anyhow, Result};
use herald_core::{HeraldError, IdentitySource};
use herald_notify::{EngineConfig, FeedStatus, NotificationEngine, NotificationView};
use herald_testkit::{identity, notification, notification_batch, InMemoryBackend};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(30);
const POLL: Duration = Duration::from_millis(10);

/// Simulation knobs
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub events: usize,
    pub seed: usize,
    pub drop_every: usize,
    pub fail_writes: bool,
}

/// Run one simulated session end to end
pub async fn handle_simulate(config: EngineConfig, options: SimulateOptions) -> Result<()> {
    let namespace = config.namespace;
    let expected_snapshot = options.seed.min(config.effective_page_size());

    let backend = InMemoryBackend::new();
    let user = identity("simulated-user");
    backend.seed(namespace, notification_batch(user, "seed", options.seed));
    if options.fail_writes {
        backend.fail_all_writes(Some(HeraldError::network("simulated outage")));
    }

    let engine = Arc::new(NotificationEngine::new(backend.shared(), config));
    let _observer = engine.observe(|view| {
        tracing::debug!(
            status = ?view.status,
            notifications = view.len(),
            unread = view.unread_count,
            "view published"
        );
    });

    let source = IdentitySource::new();
    let runner = {
        let engine = engine.clone();
        let watcher = source.watch();
        tokio::spawn(async move { engine.run(watcher).await })
    };

    source.sign_in(user);
    let view = await_view(&engine, "session to go live", |v| v.status == FeedStatus::Live).await?;
    println!(
        "session live in '{namespace}': {} notifications, {} unread",
        view.len(),
        view.unread_count
    );

    let base = u64::try_from(options.seed).unwrap_or(u64::MAX);
    for i in 1..=options.events {
        if options.drop_every > 0 && i % options.drop_every == 0 {
            backend.disconnect_all();
            await_view(&engine, "reconnect", |v| v.status == FeedStatus::Live).await?;
        }
        let created_at = base.saturating_add(u64::try_from(i).unwrap_or(u64::MAX));
        backend.insert(namespace, notification(user, &format!("event-{i}"), created_at));
    }

    let expected = expected_snapshot + options.events;
    let view = await_view(&engine, "live events", |v| v.len() >= expected).await?;
    println!(
        "after {} live events: {} notifications, {} unread",
        options.events,
        view.len(),
        view.unread_count
    );

    if let Some(newest) = view.notifications.first() {
        let outcome = engine.mark_read(newest.id).await?;
        println!("mark_read({}): {outcome:?}", newest.id);
    }
    let outcome = engine.mark_all_read(user).await?;
    println!("mark_all_read: {outcome:?}");

    let view = engine.current_view();
    println!("unread after reads: {}", view.unread_count);
    if let Some(warning) = &view.warning {
        println!("warning: {warning}");
        println!("hint: {}", warning.category().resolution_hint());
    }

    source.sign_out();
    drop(source);
    runner.await?;

    println!(
        "backend saw {} fetch(es), {} subscription(s), {} write attempt(s), {} saved write(s)",
        backend.fetch_count(),
        backend.subscribe_count(),
        backend.write_attempts(),
        backend.writes().len()
    );
    Ok(())
}

async fn await_view<F>(engine: &NotificationEngine, what: &str, predicate: F) -> Result<NotificationView>
where
    F: Fn(&NotificationView) -> bool,
{
    let view = engine.view();
    tokio::time::timeout(WAIT, async {
        loop {
            let current = view.get();
            if predicate(&current) {
                return current;
            }
            tokio::time::sleep(POLL).await;
        }
    })
    .await
    .map_err(|_| anyhow!("Timed out waiting for {what}"))
}
