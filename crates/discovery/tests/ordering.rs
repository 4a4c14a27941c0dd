//! End-to-end ordering of query rounds through a running session.

use findixi_core::config::ConfigSchema;
use findixi_discovery::memory::{MemoryBackend, ReplaySource};
use findixi_discovery::model::VisibilityFlags;
use findixi_discovery::prelude::*;
use findixi_discovery::{Generation, SessionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn poi(id: i64, lat: f64, category: i64) -> PointOfInterest {
    let mut poi = PointOfInterest::new(id, format!("Comercio {id}"), lat, -66.1057);
    poi.category_ids = vec![category];
    poi.visibility = VisibilityFlags {
        activo: Some(true),
        ..VisibilityFlags::default()
    };
    poi
}

fn session(backend: Arc<MemoryBackend>) -> (NearbySession<MemoryBackend, NoRouting, ReplaySource>, SessionHandle) {
    let source = ReplaySource::new(Vec::new()).with_last_known(RawFix::at(18.4655, -66.1057));
    let engine = ProximityQueryEngine::new(
        backend,
        DistanceResolver::new(Arc::new(NoRouting)),
        Arc::new(LocationTracker::new(Arc::new(source))),
        Arc::new(MemoryFavoritesStore::default()),
        ImageResolver::new("https://project.supabase.co"),
    );
    NearbySession::new(Arc::new(engine), &ConfigSchema::default())
}

fn committed(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<(u64, Vec<i64>)> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            SessionEvent::Results { generation, results } => {
                Some((generation.get(), results.iter().map(|r| r.point.id).collect()))
            }
            _ => None,
        })
        .collect()
}

fn ids(snapshot: &SessionSnapshot) -> Vec<i64> {
    snapshot.results.iter().map(|r| r.point.id).collect()
}

#[tokio::test(start_paused = true)]
async fn test_late_older_round_never_overwrites_newer() {
    let backend = Arc::new(MemoryBackend::new(vec![poi(1, 18.4700, 4), poi(2, 18.4800, 7)]));
    // round n is slow, round n + 1 is fast
    backend.push_latency(Duration::from_millis(500));
    backend.push_latency(Duration::from_millis(100));

    let (session, handle) = session(Arc::clone(&backend));
    let mut events = handle.subscribe();

    let (snapshot, ()) = tokio::join!(session.run(), async {
        handle.send(UiCommand::SetCategory(Some(4))).await;
        handle.send(UiCommand::SetCategory(None)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.send(UiCommand::Shutdown).await;
    });

    assert_eq!(backend.calls(), 2);
    assert_eq!(snapshot.generation.map(Generation::get), Some(2));
    assert_eq!(ids(&snapshot), vec![1, 2]);
    assert_eq!(committed(&mut events), vec![(2, vec![1, 2])]);
}

#[tokio::test(start_paused = true)]
async fn test_in_order_rounds_both_commit() {
    let backend = Arc::new(MemoryBackend::new(vec![poi(1, 18.4700, 4), poi(2, 18.4800, 7)]));
    backend.push_latency(Duration::from_millis(100));
    backend.push_latency(Duration::from_millis(500));

    let (session, handle) = session(Arc::clone(&backend));
    let mut events = handle.subscribe();

    let (snapshot, ()) = tokio::join!(session.run(), async {
        handle.send(UiCommand::SetCategory(Some(4))).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.send(UiCommand::SetCategory(Some(7))).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.send(UiCommand::Shutdown).await;
    });

    assert_eq!(ids(&snapshot), vec![2]);
    assert_eq!(committed(&mut events), vec![(1, vec![1]), (2, vec![2])]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_round_commit() {
    let backend = Arc::new(MemoryBackend::new(vec![poi(1, 18.4700, 4)]));
    backend.push_latency(Duration::from_millis(300));

    let (session, handle) = session(Arc::clone(&backend));

    let (snapshot, ()) = tokio::join!(session.run(), async {
        handle.send(UiCommand::Retry).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.send(UiCommand::Shutdown).await;
    });

    assert_eq!(ids(&snapshot), vec![1]);
    assert_eq!(snapshot.live.map(|l| l.latitude), Some(18.4655));
}
