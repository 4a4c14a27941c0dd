//! Replay a recorded drive through a nearby session

use crate::wiring::{self, Backend};
use crate::{FilterArgs, Format, output};
use anyhow::{Context, Result};
use findixi_core::config::ConfigSchema;
use findixi_discovery::backend::{FavoritesBackend, ProximityBackend, SessionProvider};
use findixi_discovery::memory::{ReplaySource, TrackPoint};
use findixi_discovery::{NearbySession, SessionEvent, SessionHandle, TrackerStatus, UiCommand};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

/// Replays `track` and prints the session's events.
pub async fn run(schema: &ConfigSchema, track: &Path, filters: &FilterArgs, format: Format) -> Result<()> {
    let json = std::fs::read_to_string(track).with_context(|| format!("Failed to read track {}", track.display()))?;
    let points: Vec<TrackPoint> =
        serde_json::from_str(&json).with_context(|| format!("Invalid track {}", track.display()))?;
    info!(points = points.len(), "Replaying drive");

    match Backend::select(schema, filters.fixture.as_deref())? {
        Backend::Fixture(backend) => replay_with(schema, backend, points, filters, format).await,
        Backend::Hosted(backend) => replay_with(schema, backend, points, filters, format).await,
    }
}

async fn replay_with<B>(
    schema: &ConfigSchema,
    backend: Arc<B>,
    points: Vec<TrackPoint>,
    filters: &FilterArgs,
    format: Format,
) -> Result<()>
where
    B: ProximityBackend + SessionProvider + FavoritesBackend + 'static,
{
    let engine = wiring::engine(schema, filters, backend, ReplaySource::new(points))?;
    let (session, handle) = NearbySession::new(Arc::new(engine), schema);
    let session = session.with_request(wiring::request(schema, filters));
    let events = handle.subscribe();

    let (snapshot, failures) = tokio::join!(session.run(), drive(handle, events, format));

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&snapshot.results)?),
        Format::Text => output::print_summary(&snapshot),
    }

    if failures > 0 && snapshot.generation.is_none() {
        anyhow::bail!("No query round succeeded");
    }
    Ok(())
}

/// Prints events and shuts the session down once the drive is over.
/// Returns the number of failed rounds.
async fn drive(handle: SessionHandle, mut events: broadcast::Receiver<SessionEvent>, format: Format) -> usize {
    let mut handle = Some(handle);
    let mut failures = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                if matches!(event, SessionEvent::QueryFailed { .. }) {
                    failures += 1;
                }
                if format == Format::Text {
                    output::print_event(&event);
                }
                let over = matches!(
                    event,
                    SessionEvent::TrackingStopped | SessionEvent::Status(TrackerStatus::Denied)
                );
                // Dropping the handle lets the event channel close once the
                // session has drained its rounds.
                if over {
                    if let Some(handle) = handle.take() {
                        handle.send(UiCommand::Shutdown).await;
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
    failures
}
