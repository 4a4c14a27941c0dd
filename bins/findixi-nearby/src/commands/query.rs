//! Single query around a fixed point

use crate::wiring::{self, Backend};
use crate::{FilterArgs, Format, output};
use anyhow::{Result, bail};
use findixi_core::config::ConfigSchema;
use findixi_discovery::backend::{FavoritesBackend, ProximityBackend, RawFix, SessionProvider};
use findixi_discovery::memory::ReplaySource;
use findixi_discovery::{DisplayFilter, QueryOutcome, UserLocation};
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Client-side narrowing of the committed list
#[derive(Debug, Default)]
pub struct Display {
    /// Free-text filter
    pub search: Option<String>,
    /// Only favorites
    pub favorites_only: bool,
}

/// Queries around `center` and prints the results.
pub async fn run(
    schema: &ConfigSchema,
    center: (f64, f64),
    filters: &FilterArgs,
    display: &Display,
    format: Format,
) -> Result<()> {
    let (lat, lon) = center;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        bail!("Invalid center {lat}, {lon}");
    }

    match Backend::select(schema, filters.fixture.as_deref())? {
        Backend::Fixture(backend) => query_with(schema, backend, center, filters, display, format).await,
        Backend::Hosted(backend) => query_with(schema, backend, center, filters, display, format).await,
    }
}

async fn query_with<B>(
    schema: &ConfigSchema,
    backend: Arc<B>,
    (lat, lon): (f64, f64),
    filters: &FilterArgs,
    display: &Display,
    format: Format,
) -> Result<()>
where
    B: ProximityBackend + SessionProvider + FavoritesBackend,
{
    let source = ReplaySource::new(Vec::new()).with_last_known(RawFix::at(lat, lon));
    let engine = wiring::engine(schema, filters, backend, source)?;

    let mut request = wiring::request(schema, filters);
    request.center = Some(UserLocation::new(lat, lon));

    let round = match engine.query(&request).await {
        Ok(QueryOutcome::Current(round)) => round,
        Ok(QueryOutcome::Superseded(_)) => bail!("Query was superseded"),
        Err(e) => bail!("{e}\n  {}", e.suggestion()),
    };

    let mut filter = DisplayFilter::default().with_favorites_only(display.favorites_only);
    if let Some(text) = &display.search {
        filter = filter.with_search_text(text.clone());
    }
    let shown = filter.apply(&round.results, &round.favorites);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        Format::Text => {
            println!(
                "{} {} of {} within {:.1} mi",
                "●".cyan(),
                shown.len(),
                round.results.len(),
                request.radius_miles
            );
            output::print_results(shown.into_iter());
        }
    }
    Ok(())
}
