//! Batch distance ranking with optional parallelism.
//!
//! Used by the in-memory record store to answer radius queries and by
//! callers that need a set of points ordered by distance from the user.

use crate::{Coordinate, GeoError, Result, haversine_distance};

/// Anything with an optional position.
///
/// Records without coordinates are never inside a radius.
pub trait Located {
    /// The record's position, if known.
    fn coordinate(&self) -> Option<Coordinate>;
}

impl Located for Coordinate {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(*self)
    }
}

/// A borrowed item together with its distance from a reference point.
#[derive(Debug, Clone, Copy)]
pub struct Ranked<'a, T> {
    /// The ranked item
    pub item: &'a T,
    /// Distance in kilometers (`f64::INFINITY` when the item has no valid position)
    pub distance_km: f64,
}

/// Calculates the distance from `center` to every item, closest first.
///
/// Items without a valid coordinate sort last with an infinite distance.
pub fn rank_by_distance<'a, T>(center: &Coordinate, items: &'a [T]) -> Vec<Ranked<'a, T>>
where
    T: Located + Sync,
{
    let mut ranked = distances(center, items);
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

/// Returns the items within `radius_km` of `center`, closest first.
///
/// # Errors
/// Returns [`GeoError::InvalidRadius`] for a negative or non-finite radius and
/// [`GeoError::InvalidCoordinate`] for an invalid center.
pub fn within_radius<'a, T>(
    center: &Coordinate,
    items: &'a [T],
    radius_km: f64,
) -> Result<Vec<Ranked<'a, T>>>
where
    T: Located + Sync,
{
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(GeoError::InvalidRadius(radius_km));
    }
    if !center.is_valid() {
        return Err(GeoError::InvalidCoordinate(format!(
            "({}, {})",
            center.latitude, center.longitude
        )));
    }

    let mut ranked = distances(center, items);
    ranked.retain(|r| r.distance_km <= radius_km);
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(ranked)
}

fn distances<'a, T>(center: &Coordinate, items: &'a [T]) -> Vec<Ranked<'a, T>>
where
    T: Located + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        items.par_iter().map(|item| rank_single(center, item)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        items.iter().map(|item| rank_single(center, item)).collect()
    }
}

#[inline]
fn rank_single<'a, T: Located>(center: &Coordinate, item: &'a T) -> Ranked<'a, T> {
    let distance_km = item
        .coordinate()
        .filter(Coordinate::is_valid)
        .map_or(f64::INFINITY, |coord| haversine_distance(center, &coord));

    Ranked { item, distance_km }
}
