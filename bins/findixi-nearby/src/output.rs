//! Terminal rendering of session events and result lists.

use findixi_discovery::{CameraCommand, FollowMode, ProximityResult, SessionEvent, SessionSnapshot, TrackerStatus};
use owo_colors::OwoColorize;

/// Rows printed per committed round
const MAX_ROWS: usize = 10;

pub fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Status(status) => println!("{} tracking {}", "●".cyan(), status_label(*status)),
        SessionEvent::TrackingStopped => println!("{} tracking stopped", "■".dimmed()),
        SessionEvent::Camera(command) => println!("{} {}", "↻".blue(), camera_line(command)),
        SessionEvent::Results { generation, results } => {
            println!(
                "{} round {} committed: {} results",
                "✓".green(),
                generation.get(),
                results.len()
            );
            print_results(results.iter().take(MAX_ROWS));
        }
        SessionEvent::QueryFailed {
            generation,
            message,
            suggestion,
            recoverable,
        } => {
            let round = generation.map_or_else(|| "fix".to_string(), |g| format!("round {}", g.get()));
            println!("{} {} failed: {}", "✗".red(), round, message);
            let hint = if *recoverable {
                format!("{suggestion} (retry available)")
            } else {
                (*suggestion).to_string()
            };
            println!("  {}", hint.dimmed());
        }
        SessionEvent::FavoritesChanged(favorites) => {
            println!("{} {} favorites", "★".yellow(), favorites.ids.len());
        }
    }
}

pub fn print_results<'a>(results: impl IntoIterator<Item = &'a ProximityResult>) {
    for result in results {
        let star = if result.is_favorite { "★" } else { " " };
        let distance = result.travel.as_ref().map_or_else(|| "-".to_string(), |t| t.distance_text());
        let travel = result.travel.as_ref().map_or("-", |t| t.text.as_str());
        let open = if result.is_open_now { "open" } else { "closed" };

        println!(
            "  {} {:<32} {:>8} {:>10}  {}",
            star.yellow(),
            truncate(&result.point.name, 32),
            distance,
            travel.bold(),
            if result.is_open_now { open.green().to_string() } else { open.dimmed().to_string() },
        );
    }
}

pub fn print_summary(snapshot: &SessionSnapshot) {
    println!();
    let mode = match snapshot.follow_mode {
        FollowMode::Following => "following",
        FollowMode::Manual => "manual",
    };
    match snapshot.generation {
        Some(generation) => println!(
            "{} round {}: {} results, camera {} at zoom {:.1}",
            "Summary".bold(),
            generation.get(),
            snapshot.results.len(),
            mode,
            snapshot.zoom
        ),
        None => println!("{} no round committed", "Summary".bold()),
    }
    if let Some(live) = snapshot.live {
        println!("  last position {:.5}, {:.5} at {:.0} mph", live.latitude, live.longitude, live.speed_mph);
    }
}

fn status_label(status: TrackerStatus) -> &'static str {
    match status {
        TrackerStatus::Pending => "pending",
        TrackerStatus::Denied => "denied",
        TrackerStatus::Tracking => "active",
    }
}

fn camera_line(command: &CameraCommand) -> String {
    format!(
        "camera {:.5}, {:.5} zoom {:.1} heading {:.0}° ({} ms)",
        command.center.latitude,
        command.center.longitude,
        command.zoom,
        command.heading,
        command.duration.as_millis()
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use findixi_geo::Coordinate;
    use std::time::Duration;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Cafe", 32), "Cafe");
        assert_eq!(truncate("Panadería La Esquina", 10), "Panadería…");
    }

    #[test]
    fn test_camera_line() {
        let command = CameraCommand {
            center: Coordinate::new(18.4655, -66.1057),
            heading: 90.0,
            pitch: 0.0,
            zoom: 16.5,
            duration: Duration::from_millis(240),
        };
        assert_eq!(camera_line(&command), "camera 18.46550, -66.10570 zoom 16.5 heading 90° (240 ms)");
    }
}
