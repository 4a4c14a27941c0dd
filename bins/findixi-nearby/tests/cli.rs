use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SAN_JUAN: (&str, &str) = ("18.4655", "-66.1057");

struct TestEnv {
    tmp: TempDir,
    config: PathBuf,
    fixture: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let fixture = tmp.path().join("comercios.json");
        fs::write(&fixture, FIXTURE).unwrap();

        let config = tmp.path().join("findixi.toml");
        let favorites = tmp.path().join("favorites.json");
        fs::write(
            &config,
            format!(
                "[routing]\nenabled = false\n\n[telemetry]\nlog_level = \"warn\"\n\n[favorites]\nlocal_path = '{}'\n",
                favorites.display()
            ),
        )
        .unwrap();

        Self { tmp, config, fixture }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("findixi-nearby").unwrap();
        cmd.arg("--config")
            .arg(&self.config)
            .env_remove("RUST_LOG")
            .env_remove("FINDIXI_SUPABASE_URL");
        cmd
    }

    fn query(&self, extra: &[&str]) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["query", "--lat", SAN_JUAN.0, "--lon", SAN_JUAN.1, "--fixture"])
            .arg(&self.fixture)
            .args(extra);
        cmd
    }

    fn query_ids(&self, extra: &[&str]) -> Vec<i64> {
        let out = self
            .query(extra)
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let rows: Vec<Value> = serde_json::from_slice(&out).unwrap();
        rows.iter().map(|row| row["id"].as_i64().unwrap()).collect()
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

const FIXTURE: &str = r#"[
  {"id": 1, "nombre": "Café Colao", "latitud": 18.4670, "longitud": -66.1060,
   "categoria_ids": [4], "activo": true, "abierto_ahora": true},
  {"id": 2, "nombre": "Panadería Ponce", "latitud": 18.0111, "longitud": -66.6141,
   "categoria_ids": [4], "activo": true},
  {"id": 3, "nombre": "Taller Cerrado", "latitud": 18.4700, "longitud": -66.1100,
   "activo": false},
  {"id": 4, "nombre": "Librería Norte", "latitud": 18.4800, "longitud": -66.1000,
   "categoria_ids": [7], "activo": true, "abierto_ahora": false, "municipio": "San Juan"}
]"#;

#[test]
fn query_lists_active_records_in_radius() {
    let env = TestEnv::new();
    env.query(&[])
        .assert()
        .success()
        .stdout(contains("Café Colao"))
        .stdout(contains("Librería Norte"))
        .stdout(contains("Panadería Ponce").not())
        .stdout(contains("Taller Cerrado").not());
}

#[test]
fn query_json_is_ordered_by_distance() {
    let env = TestEnv::new();
    assert_eq!(env.query_ids(&[]), vec![1, 4]);
}

#[test]
fn wider_radius_reaches_ponce() {
    let env = TestEnv::new();
    assert_eq!(env.query_ids(&["--radius", "100"]), vec![1, 4, 2]);
}

#[test]
fn radius_is_clamped_to_configured_maximum() {
    let env = TestEnv::new();
    env.query(&["--radius", "5000"])
        .assert()
        .success()
        .stdout(contains("within 100.0 mi"));
}

#[test]
fn category_and_open_now_filters() {
    let env = TestEnv::new();
    assert_eq!(env.query_ids(&["--category", "7"]), vec![4]);
    assert_eq!(env.query_ids(&["--open-now"]), vec![1]);
}

#[test]
fn search_is_accent_insensitive() {
    let env = TestEnv::new();
    assert_eq!(env.query_ids(&["--search", "libreria"]), vec![4]);
}

#[test]
fn favorite_toggle_round_trip() {
    let env = TestEnv::new();
    env.cmd()
        .args(["favorite", "4"])
        .assert()
        .success()
        .stdout(contains("4 added to favorites"));

    assert_eq!(env.query_ids(&["--favorites-only"]), vec![4]);

    env.cmd()
        .args(["favorite", "4"])
        .assert()
        .success()
        .stdout(contains("4 removed from favorites"));

    assert!(env.query_ids(&["--favorites-only"]).is_empty());
}

#[test]
fn favorite_rejects_non_positive_id() {
    let env = TestEnv::new();
    env.cmd()
        .args(["favorite", "0"])
        .assert()
        .failure()
        .stderr(contains("positive"));
}

#[test]
fn replay_commits_rounds_and_stops() {
    let env = TestEnv::new();
    let track = env.write(
        "drive.json",
        r#"[
          {"latitude": 18.4655, "longitude": -66.1057, "speed_mps": 0.0},
          {"after_ms": 50, "latitude": 18.4660, "longitude": -66.1057, "heading": 0.0, "speed_mps": 2.0}
        ]"#,
    );

    env.cmd()
        .args(["replay", "--track"])
        .arg(&track)
        .arg("--fixture")
        .arg(&env.fixture)
        .assert()
        .success()
        .stdout(contains("committed"))
        .stdout(contains("camera"))
        .stdout(contains("tracking stopped"))
        .stdout(contains("Café Colao"));
}

#[test]
fn metrics_flag_reports_query_rounds() {
    let env = TestEnv::new();
    env.query(&["--metrics"])
        .assert()
        .success()
        .stderr(contains("\"nearby.queries.issued\": 1"))
        .stderr(contains("nearby.query.duration_ms"));
}

#[test]
fn missing_fixture_fails() {
    let env = TestEnv::new();
    env.cmd()
        .args(["query", "--lat", "18.4", "--lon", "-66.1", "--fixture"])
        .arg(Path::new("does-not-exist.json"))
        .assert()
        .failure()
        .stderr(contains("Failed to read fixture"));
}

#[test]
fn no_record_store_configured_fails() {
    let env = TestEnv::new();
    env.cmd()
        .args(["query", "--lat", "18.4", "--lon", "-66.1"])
        .assert()
        .failure()
        .stderr(contains("No record store"));
}

#[test]
fn invalid_center_fails() {
    let env = TestEnv::new();
    env.query(&[])
        .args(["--lat", "95"])
        .assert()
        .failure();
}
