//! CLI integration tests for the run and validate commands.
//!
//! Tests cover:
//! - Single-series runs from an INI file and a CSV on disk
//! - Command-line overrides of the `[run]` section
//! - Multi-dataset runs over a directory of CSV files
//! - Render log output
//! - Validation failures and their exit-code categories

mod common;

use common::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use tradegym::adapters::file_config_adapter::FileConfigAdapter;
use tradegym::cli::{self, RunOverrides};
use tradegym::domain::error::GymError;

fn write_temp_ini(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("env.ini");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    path
}

fn single_series_ini(csv: &Path) -> String {
    format!(
        r#"
[env]
name = TEST
positions = -1, 0, 1
trading_fees = 0.001
borrow_interest_rate = 0.0001

[data]
path = {}

[run]
episodes = 2
seed = 42
"#,
        csv.display()
    )
}

fn setup_single() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("TEST.csv");
    let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
    fs::write(&csv, csv_text(&closes)).unwrap();
    let ini = write_temp_ini(dir.path(), &single_series_ini(&csv));
    (dir, ini)
}

mod run_command {
    use super::*;

    #[test]
    fn plays_configured_episode_count() {
        let (_dir, ini) = setup_single();
        let summaries = cli::run_episodes(&ini, &RunOverrides::default()).unwrap();

        assert_eq!(summaries.len(), 2);
        for (i, s) in summaries.iter().enumerate() {
            assert_eq!(s.episode, i + 1);
            assert_eq!(s.dataset, "TEST");
            assert!(!s.terminated);
            assert_eq!(s.steps, 11);
            assert_eq!(s.metrics.len(), 2);
            assert!(s.render_path.is_none());
        }
    }

    #[test]
    fn same_seed_same_outcome() {
        let (_dir, ini) = setup_single();
        let a = cli::run_episodes(&ini, &RunOverrides::default()).unwrap();
        let b = cli::run_episodes(&ini, &RunOverrides::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn overrides_take_precedence() {
        let (dir, ini) = setup_single();
        let render_dir = dir.path().join("renders");
        let overrides = RunOverrides {
            episodes: Some(3),
            seed: Some(7),
            render_dir: Some(render_dir.clone()),
        };
        let summaries = cli::run_episodes(&ini, &overrides).unwrap();
        assert_eq!(summaries.len(), 3);
        for s in &summaries {
            let path = s.render_path.as_ref().unwrap();
            assert!(path.starts_with(&render_dir));
            assert!(path.exists());
        }
    }

    #[test]
    fn zero_episode_override_is_rejected() {
        let (_dir, ini) = setup_single();
        let overrides = RunOverrides {
            episodes: Some(0),
            ..RunOverrides::default()
        };
        let err = cli::run_episodes(&ini, &overrides).unwrap_err();
        assert!(matches!(err, GymError::ConfigInvalid { key, .. } if key == "episodes"));
    }

    #[test]
    fn resolve_run_options_merges_sections() {
        let adapter =
            FileConfigAdapter::from_string("[run]\nepisodes = 4\nseed = 1\n").unwrap();
        let options = cli::resolve_run_options(
            &adapter,
            &RunOverrides {
                seed: Some(9),
                ..RunOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(options.episodes, 4);
        assert_eq!(options.seed, Some(9));
    }

    #[test]
    fn dataset_directory_rotates() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("AAA.csv"), csv_text(&[100.0; 6])).unwrap();
        fs::write(data.join("BBB.csv"), csv_text(&[50.0; 8])).unwrap();
        let ini = write_temp_ini(
            dir.path(),
            &format!(
                "[env]\npositions = 0, 1\n\n[data]\ndataset_dir = {}\n\n[run]\nepisodes = 2\nseed = 3\n",
                data.display()
            ),
        );

        let summaries = cli::run_episodes(&ini, &RunOverrides::default()).unwrap();
        let mut names: Vec<&str> = summaries.iter().map(|s| s.dataset.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["AAA", "BBB"]);
    }

    #[test]
    fn missing_csv_is_a_data_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(
            dir.path(),
            &single_series_ini(&dir.path().join("absent.csv")),
        );
        let err = cli::run_episodes(&ini, &RunOverrides::default()).unwrap_err();
        assert!(matches!(err, GymError::Data { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_setup_passes() {
        let (_dir, ini) = setup_single();
        cli::run_validate(&ini).unwrap();
    }

    #[test]
    fn missing_config_file_is_parse_error() {
        let err = cli::run_validate(Path::new("/nonexistent/env.ini")).unwrap_err();
        assert!(matches!(err, GymError::ConfigParse { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bad_fee_is_config_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(
            dir.path(),
            "[env]\ntrading_fees = 1.5\n\n[data]\npath = x.csv\n",
        );
        let err = cli::run_validate(&ini).unwrap_err();
        assert!(matches!(err, GymError::ConfigInvalid { key, .. } if key == "trading_fees"));
    }

    #[test]
    fn window_longer_than_data_fails() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("short.csv");
        fs::write(&csv, csv_text(&[100.0, 101.0, 102.0])).unwrap();
        let ini = write_temp_ini(
            dir.path(),
            &format!("[env]\nwindows = 5\n\n[data]\npath = {}\n", csv.display()),
        );
        let err = cli::run_validate(&ini).unwrap_err();
        assert!(matches!(err, GymError::SeriesInvalid { .. }));
    }

    #[test]
    fn empty_dataset_dir_fails() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(
            dir.path(),
            &format!("[data]\ndataset_dir = {}\n", dir.path().join("none").display()),
        );
        fs::create_dir(dir.path().join("none")).unwrap();
        let err = cli::run_validate(&ini).unwrap_err();
        assert!(matches!(err, GymError::Data { .. }));
    }
}
