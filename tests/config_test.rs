/// Loading of the shipped example configuration and registries.
use std::io::Write;
use std::path::PathBuf;

use news_ranker::pipeline::types::ClickbaitHeuristic;
use news_ranker::{ConfigError, RankerSettings, Registries, RegistryError, SourceRegistry};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("config");
    path.push(name);
    path
}

#[test]
fn example_ranker_config_validates() {
    let config = RankerSettings::from_yaml_path(&fixture("ranker.example.yaml"))
        .expect("example config parses")
        .validate()
        .expect("example config is valid");
    let settings = config.settings();
    assert_eq!(settings.max_items, 10);
    assert_eq!(settings.max_items_per_source, Some(3));
    assert_eq!(settings.trust_floor, Some(20));
    assert_eq!(settings.min_title_len, 16);
    assert_eq!(
        config.clickbait_penalty(ClickbaitHeuristic::BaitPhrase),
        Some(8.0)
    );
}

#[test]
fn example_registries_load() {
    let registries = Registries::load(
        &fixture("sources.example.yaml"),
        &fixture("topics.example.yaml"),
        Some(&fixture("entities.example.yaml")),
    )
    .expect("example registries load");
    assert_eq!(registries.sources.len(), 5);
    assert_eq!(registries.topics.topics().len(), 3);
    assert!(registries
        .entities
        .detect("נתניהו נפגש עם לפיד")
        .contains("netanyahu"));
    let matched: Vec<&str> = registries
        .topics
        .matching("Knesset debates the economic plan")
        .iter()
        .map(|t| t.topic_id.as_str())
        .collect();
    assert_eq!(matched, vec!["politics", "economy"]);
}

#[test]
fn explicit_path_wins_and_env_still_overrides() {
    temp_env::with_vars(
        [
            ("RANKER_CONFIG", Some("/nonexistent/ignored.yaml")),
            ("RANKER_MAX_ITEMS", Some("4")),
        ],
        || {
            let settings = RankerSettings::load(Some(&fixture("ranker.example.yaml")))
                .expect("explicit path loads");
            assert_eq!(settings.max_items, 4);
            assert_eq!(settings.min_title_len, 16);
        },
    );
}

#[test]
fn ranker_config_env_var_points_at_yaml() {
    let path = fixture("ranker.example.yaml").to_string_lossy().into_owned();
    temp_env::with_vars(
        [
            ("RANKER_CONFIG", Some(path.as_str())),
            ("RANKER_MAX_ITEMS", None),
        ],
        || {
            let settings = RankerSettings::from_env().expect("env config loads");
            assert_eq!(settings.max_items_per_source, Some(3));
        },
    );
}

#[test]
fn missing_ranker_config_is_reported() {
    temp_env::with_vars([("RANKER_CONFIG", Some("/nonexistent/ranker.yaml"))], || {
        assert!(matches!(
            RankerSettings::from_env(),
            Err(ConfigError::Io { .. })
        ));
    });
}

#[test]
fn out_of_range_trust_in_yaml_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "sources:\n  - source_id: bad.example\n    trust: 120\n    reach: 10\n"
    )
    .expect("write yaml");
    assert!(matches!(
        SourceRegistry::from_yaml_path(file.path()),
        Err(RegistryError::OutOfRange { field: "trust", .. })
    ));
}

#[test]
fn duplicate_source_in_yaml_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "sources:\n  - source_id: a.com\n    trust: 50\n    reach: 10\n  - source_id: A.com\n    trust: 60\n    reach: 10\n"
    )
    .expect("write yaml");
    assert!(matches!(
        SourceRegistry::from_yaml_path(file.path()),
        Err(RegistryError::Duplicate { .. })
    ));
}
