#![allow(clippy::unwrap_used)]
// Loading configuration and facility files from disk.

use std::io::Write;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use lightpath_config::{ConfigError, DestinationSpec, load_config, load_facility};
use lightpath_core::{BranchTarget, Controller, LightpathDevice};

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config.sources, vec!["K0", "L0"]);
    assert!(config.destinations.contains_key("MFX"));
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_temp(
        r#"
        sources = ["L0"]
        minimum_transmission = 0.25

        [destinations]
        MAIN = ["L0"]
        SHORT = { L2 = 35.0 }

        [defaults]
        output = "json"
        "#,
    );
    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.sources, vec!["L0"]);
    assert_eq!(config.defaults.output, "json");
    assert_eq!(config.defaults.timeout, 30);
    assert_eq!(
        config.destinations["SHORT"],
        DestinationSpec::Cutoffs([("L2".to_owned(), Some(35.0))].into_iter().collect())
    );
    // Built-in destinations remain alongside new ones.
    assert!(config.destinations.contains_key("XPP"));

    let beamline = config.to_beamline_config().unwrap();
    assert_eq!(beamline.minimum_transmission, 0.25);
    assert_eq!(
        beamline.targets("SHORT").unwrap(),
        &[BranchTarget::until("L2", 35.0)]
    );
}

#[test]
fn test_invalid_config_is_reported() {
    let file = write_temp("minimum_transmission = \"lots\"\n");
    assert!(matches!(
        load_config(Some(file.path())),
        Err(ConfigError::Figment(_))
    ));
}

#[test]
fn test_facility_file_drives_controller() {
    let file = write_temp(
        r#"
        [[devices]]
        name = "l0_valve"
        z = 5.0
        input_branches = ["L0"]
        output_branches = ["L0"]
        state = "inserted"

        [[devices]]
        name = "l0_mirror"
        z = 20.0
        input_branches = ["L0"]
        output_branches = ["L0", "L2"]
        kind = "mirror"

        [[devices]]
        name = "l2_stopper"
        z = 30.0
        input_branches = ["L2"]
        output_branches = ["L2"]
        kind = "stopper"
        "#,
    );
    let catalog = load_facility(file.path()).unwrap();
    let config = lightpath_config::Config {
        sources: vec!["L0".into()],
        destinations: [(
            "XPP".to_owned(),
            DestinationSpec::Branches(vec!["L2".into()]),
        )]
        .into_iter()
        .collect(),
        ..lightpath_config::Config::default()
    };

    let controller =
        Controller::new(&catalog, config.to_beamline_config().unwrap(), None).unwrap();
    let xpp = controller.active_path("XPP").unwrap();
    assert_eq!(xpp.names(), vec!["l0_valve", "l0_mirror", "l2_stopper"]);
    assert_eq!(xpp.impediment().unwrap().unwrap().name(), "l0_valve");
}

#[test]
fn test_missing_facility_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_facility(&dir.path().join("nope.toml")),
        Err(ConfigError::Io(_))
    ));
}
