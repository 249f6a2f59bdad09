use pinrig_kernel::config::ConfigLoader;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

fn no_env() -> config::Map<String, String> {
    config::Map::new()
}

#[test]
fn later_files_override_earlier_ones() {
    let dir = TempDir::new().unwrap();
    let base = write(
        &dir,
        "base.yaml",
        "#config_version=3\nswitches:\n  s_start:\n    number: 1\n    tags: start\ntiming:\n  hz: 50\n",
    );
    let overlay = write(&dir, "overlay.yaml", "config_version: 3\nswitches:\n  s_start:\n    number: 7\n");

    let tree = ConfigLoader::new().file(&base).file(&overlay).env_source(no_env()).load().unwrap();

    assert_eq!(tree["switches"]["s_start"]["number"], 7);
    assert_eq!(tree["switches"]["s_start"]["tags"], "start");
    assert_eq!(tree["timing"]["hz"], 50);
    assert!(tree.get("config_version").is_none());
}

#[test]
fn lists_replace_instead_of_merging() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.yaml", "#config_version=3\nmodes:\n  base:\n    start_events: [ball_started, game_started]\n");
    let b = write(&dir, "b.yaml", "#config_version=3\nmodes:\n  base:\n    start_events: [reset_complete]\n");

    let tree = ConfigLoader::new().files([&a, &b]).env_source(no_env()).load().unwrap();
    assert_eq!(tree["modes"]["base"]["start_events"], serde_json::json!(["reset_complete"]));
}

#[test]
fn environment_wins() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "machine.yaml", "#config_version=3\ntiming:\n  hz: 50\n");
    let mut env = no_env();
    env.insert("PINRIG__TIMING__HZ".into(), "120".into());
    env.insert("PINRIG__BCP__HOST".into(), "display.local".into());

    let tree = ConfigLoader::new().file(&file).env_source(env).load().unwrap();
    assert_eq!(tree["timing"]["hz"], 120);
    assert_eq!(tree["bcp"]["host"], "display.local");
}

#[test]
fn defaults_provide_a_playfield() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "machine.yaml", "#config_version=3\ncoils:\n  c_eject:\n    number: 3\n");

    let tree = ConfigLoader::new().file(&file).env_source(no_env()).load().unwrap();
    assert!(tree["playfields"]["playfield"].is_object());
    assert_eq!(tree["hardware"]["platform"], "virtual");

    let bare = ConfigLoader::new().defaults(false).file(&file).env_source(no_env()).load().unwrap();
    assert!(bare.get("playfields").is_none());
}

#[test]
fn missing_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "machine.yaml", "switches:\n  s_start:\n    number: 1\n");

    let err = ConfigLoader::new().file(&file).env_source(no_env()).load().unwrap_err();
    assert_eq!(err.kind(), "missing_version");
    assert!(err.to_string().contains("machine.yaml"));
}

#[test]
fn unsupported_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "old.yaml", "#config_version=4\n");

    let err = ConfigLoader::new().file(&file).env_source(no_env()).load().unwrap_err();
    assert_eq!(err.kind(), "unsupported_version");
}

#[test]
fn unreadable_file_reports_io() {
    let err = ConfigLoader::new().file("/definitely/not/here.yaml").env_source(no_env()).load().unwrap_err();
    assert_eq!(err.kind(), "io");
    assert!(err.to_string().contains("reading /definitely/not/here.yaml"));
}
