use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn floorscape() -> Command {
    let mut cmd = Command::cargo_bin("floorscape").expect("binary built");
    cmd.env_remove("FLOORSCAPE_CONFIG");
    cmd
}

#[test]
fn demo_layout_is_rendered_without_a_drawing() {
    floorscape()
        .assert()
        .success()
        .stdout(predicate::str::contains("内置示例布局"))
        .stdout(predicate::str::contains("区域 office-a"))
        .stdout(predicate::str::contains("外墙 4"));
}

#[test]
fn json_flag_prints_only_the_scene_document() {
    let output = floorscape()
        .arg("--json")
        .arg("--floor")
        .arg("2")
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(value["scene"]["floor"], 2);
    assert_eq!(value["scene"]["elevation"], 6.0);
}

#[test]
fn drawing_with_explicit_format_and_script() {
    let mut drawing = tempfile::NamedTempFile::new().expect("drawing");
    write!(
        drawing,
        r#"{{"entities":[{{"type":"CIRCLE","center":[50,50],"radius":25}}]}}"#
    )
    .unwrap();
    let mut script = tempfile::NamedTempFile::new().expect("script");
    writeln!(script, "add_zone lab 0 0 0 400 250 Lab").unwrap();
    writeln!(script, "assign_device probe-9 lab").unwrap();

    floorscape()
        .arg("--format")
        .arg("json")
        .arg("--script")
        .arg(script.path())
        .arg(drawing.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("底图: 32 条线段"))
        .stdout(predicate::str::contains("设备 probe-9"))
        .stdout(predicate::str::contains("[未登记]"));
}

#[test]
fn unknown_format_tag_fails() {
    floorscape()
        .arg("--format")
        .arg("pdf")
        .arg("plan.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pdf"));
}

#[test]
fn missing_drawing_fails_with_context() {
    floorscape()
        .arg("no/such/plan.dxf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("运行预览失败"));
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let mut config = tempfile::NamedTempFile::new().expect("config");
    writeln!(config, "[canvas\nwidth = ").unwrap();

    floorscape()
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("内置示例布局"));
}
