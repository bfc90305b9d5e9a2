use assert_cmd::Command;
use predicates::prelude::*;

fn wgsweep() -> Command {
    let mut cmd = Command::cargo_bin("wgsweep").unwrap();
    for var in ["WGSWEEP_OUTPUT", "WGSWEEP_TIMEOUT_SECS", "WGSWEEP_PARALLEL_DEVICES", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_works() {
    wgsweep().arg("--help").assert().success();
}

#[test]
fn version_works() {
    wgsweep().arg("--version").assert().success().stdout(predicate::str::contains("wgsweep"));
}

#[test]
fn help_mentions_subcommands() {
    let out = wgsweep().arg("--help").assert().success().get_output().stdout.clone();
    let s = String::from_utf8(out).unwrap();
    for needle in ["run", "plan", "show", "merge", "--config", "--log-format"] {
        assert!(s.contains(needle), "help missing `{needle}`");
    }
}

#[test]
fn run_help_lists_overrides() {
    wgsweep()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeout-secs"))
        .stdout(predicate::str::contains("--parallel-devices"))
        .stdout(predicate::str::contains("--filter"));
}

#[test]
fn invalid_command_fails() {
    wgsweep().arg("nonexistent-command").assert().failure();
}

#[test]
fn missing_explicit_config_is_config_failure() {
    let dir = tempfile::tempdir().unwrap();
    wgsweep()
        .current_dir(dir.path())
        .args(["plan", "--config", "nope.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn show_missing_report_fails_generic() {
    let dir = tempfile::tempdir().unwrap();
    wgsweep()
        .current_dir(dir.path())
        .args(["show", "missing.json"])
        .assert()
        .code(1);
}

#[test]
fn show_and_merge_reports() {
    let dir = tempfile::tempdir().unwrap();
    let a = r#"{
  "Local A (GPU)[0]": {
    "timings": { "1,4,1": 0.5, "2,4,1": 0.25 },
    "best": { "point": [2, 4, 1], "seconds": 0.25 },
    "worst": { "point": [1, 4, 1], "seconds": 0.5 },
    "attempted": 3,
    "failed": 1
  }
}"#;
    let b = r#"{
  "CLBlast (GPU)[0]": {
    "timings": { "1,1,1": 0.125 },
    "best": { "point": [1, 1, 1], "seconds": 0.125 },
    "worst": { "point": [1, 1, 1], "seconds": 0.125 },
    "attempted": 1,
    "failed": 0
  }
}"#;
    std::fs::write(dir.path().join("a.json"), a).unwrap();
    std::fs::write(dir.path().join("b.json"), b).unwrap();

    wgsweep()
        .current_dir(dir.path())
        .args(["merge", "--output", "all.json", "a.json", "b.json"])
        .assert()
        .success();

    let merged = std::fs::read_to_string(dir.path().join("all.json")).unwrap();
    assert!(merged.find("Local A").unwrap() < merged.find("CLBlast").unwrap());

    let out = wgsweep()
        .current_dir(dir.path())
        .args(["show", "all.json", "--format", "json", "--top", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let ranked: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(ranked.as_array().unwrap().len(), 1);
    assert_eq!(ranked[0]["label"], "CLBlast (GPU)[0]");
    assert_eq!(ranked[0]["best_point"], serde_json::json!([1, 1, 1]));
}

#[cfg(unix)]
mod sweeps {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    const BENCH: &str = r#"#!/bin/sh
touch "$(dirname "$0")/ran"
if [ "$4" -gt 2 ]; then
  echo "CL_INVALID_WORK_GROUP_SIZE" >&2
  exit 1
fi
echo "elapsed: 0.$4"
"#;

    const CONFIG: &str = r#"
[logging]
level = "warn"

[grid]
local0 = [1, 2, 4]
local1 = [1]
local2 = [1]

[[devices]]
kind = "gpu"
indices = [0, 1]

[[experiments]]
name = "Local A"
executable = "bench.sh"

[[experiments]]
name = "CLBlast"
executable = "bench.sh"
degenerate = true

[run]
timeout_secs = 10
"#;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bench.sh");
        fs::write(&script, BENCH).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(dir.path().join("wgsweep.toml"), CONFIG).unwrap();
        dir
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn plan_lists_expanded_experiments() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .arg("plan")
            .assert()
            .success()
            .stdout(predicate::str::contains("Local A (GPU)[1]"))
            .stdout(predicate::str::contains("CLBlast (GPU)[0]"))
            .stdout(predicate::str::contains("-gpu 0 --local0 1 --local1 1 --local2 1"))
            .stdout(predicate::str::contains("4 experiments, 8 invocations"));
        assert!(!dir.path().join("benchmark.json").exists());
    }

    #[test]
    fn run_writes_report() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet"])
            .assert()
            .success();

        let report = read_json(&dir.path().join("benchmark.json"));
        let local = &report["Local A (GPU)[1]"];
        assert_eq!(local["timings"]["1,1,1"], 0.1);
        assert_eq!(local["timings"]["2,1,1"], 0.2);
        assert!(local["timings"].get("4,1,1").is_none());
        assert_eq!(local["best"]["point"], serde_json::json!([1, 1, 1]));
        assert_eq!(local["attempted"], 3);
        assert_eq!(local["failed"], 1);
        assert_eq!(report["CLBlast (GPU)[0]"]["attempted"], 1);
    }

    #[test]
    fn run_honours_output_filter_and_parallel_flags() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--parallel-devices", "--filter", "CLBlast", "-o", "lib.json"])
            .assert()
            .success();

        let report = read_json(&dir.path().join("lib.json"));
        let labels: Vec<&String> = report.as_object().unwrap().keys().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| l.starts_with("CLBlast")));
    }

    #[test]
    fn run_merge_keeps_other_experiments() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--filter", "Local"])
            .assert()
            .success();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--merge", "--filter", "CLBlast"])
            .assert()
            .success();

        let report = read_json(&dir.path().join("benchmark.json"));
        assert_eq!(report.as_object().unwrap().len(), 4);
    }

    #[test]
    fn run_merge_into_corrupt_report_fails_before_sweeping() {
        let dir = setup();
        let report = dir.path().join("benchmark.json");
        fs::write(&report, "not json").unwrap();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--merge"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Cannot merge into"));

        assert!(!dir.path().join("ran").exists(), "benchmark ran before the merge check");
        assert_eq!(fs::read_to_string(&report).unwrap(), "not json");
    }

    #[test]
    fn run_with_huge_timeout_completes() {
        let dir = setup();
        let huge = u64::MAX.to_string();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--filter", "CLBlast", "--timeout-secs", huge.as_str()])
            .assert()
            .success();
        let report = read_json(&dir.path().join("benchmark.json"));
        assert_eq!(report.as_object().unwrap().len(), 2);
    }

    #[test]
    fn run_report_is_readable_by_others() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--filter", "CLBlast"])
            .assert()
            .success();
        let mode = fs::metadata(dir.path().join("benchmark.json")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644, "report mode {mode:o}");
    }

    #[test]
    fn run_with_unwritable_output_dumps_report_and_exits_3() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet", "--output", "missing-dir/benchmark.json"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains("\"Local A (GPU)[0]\""));
    }

    #[test]
    fn run_with_missing_executable_exits_2() {
        let dir = setup();
        fs::remove_file(dir.path().join("bench.sh")).unwrap();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--quiet"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Local A"));
    }

    #[test]
    fn zero_timeout_flag_is_config_failure() {
        let dir = setup();
        wgsweep()
            .current_dir(dir.path())
            .args(["run", "--timeout-secs", "0"])
            .assert()
            .code(2);
    }
}
