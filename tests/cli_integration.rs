//! CLI integration tests for kpack.
//!
//! These tests run the binary against throwaway projects, from `init`
//! through `build`, `graph` and `clean`.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the kpack binary command.
fn kpack() -> Command {
    let mut cmd = Command::cargo_bin("kpack").unwrap();
    cmd.env_remove("KPACK_WASM_PACK").env_remove("RUST_LOG");
    cmd
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A project without a native crate.
fn js_only_project(root: &Path) {
    write(
        root,
        "Kpack.toml",
        r#"[bundle]
name = "kp-chart"
entry = "js/index.js"

[output]
path = "dist"
filename = "kp-chart.js"

[[copy]]
from = "static"
to = "dist"
"#,
    );
    write(
        root,
        "js/index.js",
        "import { label } from './label.js';\ndocument.title = label;\n",
    );
    write(root, "js/label.js", "export const label = 'chart';\n");
    write(root, "static/index.html", "<script src=\"kp-chart.js\"></script>\n");
    write(root, "static/css/app.css", "body { margin: 0; }\n");
}

// ============================================================================
// kpack init
// ============================================================================

#[test]
fn test_init_in_empty_directory() {
    let tmp = temp_dir();

    kpack()
        .args(["init", "--name", "kp-chart"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Created"));

    let manifest = fs::read_to_string(tmp.path().join("Kpack.toml")).unwrap();
    assert!(manifest.contains("name = \"kp-chart\""));
    assert!(manifest.contains("crate-directory = \".\""));
    assert!(tmp.path().join("js/index.js").exists());
    assert!(tmp.path().join("static").is_dir());
}

#[test]
fn test_init_fails_if_manifest_exists() {
    let tmp = temp_dir();
    write(tmp.path(), "Kpack.toml", "[bundle]\nname = \"mine\"\n");

    kpack()
        .arg("init")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let manifest = fs::read_to_string(tmp.path().join("Kpack.toml")).unwrap();
    assert_eq!(manifest, "[bundle]\nname = \"mine\"\n");
}

// ============================================================================
// kpack build
// ============================================================================

#[test]
fn test_build_js_only_project() {
    let tmp = temp_dir();
    js_only_project(tmp.path());

    kpack()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Finished"));

    let bundle = fs::read_to_string(tmp.path().join("dist/kp-chart.js")).unwrap();
    assert!(bundle.starts_with("/*! kp-chart | bundled by kpack */"));
    assert!(bundle.contains("/* 1: js/label.js */"));
    assert_eq!(
        fs::read(tmp.path().join("dist/index.html")).unwrap(),
        fs::read(tmp.path().join("static/index.html")).unwrap()
    );
    assert_eq!(
        fs::read(tmp.path().join("dist/css/app.css")).unwrap(),
        fs::read(tmp.path().join("static/css/app.css")).unwrap()
    );
}

#[test]
fn test_build_is_reproducible() {
    let tmp = temp_dir();
    js_only_project(tmp.path());

    kpack().arg("build").current_dir(tmp.path()).assert().success();
    let first = fs::read(tmp.path().join("dist/kp-chart.js")).unwrap();

    kpack().arg("build").current_dir(tmp.path()).assert().success();
    let second = fs::read(tmp.path().join("dist/kp-chart.js")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_build_missing_entry_fails_without_bundle() {
    let tmp = temp_dir();
    js_only_project(tmp.path());
    fs::remove_file(tmp.path().join("js/index.js")).unwrap();

    kpack()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("entry module"))
        .stderr(predicate::str::contains("help:"));

    assert!(!tmp.path().join("dist/kp-chart.js").exists());
}

#[test]
fn test_build_unresolved_import_fails() {
    let tmp = temp_dir();
    js_only_project(tmp.path());
    write(tmp.path(), "js/index.js", "import './missing.js';\n");

    kpack()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("./missing.js"));

    assert!(!tmp.path().join("dist/kp-chart.js").exists());
}

#[test]
fn test_build_rejects_unknown_manifest_keys() {
    let tmp = temp_dir();
    js_only_project(tmp.path());
    write(tmp.path(), "Kpack.toml", "[bundle]\nentrypoint = \"js/index.js\"\n");

    kpack()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("entrypoint"));
}

#[test]
fn test_build_with_manifest_dir_flag() {
    let tmp = temp_dir();
    let project = tmp.path().join("web");
    fs::create_dir_all(&project).unwrap();
    js_only_project(&project);

    kpack()
        .args(["-C", "web", "build"])
        .current_dir(tmp.path())
        .assert()
        .success();

    assert!(project.join("dist/kp-chart.js").exists());
}

#[test]
fn test_build_json_events() {
    let tmp = temp_dir();
    js_only_project(tmp.path());

    let output = kpack()
        .args(["--message-format", "json", "build"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let reasons: Vec<String> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["reason"].as_str().unwrap().to_string()
        })
        .collect();

    assert_eq!(reasons.first().map(String::as_str), Some("build-started"));
    assert!(reasons.iter().any(|r| r == "assets-copied"));
    assert!(reasons.iter().any(|r| r == "bundle-emitted"));
    assert_eq!(reasons.last().map(String::as_str), Some("build-finished"));
}

#[test]
fn test_build_missing_wasm_pack_fails() {
    let tmp = temp_dir();
    js_only_project(tmp.path());
    let manifest = fs::read_to_string(tmp.path().join("Kpack.toml")).unwrap();
    write(
        tmp.path(),
        "Kpack.toml",
        &format!("{}\n[wasm]\ntool = \"./bin/no-such-wasm-pack\"\n", manifest),
    );
    write(tmp.path(), "Cargo.toml", "[package]\nname = \"kp-chart\"\n");

    kpack()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-wasm-pack"))
        .stderr(predicate::str::contains("cargo install wasm-pack"));

    assert!(!tmp.path().join("dist/kp-chart.js").exists());
}

#[cfg(unix)]
mod native {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// A stand-in for wasm-pack that writes a loader and a binary.
    ///
    /// Arguments: build <crate> --target web --out-dir <dir> --out-name <name> ...
    fn fake_wasm_pack(root: &Path) -> PathBuf {
        let path = root.join("fake-wasm-pack");
        fs::write(
            &path,
            r#"#!/bin/sh
echo run >> "$2/runs.log"
mkdir -p "$6"
cat > "$6/$8.js" <<'JS'
export function render(el) { el.textContent = 'chart'; }
export default async function init() {
  const url = new URL('kp_chart_bg.wasm', import.meta.url);
  return url;
}
JS
printf '\0asm' > "$6/$8_bg.wasm"
"#,
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn native_project(root: &Path) -> PathBuf {
        kpack()
            .args(["init", "--name", "kp-chart", "-q"])
            .current_dir(root)
            .assert()
            .success();
        write(root, "Cargo.toml", "[package]\nname = \"kp-chart\"\n");
        write(root, "src/lib.rs", "");
        write(
            root,
            "js/index.js",
            "import init, { render } from 'kp-chart';\ninit().then(() => render(document.body));\n",
        );
        write(root, "static/index.html", "<html></html>\n");
        fake_wasm_pack(root)
    }

    fn runs(root: &Path) -> usize {
        fs::read_to_string(root.join("runs.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn test_build_with_native_crate() {
        let tmp = temp_dir();
        let tool = native_project(tmp.path());

        kpack()
            .arg("build")
            .env("KPACK_WASM_PACK", &tool)
            .current_dir(tmp.path())
            .assert()
            .success()
            .stderr(predicate::str::contains("Compiling"));

        let dist = tmp.path().join("dist");
        let bundle = fs::read_to_string(dist.join("kp-chart.js")).unwrap();
        assert!(bundle.contains("/* 1: pkg/kp_chart.js */"));
        assert!(bundle.contains("__kpack_require__.b"));
        assert_eq!(fs::read(dist.join("kp_chart_bg.wasm")).unwrap(), b"\0asm");
        assert!(dist.join("index.html").exists());
        assert_eq!(runs(tmp.path()), 1);
    }

    #[test]
    fn test_unchanged_crate_is_not_recompiled() {
        let tmp = temp_dir();
        let tool = native_project(tmp.path());

        for _ in 0..2 {
            kpack()
                .arg("build")
                .env("KPACK_WASM_PACK", &tool)
                .current_dir(tmp.path())
                .assert()
                .success();
        }
        assert_eq!(runs(tmp.path()), 1);

        kpack()
            .args(["build", "--force"])
            .env("KPACK_WASM_PACK", &tool)
            .current_dir(tmp.path())
            .assert()
            .success();
        assert_eq!(runs(tmp.path()), 2);
    }

    #[test]
    fn test_compiler_failure_keeps_previous_bundle() {
        let tmp = temp_dir();
        let tool = native_project(tmp.path());

        kpack()
            .arg("build")
            .env("KPACK_WASM_PACK", &tool)
            .current_dir(tmp.path())
            .assert()
            .success();
        let before = fs::read(tmp.path().join("dist/kp-chart.js")).unwrap();

        let failing = tmp.path().join("failing-wasm-pack");
        fs::write(
            &failing,
            "#!/bin/sh\necho 'error: expected `;`, found `}`' >&2\nexit 1\n",
        )
        .unwrap();
        fs::set_permissions(&failing, fs::Permissions::from_mode(0o755)).unwrap();

        kpack()
            .args(["build", "--force"])
            .env("KPACK_WASM_PACK", &failing)
            .current_dir(tmp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("error: expected `;`, found `}`"));

        assert_eq!(fs::read(tmp.path().join("dist/kp-chart.js")).unwrap(), before);
    }

    #[test]
    fn test_graph_after_build() {
        let tmp = temp_dir();
        let tool = native_project(tmp.path());

        kpack()
            .arg("build")
            .env("KPACK_WASM_PACK", &tool)
            .current_dir(tmp.path())
            .assert()
            .success();

        kpack()
            .arg("graph")
            .current_dir(tmp.path())
            .assert()
            .success()
            .stdout(predicate::str::starts_with("0 js/index.js\n"))
            .stdout(predicate::str::contains("1 pkg/kp_chart.js"))
            .stdout(predicate::str::contains("kp_chart_bg.wasm [asset]"));
    }

    #[test]
    fn test_clean_removes_outputs() {
        let tmp = temp_dir();
        let tool = native_project(tmp.path());

        kpack()
            .arg("build")
            .env("KPACK_WASM_PACK", &tool)
            .current_dir(tmp.path())
            .assert()
            .success();

        kpack()
            .arg("clean")
            .current_dir(tmp.path())
            .assert()
            .success()
            .stderr(predicate::str::contains("Removed"));

        assert!(!tmp.path().join("dist").exists());
        assert!(!tmp.path().join("pkg").exists());
        assert!(!tmp.path().join(".kpack").exists());
        assert!(tmp.path().join("static/index.html").exists());
        assert!(tmp.path().join("Cargo.toml").exists());
    }
}

// ============================================================================
// kpack completions
// ============================================================================

#[test]
fn test_completions_bash() {
    kpack()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kpack"));
}
