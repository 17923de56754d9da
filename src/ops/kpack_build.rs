//! Implementation of `kpack build`.
//!
//! One linear pass: validate inputs, then copy static files while the
//! native crate is compiled and the bundle is assembled in memory. Emitted
//! files are only written once both have succeeded, the bundle last and
//! atomically, so any earlier failure leaves the previous bundle (or no
//! bundle) in place. A copy rule that writes a file the build also emits
//! is a configuration error.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::builder::native::read_crate_name;
use crate::builder::{
    compile_cached, copy_all, destinations, BuildEvent, CopyReport, NativeCompiler, NativeModule,
    NativeRequest,
};
use crate::bundler::{Bundle, Bundler};
use crate::core::{BuildMode, Project, WasmConfig};
use crate::util::diagnostic::KpackError;
use crate::util::fs::{clean_path, copy_file, ensure_dir, relative_path, to_slash, write_atomic};
use crate::util::shell::{format_duration, Shell, Status, Stopwatch};

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Run the native compiler even when its fingerprint is unchanged
    pub force: bool,

    /// Override `wasm.mode`
    pub mode: Option<BuildMode>,
}

/// Build result.
#[derive(Debug)]
pub struct BuildResult {
    /// The written bundle
    pub bundle: PathBuf,

    /// Number of modules in the bundle
    pub modules: usize,

    /// Files written next to the bundle (the `.wasm` binary, other assets)
    pub assets: Vec<PathBuf>,

    pub copy: CopyReport,

    /// The native module, when the project has a `[wasm]` table
    pub native: Option<NativeModule>,
}

/// Build the project.
pub fn build(
    project: &Project,
    compiler: &dyn NativeCompiler,
    shell: &Shell,
    opts: &BuildOptions,
) -> Result<BuildResult> {
    let timer = Stopwatch::start();
    let result = run(project, compiler, shell, opts);
    let elapsed = timer.elapsed();
    let duration_ms = elapsed.as_millis() as u64;

    match &result {
        Ok(result) => {
            shell.event(&BuildEvent::finished(true, duration_ms));
            shell.status(
                Status::Finished,
                format!(
                    "{} ({} modules) in {}",
                    display(project, &result.bundle),
                    result.modules,
                    format_duration(elapsed)
                ),
            );
        }
        Err(e) => shell.event(&BuildEvent::failed(e, duration_ms)),
    }

    result
}

fn run(
    project: &Project,
    compiler: &dyn NativeCompiler,
    shell: &Shell,
    opts: &BuildOptions,
) -> Result<BuildResult> {
    project.validate()?;

    let wasm = project.wasm().cloned().map(|mut wasm| {
        if let Some(mode) = opts.mode {
            wasm.mode = mode;
        }
        wasm
    });

    shell.event(&BuildEvent::started(
        project.manifest().bundle.entry.clone(),
        relative_path(project.root(), &project.bundle_path()),
        wasm.as_ref().map(|w| w.mode.as_str()),
    ));

    let rules = project.copy_rules();
    let planned = destinations(&rules)?;
    check_not_copied(project, &planned, &project.bundle_path())?;

    let (copied, prepared) = rayon::join(
        || copy_step(project, &rules, shell),
        || bundle_step(project, wasm.as_ref(), compiler, shell, opts),
    );
    let prepared = prepared?;
    let copy = copied?;

    let (bundle, assets) = emit_step(project, &prepared, &planned, shell)?;

    Ok(BuildResult {
        bundle,
        modules: prepared.bundle.modules,
        assets,
        copy,
        native: prepared.native,
    })
}

/// Fail when a copy rule would write `dest`.
fn check_not_copied(project: &Project, planned: &[PathBuf], dest: &Path) -> Result<()> {
    if planned.contains(&clean_path(dest)) {
        return Err(KpackError::config(format!(
            "a [[copy]] rule writes `{}`, which the build emits",
            display(project, dest)
        ))
        .into());
    }
    Ok(())
}

fn copy_step(
    project: &Project,
    rules: &[crate::core::CopyRule],
    shell: &Shell,
) -> Result<CopyReport> {
    if rules.is_empty() {
        return Ok(CopyReport::default());
    }

    for rule in rules {
        shell.verbose(
            Status::Copying,
            format!("{} -> {}", display(project, &rule.from), display(project, &rule.to)),
        );
    }
    let report = copy_all(rules, shell)?;
    info!("copied {} files ({} bytes)", report.files, report.bytes);
    shell.event(&BuildEvent::copied(&report));
    Ok(report)
}

/// A bundle assembled in memory, with the files to emit next to it.
struct Prepared {
    bundle: Bundle,
    /// (source file, name in the output directory)
    emitted: Vec<(PathBuf, String)>,
    native: Option<NativeModule>,
}

fn bundle_step(
    project: &Project,
    wasm: Option<&WasmConfig>,
    compiler: &dyn NativeCompiler,
    shell: &Shell,
    opts: &BuildOptions,
) -> Result<Prepared> {
    let native = match wasm {
        Some(config) => Some(native_step(project, config, compiler, shell, opts)?),
        None => None,
    };

    let manifest = project.manifest();
    shell.status(
        Status::Bundling,
        format!("{} ({})", manifest.bundle.name, to_slash(&manifest.bundle.entry)),
    );

    let mut bundler = Bundler::new(project.root(), project.entry_path())
        .with_name(manifest.bundle.name.clone());
    if let Some(module) = &native {
        for specifier in module.specifiers() {
            bundler.alias(specifier, &module.loader);
        }
    }
    let bundle = bundler.bundle()?;

    let mut emitted: Vec<(PathBuf, String)> = bundle
        .assets
        .iter()
        .map(|a| (a.source.clone(), a.name.clone()))
        .collect();
    if let Some(module) = &native {
        let wasm_path = crate::util::fs::normalize_path(&module.wasm);
        if !emitted.iter().any(|(source, _)| *source == wasm_path) {
            let name = wasm_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            emitted.push((wasm_path, name));
        }
    }

    Ok(Prepared {
        bundle,
        emitted,
        native,
    })
}

/// Write the assets, then the bundle.
fn emit_step(
    project: &Project,
    prepared: &Prepared,
    planned: &[PathBuf],
    shell: &Shell,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    let out_dir = project.output_dir();
    for (_, name) in &prepared.emitted {
        check_not_copied(project, planned, &out_dir.join(name))?;
    }
    ensure_dir(&out_dir)?;

    let mut assets = Vec::new();
    for (source, name) in &prepared.emitted {
        let dest = out_dir.join(name);
        copy_file(source, &dest)?;
        shell.verbose(Status::Emitted, display(project, &dest));
        assets.push(dest);
    }

    let bundle = &prepared.bundle;
    let bundle_path = project.bundle_path();
    write_atomic(&bundle_path, bundle.code.as_bytes())?;
    shell.verbose(Status::Emitted, display(project, &bundle_path));
    shell.event(&BuildEvent::BundleEmitted {
        path: relative_path(project.root(), &bundle_path),
        modules: bundle.modules,
        bytes: bundle.code.len(),
        assets: prepared
            .emitted
            .iter()
            .map(|(_, name)| name.clone())
            .collect(),
    });

    Ok((bundle_path, assets))
}

fn native_step(
    project: &Project,
    config: &WasmConfig,
    compiler: &dyn NativeCompiler,
    shell: &Shell,
    opts: &BuildOptions,
) -> Result<NativeModule> {
    let mut outputs = project.output_dirs();
    outputs.push(project.state_dir());
    let request = NativeRequest::from_config(project.root(), config).with_exclude(outputs);
    let crate_name = read_crate_name(&request.crate_dir)?;

    shell.status(
        Status::Compiling,
        format!("{} ({})", crate_name, config.mode.as_str()),
    );
    let module = compile_cached(compiler, &request, &project.state_dir(), opts.force)?;
    if module.fresh {
        shell.verbose(Status::Fresh, &crate_name);
    }

    shell.event(&BuildEvent::NativeCompiled {
        crate_name: module.crate_name.clone(),
        loader: relative_path(project.root(), &module.loader),
        wasm: relative_path(project.root(), &module.wasm),
        fresh: module.fresh,
    });
    Ok(module)
}

fn display(project: &Project, path: &Path) -> String {
    to_slash(&relative_path(project.root(), path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Manifest;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a wasm-pack style loader and binary without running anything.
    struct FakeCompiler {
        runs: AtomicUsize,
        fail: bool,
    }

    impl FakeCompiler {
        fn new() -> Self {
            FakeCompiler {
                runs: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            FakeCompiler {
                fail: true,
                ..FakeCompiler::new()
            }
        }
    }

    impl NativeCompiler for FakeCompiler {
        fn name(&self) -> &str {
            "fake"
        }

        fn compile(&self, request: &NativeRequest) -> Result<NativeModule> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(KpackError::Build {
                    message: "fake compiler failed".to_string(),
                    diagnostics: Some("error: expected `;`".to_string()),
                    help: None,
                }
                .into());
            }
            let crate_name = read_crate_name(&request.crate_dir)?;
            let (loader, wasm) = request.outputs_for(&crate_name);
            fs::create_dir_all(&request.out_dir)?;
            fs::write(
                &loader,
                "export function render(id) { return id; }\n\
                 export default async function init() {\n  \
                 const url = new URL('kp_chart_bg.wasm', import.meta.url);\n  \
                 return fetch(url);\n}\n",
            )?;
            fs::write(&wasm, b"\0asm\x01\0\0\0")?;
            Ok(NativeModule {
                crate_name,
                loader,
                wasm,
                fresh: false,
            })
        }
    }

    fn project(root: &Path) -> Project {
        fs::create_dir_all(root.join("js")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("static/css")).unwrap();
        fs::write(
            root.join("js/index.js"),
            "import init, { render } from 'kp-chart';\n\
             import { label } from './label.js';\n\
             init().then(() => render(label));\n",
        )
        .unwrap();
        fs::write(root.join("js/label.js"), "export const label = 'week';\n").unwrap();
        fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"kp-chart\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(
            root.join("static/index.html"),
            "<script src=\"kp-chart.js\"></script>",
        )
        .unwrap();
        fs::write(root.join("static/css/chart.css"), "svg { width: 100%; }").unwrap();
        Project::with_manifest(root, Manifest::default())
    }

    #[test]
    fn test_build_writes_bundle_assets_and_static_files() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let compiler = FakeCompiler::new();

        let result =
            build(&project, &compiler, &Shell::silent(), &BuildOptions::default()).unwrap();

        let dist = tmp.path().join("dist");
        assert_eq!(result.bundle, dist.join("kp-chart.js"));
        assert_eq!(result.modules, 3);
        assert_eq!(result.copy.files, 2);
        assert_eq!(result.assets, vec![dist.join("kp_chart_bg.wasm")]);

        let bundle = fs::read_to_string(dist.join("kp-chart.js")).unwrap();
        assert!(bundle.contains("/* 1: pkg/kp_chart.js */"));
        assert!(bundle.contains("/* 2: js/label.js */"));
        assert_eq!(
            fs::read(dist.join("kp_chart_bg.wasm")).unwrap(),
            b"\0asm\x01\0\0\0"
        );
        assert_eq!(
            fs::read(dist.join("css/chart.css")).unwrap(),
            fs::read(tmp.path().join("static/css/chart.css")).unwrap()
        );

        let js_files: Vec<_> = fs::read_dir(&dist)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "js"))
            .collect();
        assert_eq!(js_files.len(), 1);
    }

    #[test]
    fn test_rebuild_is_byte_identical_and_fresh() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let compiler = FakeCompiler::new();
        let opts = BuildOptions::default();

        build(&project, &compiler, &Shell::silent(), &opts).unwrap();
        let first = fs::read(project.bundle_path()).unwrap();

        let second_result = build(&project, &compiler, &Shell::silent(), &opts).unwrap();
        let second = fs::read(project.bundle_path()).unwrap();

        assert_eq!(first, second);
        assert!(second_result.native.unwrap().fresh);
        assert_eq!(compiler.runs.load(Ordering::SeqCst), 1);

        build(
            &project,
            &compiler,
            &Shell::silent(),
            &BuildOptions {
                force: true,
                ..BuildOptions::default()
            },
        )
        .unwrap();
        assert_eq!(compiler.runs.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read(project.bundle_path()).unwrap(), first);
    }

    #[test]
    fn test_missing_entry_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        fs::remove_file(tmp.path().join("js/index.js")).unwrap();
        let compiler = FakeCompiler::new();

        let err = build(&project, &compiler, &Shell::silent(), &BuildOptions::default())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<KpackError>().unwrap().kind(),
            "configuration"
        );
        assert!(!project.bundle_path().exists());
        assert_eq!(compiler.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_native_failure_leaves_previous_bundle() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let opts = BuildOptions::default();
        build(&project, &FakeCompiler::new(), &Shell::silent(), &opts).unwrap();
        let before = fs::read(project.bundle_path()).unwrap();

        fs::write(tmp.path().join("js/label.js"), "export const label = 'month';\n").unwrap();
        let err = build(
            &project,
            &FakeCompiler::failing(),
            &Shell::silent(),
            &BuildOptions {
                force: true,
                ..BuildOptions::default()
            },
        )
        .unwrap_err();

        assert_eq!(err.downcast_ref::<KpackError>().unwrap().kind(), "build");
        assert_eq!(fs::read(project.bundle_path()).unwrap(), before);
    }

    #[test]
    fn test_missing_crate_manifest_creates_no_bundle() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        fs::remove_file(tmp.path().join("Cargo.toml")).unwrap();

        let err =
            build(&project, &FakeCompiler::new(), &Shell::silent(), &BuildOptions::default())
                .unwrap_err();
        assert_eq!(err.downcast_ref::<KpackError>().unwrap().kind(), "build");
        assert!(!project.bundle_path().exists());
    }

    #[test]
    fn test_empty_static_dir() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        fs::remove_dir_all(tmp.path().join("static")).unwrap();
        fs::create_dir_all(tmp.path().join("static")).unwrap();

        let result =
            build(&project, &FakeCompiler::new(), &Shell::silent(), &BuildOptions::default())
                .unwrap();
        assert_eq!(result.copy, CopyReport::default());

        let mut names: Vec<String> = fs::read_dir(tmp.path().join("dist"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["kp-chart.js", "kp_chart_bg.wasm"]);
    }

    #[test]
    fn test_missing_static_dir_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        fs::remove_dir_all(tmp.path().join("static")).unwrap();

        let err =
            build(&project, &FakeCompiler::new(), &Shell::silent(), &BuildOptions::default())
                .unwrap_err();
        assert_eq!(err.downcast_ref::<KpackError>().unwrap().kind(), "not-found");
        assert!(!project.bundle_path().exists());
        assert!(!tmp.path().join("dist/kp_chart_bg.wasm").exists());
    }

    #[test]
    fn test_copy_onto_bundle_is_rejected_before_work() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        fs::write(tmp.path().join("static/kp-chart.js"), "// stale").unwrap();
        let compiler = FakeCompiler::new();

        let err = build(&project, &compiler, &Shell::silent(), &BuildOptions::default())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<KpackError>().unwrap().kind(),
            "configuration"
        );
        assert!(format!("{:#}", err).contains("dist/kp-chart.js"));
        assert!(!project.bundle_path().exists());
        assert!(!tmp.path().join("dist/index.html").exists());
        assert_eq!(compiler.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_copy_onto_emitted_asset_writes_no_bundle() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        fs::write(tmp.path().join("static/kp_chart_bg.wasm"), "copied").unwrap();

        let err =
            build(&project, &FakeCompiler::new(), &Shell::silent(), &BuildOptions::default())
                .unwrap_err();
        assert_eq!(
            err.downcast_ref::<KpackError>().unwrap().kind(),
            "configuration"
        );
        assert!(format!("{:#}", err).contains("dist/kp_chart_bg.wasm"));
        assert!(!project.bundle_path().exists());
        assert_eq!(
            fs::read_to_string(tmp.path().join("dist/kp_chart_bg.wasm")).unwrap(),
            "copied"
        );
    }

    #[test]
    fn test_bundle_runs_with_module_semantics() {
        let Ok(node) = which::which("node") else {
            eprintln!("node not found, skipping");
            return;
        };
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let files = [
            (
                "js/index.js",
                "import { hits } from './shared.js';\n\
                 import { twice } from './twice.js';\n\
                 import './a.js';\n\
                 import { count, inc } from './counter.js';\n\
                 inc();\n\
                 console.log('hits', hits(), twice);\n\
                 console.log('count', count);\n",
            ),
            (
                "js/shared.js",
                "globalThis.loads = (globalThis.loads || 0) + 1;\n\
                 export function hits() { return globalThis.loads; }\n",
            ),
            (
                "js/twice.js",
                "import { hits } from './shared.js';\nexport const twice = hits();\n",
            ),
            (
                "js/a.js",
                "import { b } from './b.js';\n\
                 export const A = 1;\n\
                 console.log('result', b());\n",
            ),
            (
                "js/b.js",
                "import { A } from './a.js';\nexport function b() { return A; }\n",
            ),
            (
                "js/counter.js",
                "export let count = 0;\nexport function inc() { count++; }\n",
            ),
        ];
        for (rel, contents) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        let mut manifest = Manifest::default();
        manifest.wasm = None;
        manifest.copy.clear();
        let project = Project::with_manifest(root, manifest);
        let compiler = FakeCompiler::new();
        build(&project, &compiler, &Shell::silent(), &BuildOptions::default()).unwrap();

        let output = std::process::Command::new(node)
            .arg(project.bundle_path())
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            "result 1\nhits 1 1\ncount 1\n"
        );
    }

    #[test]
    fn test_without_native_step() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("js")).unwrap();
        fs::write(root.join("js/index.js"), "console.log('plain');\n").unwrap();

        let mut manifest = Manifest::default();
        manifest.wasm = None;
        manifest.copy.clear();
        let project = Project::with_manifest(root, manifest);

        let compiler = FakeCompiler::new();
        let result =
            build(&project, &compiler, &Shell::silent(), &BuildOptions::default()).unwrap();
        assert_eq!(result.modules, 1);
        assert!(result.native.is_none());
        assert!(result.assets.is_empty());
        assert_eq!(compiler.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mode_override_changes_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let compiler = FakeCompiler::new();

        build(&project, &compiler, &Shell::silent(), &BuildOptions::default()).unwrap();
        build(
            &project,
            &compiler,
            &Shell::silent(),
            &BuildOptions {
                mode: Some(BuildMode::Development),
                ..BuildOptions::default()
            },
        )
        .unwrap();
        assert_eq!(compiler.runs.load(Ordering::SeqCst), 2);
    }
}
