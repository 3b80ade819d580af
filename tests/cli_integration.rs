//! CLI integration tests for kforge.
//!
//! These tests drive the binary against throwaway kernel trees, from
//! resolution through makefile generation and building.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "architecture": { "default": "x86-64" },
  "subsystems": {
    "KERNEL": {
      "name": "Kernel Core",
      "required": true,
      "files": { "x86-64": ["kernel/main.c"], "arm64": ["kernel/main.c"] }
    },
    "INTERRUPT": {
      "name": "Interrupts",
      "dependencies": ["KERNEL"],
      "files": { "x86-64": ["interrupt/idt.c", "interrupt/isr.asm"] }
    },
    "PS2_KEYBOARD": {
      "name": "PS/2 Keyboard",
      "dependencies": ["INTERRUPT"],
      "files": { "x86-64": ["drivers/ps2/keyboard.c"] }
    },
    "NET": {
      "name": "Networking",
      "files": { "x86-64": ["net/stack.c", "net/missing.c"] }
    },
    "BROKEN": {
      "name": "Broken Driver",
      "files": { "x86-64": ["drivers/broken/fail.c", "drivers/broken/ok.c"] }
    }
  },
  "profiles": {
    "desktop": { "name": "Desktop", "subsystems": ["PS2_KEYBOARD", "NET"] }
  }
}
"#;

const SOURCES: &[&str] = &[
    "kernel/main.c",
    "interrupt/idt.c",
    "interrupt/isr.asm",
    "drivers/ps2/keyboard.c",
    "net/stack.c",
    "drivers/broken/fail.c",
    "drivers/broken/ok.c",
];

/// Get the kforge binary command.
fn kforge() -> Command {
    let mut cmd = Command::cargo_bin("kforge").unwrap();
    cmd.env_remove("KFORGE_ROOT");
    cmd
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Create a kernel tree with the given `.config`.
fn kernel_tree(selection: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "Makefile", "all:\n");
    write(
        root,
        "scripts/unibuild.sh",
        "case \"$1\" in *fail*) echo \"$1: error: boom\" >&2; exit 1;; esac\n",
    );
    write(root, "scripts/kconfig/subsystems.json", MANIFEST);
    write(root, ".config", selection);
    for source in SOURCES {
        write(root, source, "");
    }
    tmp
}

// ============================================================================
// kforge resolve
// ============================================================================

#[test]
fn test_resolve_migrates_and_closes_dependencies() {
    let tree = kernel_tree("SUBSYSTEM_KEYBOARD=y\n");

    kforge()
        .arg("resolve")
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PS2_KEYBOARD"))
        .stdout(predicate::str::contains("INTERRUPT"))
        .stdout(predicate::str::contains("KERNEL"))
        .stderr(predicate::str::contains("KEYBOARD -> PS2_KEYBOARD"));
}

#[test]
fn test_resolve_from_subdirectory() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .arg("resolve")
        .current_dir(tree.path().join("drivers/ps2"))
        .assert()
        .success()
        .stdout(predicate::str::contains("NET"));
}

#[test]
fn test_resolve_with_root_flag() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");
    let elsewhere = TempDir::new().unwrap();

    kforge()
        .args(["resolve", "--root"])
        .arg(tree.path())
        .current_dir(elsewhere.path())
        .assert()
        .success();
}

#[test]
fn test_resolve_outside_kernel_tree_fails() {
    let elsewhere = TempDir::new().unwrap();

    kforge()
        .arg("resolve")
        .current_dir(elsewhere.path())
        .assert()
        .failure();
}

#[test]
fn test_resolve_nothing_selected_fails() {
    let tree = kernel_tree("# nothing here\nSUBSYSTEM_NET=n\n");

    kforge()
        .arg("resolve")
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no subsystems selected"));
}

#[test]
fn test_resolve_missing_selection_fails() {
    let tree = kernel_tree("");
    fs::remove_file(tree.path().join(".config")).unwrap();

    kforge()
        .arg("resolve")
        .current_dir(tree.path())
        .assert()
        .failure();
}

#[test]
fn test_resolve_unknown_component_warns() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\nSUBSYSTEM_NETT=y\n");

    kforge()
        .arg("resolve")
        .current_dir(tree.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("NETT"));
}

#[test]
fn test_resolve_json() {
    let tree = kernel_tree("SUBSYSTEM_KEYBOARD=y\n");

    kforge()
        .args(["--message-format", "json", "resolve"])
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reason\":\"resolved\""))
        .stdout(predicate::str::contains("\"reason\":\"diagnostic\""));
}

// ============================================================================
// kforge plan
// ============================================================================

#[test]
fn test_plan_lists_units_and_skips_missing() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .arg("plan")
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("net/stack.c -> net/stack.o"))
        .stdout(predicate::str::contains("missing.c").not())
        .stderr(predicate::str::contains("net/missing.c"));
}

#[test]
fn test_plan_json() {
    let tree = kernel_tree("SUBSYSTEM_PS2_KEYBOARD=y\n");

    kforge()
        .args(["plan", "--json"])
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"arch\": \"x86-64\""))
        .stdout(predicate::str::contains("interrupt/isr.o"));
}

#[test]
fn test_plan_unsupported_arch_is_empty() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .args(["plan", "--arch", "riscv64"])
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("stack").not());
}

// ============================================================================
// kforge generate
// ============================================================================

#[test]
fn test_generate_writes_makefile() {
    let tree = kernel_tree("SUBSYSTEM_PS2_KEYBOARD=y\n");

    kforge()
        .arg("generate")
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("setup/.build/Makefile.dynamic"));

    let makefile =
        fs::read_to_string(tree.path().join("setup/.build/Makefile.dynamic")).unwrap();
    assert!(makefile.contains("# Subsystem: PS2_KEYBOARD"));
    assert!(makefile.contains("drivers/ps2/keyboard.o"));
    assert!(makefile.contains("kernel/main.o"));
    assert!(!makefile.contains("net/stack.o"));
}

#[test]
fn test_generate_is_deterministic() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\nSUBSYSTEM_PS2_KEYBOARD=y\n");
    let path = tree.path().join("setup/.build/Makefile.dynamic");

    kforge()
        .arg("generate")
        .current_dir(tree.path())
        .assert()
        .success();
    let first = fs::read_to_string(&path).unwrap();

    kforge()
        .arg("generate")
        .current_dir(tree.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("up to date"));
    assert_eq!(first, fs::read_to_string(&path).unwrap());
}

#[test]
fn test_generate_no_valid_selection_fails() {
    let tree = kernel_tree("SUBSYSTEM_DRIVERS=y\n");

    kforge()
        .arg("generate")
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no valid subsystems"));
    assert!(!tree.path().join("setup/.build/Makefile.dynamic").exists());
}

#[test]
fn test_generate_malformed_manifest_fails() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");
    write(tree.path(), "scripts/kconfig/subsystems.json", "{ \"subsystems\": ");

    kforge()
        .arg("generate")
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("subsystem manifest"));
}

// ============================================================================
// kforge build
// ============================================================================

#[cfg(unix)]
#[test]
fn test_build_reference_backend_succeeds() {
    let tree = kernel_tree("SUBSYSTEM_PS2_KEYBOARD=y\n");

    kforge()
        .args(["build", "--backend", "reference", "--jobs", "2"])
        .current_dir(tree.path())
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn test_build_failure_exits_nonzero() {
    let tree = kernel_tree("SUBSYSTEM_BROKEN=y\n");

    kforge()
        .args(["build", "--backend", "reference", "--jobs", "1"])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: boom"))
        .stderr(predicate::str::contains("drivers/broken/fail.c"));
}

#[cfg(unix)]
#[test]
fn test_build_json_events() {
    let tree = kernel_tree("SUBSYSTEM_BROKEN=y\n");

    kforge()
        .args([
            "--message-format",
            "json",
            "build",
            "--backend",
            "reference",
            "--keep-going",
        ])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"reason\":\"build-started\""))
        .stdout(predicate::str::contains("\"status\":\"failed\""))
        .stdout(predicate::str::contains("\"status\":\"succeeded\""))
        .stdout(predicate::str::contains("\"reason\":\"build-finished\""));
}

#[test]
fn test_build_native_backend_missing_fails() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .args(["build", "--backend", "native"])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("libkconfig_build.so"));
}

#[test]
fn test_build_invalid_backend_fails() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .args(["build", "--backend", "turbo"])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid backend"));
}

#[test]
fn test_build_misspelled_policy_in_config_fails() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");
    write(tree.path(), ".kforge/config.toml", "[build]\npolicy = \"contnue\"\n");

    kforge()
        .args(["build", "--backend", "reference"])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("build.policy"));
}

// ============================================================================
// kforge compile / clean / list
// ============================================================================

#[cfg(unix)]
#[test]
fn test_compile_single_file() {
    let tree = kernel_tree("");

    kforge()
        .args(["compile", "kernel/main.c", "--backend", "reference"])
        .current_dir(tree.path())
        .assert()
        .success();

    kforge()
        .args(["compile", "drivers/broken/fail.c", "--backend", "reference"])
        .current_dir(tree.path())
        .assert()
        .failure();
}

#[test]
fn test_compile_missing_file_fails() {
    let tree = kernel_tree("");

    kforge()
        .args(["compile", "kernel/absent.c"])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_clean_without_makefile_succeeds() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .args(["clean", "--backend", "reference"])
        .current_dir(tree.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("nothing to clean"));
}

#[test]
fn test_make_without_makefile_fails() {
    let tree = kernel_tree("SUBSYSTEM_NET=y\n");

    kforge()
        .args(["make", "--backend", "reference"])
        .current_dir(tree.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("kforge generate"));
}

#[test]
fn test_list_components() {
    let tree = kernel_tree("");

    kforge()
        .arg("list")
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("* KERNEL"))
        .stdout(predicate::str::contains("PS2_KEYBOARD"))
        .stdout(predicate::str::contains("desktop"));
}

#[test]
fn test_list_filters_by_arch() {
    let tree = kernel_tree("");

    kforge()
        .args(["list", "--arch", "arm64"])
        .current_dir(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("KERNEL"))
        .stdout(predicate::str::contains("INTERRUPT").not());
}

// ============================================================================
// kforge completions
// ============================================================================

#[test]
fn test_completions_bash() {
    kforge()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kforge"));
}

#[test]
fn test_help() {
    kforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"));
}
