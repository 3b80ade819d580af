//! Test fixtures: manifests and on-disk kernel trees.

use std::path::Path;

use tempfile::TempDir;

/// A small manifest exercising required components, dependencies, multiple
/// architectures, a dangling dependency and a profile.
pub const SAMPLE_MANIFEST: &str = r#"{
  "architecture": { "default": "x86-64" },
  "subsystems": {
    "KERNEL": {
      "name": "Kernel Core",
      "required": true,
      "architectures": ["x86-64", "arm64"],
      "files": {
        "x86-64": ["kernel/main.c", "arch/x86-64/boot.asm"],
        "arm64": ["kernel/main.c"]
      }
    },
    "MEMORY": {
      "name": "Memory Management",
      "required": true,
      "dependencies": ["KERNEL"],
      "files": { "x86-64": ["mm/pmm.c", "mm/paging.c"] }
    },
    "PS2_KEYBOARD": {
      "name": "PS/2 Keyboard",
      "dependencies": ["INTERRUPT"],
      "files": { "x86-64": ["drivers/ps2/keyboard.c"] }
    },
    "INTERRUPT": {
      "name": "Interrupts",
      "dependencies": ["KERNEL"],
      "files": { "x86-64": ["interrupt/idt.c", "interrupt/isr.asm"] }
    },
    "NET": {
      "name": "Networking",
      "dependencies": ["PCI"],
      "files": { "x86-64": ["net/stack.c", "net/missing.c"] }
    },
    "CPP_RUNTIME": {
      "name": "C++ Runtime",
      "files": { "x86-64": ["cpp/runtime.cpp", "cpp/include/runtime.h"] }
    }
  },
  "profiles": {
    "desktop": {
      "name": "Desktop",
      "description": "Keyboard and networking",
      "architecture": "x86-64",
      "subsystems": ["PS2_KEYBOARD", "NET"]
    }
  }
}
"#;

/// Sources that exist in [`kernel_tree`]; `net/missing.c` is deliberately absent.
pub const SAMPLE_SOURCES: &[&str] = &[
    "kernel/main.c",
    "arch/x86-64/boot.asm",
    "mm/pmm.c",
    "mm/paging.c",
    "drivers/ps2/keyboard.c",
    "interrupt/idt.c",
    "interrupt/isr.asm",
    "net/stack.c",
    "cpp/runtime.cpp",
    "cpp/include/runtime.h",
];

/// Create a kernel tree recognisable by root discovery, with the sample
/// manifest, sources and the given `.config` contents.
pub fn kernel_tree(selection: &str) -> TempDir {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let root = tmp.path();

    write(root, "Makefile", "all:\n");
    write(
        root,
        "scripts/unibuild.sh",
        "case \"$1\" in *fail*) echo \"$1: error: boom\" >&2; exit 1;; esac\n",
    );
    write(root, "scripts/kconfig/subsystems.json", SAMPLE_MANIFEST);
    write(root, ".config", selection);
    for source in SAMPLE_SOURCES {
        write(root, source, "");
    }
    tmp
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture dir");
    }
    std::fs::write(&path, contents).expect("failed to write fixture file");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;

    #[test]
    fn test_sample_manifest_parses() {
        let catalog = Catalog::parse(SAMPLE_MANIFEST, Path::new("subsystems.json")).unwrap();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.required().count(), 2);
        assert!(catalog.profiles().contains_key("desktop"));
    }

    #[test]
    fn test_kernel_tree_layout() {
        let tree = kernel_tree("SUBSYSTEM_NET=y\n");
        assert!(tree.path().join("scripts/unibuild.sh").is_file());
        assert!(tree.path().join("kernel/main.c").is_file());
        assert!(!tree.path().join("net/missing.c").exists());
    }
}
