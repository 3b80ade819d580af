//! Rendering of `setup/.build/Makefile.dynamic`.
//!
//! The output depends only on the kernel root, the plan and the selection
//! size. No timestamps, no hash-map ordering.

use std::fmt::{self, Write as _};
use std::path::Path;

use crate::builder::plan::BuildPlan;

const CFLAGS: &str = "-m64 -ffreestanding -mcmodel=large -mno-red-zone -mno-mmx -mno-sse \
-mno-sse2 -nostdlib -lgcc -I./includes -I./ -g -Wall -Wextra -fno-stack-protector -fno-builtin";

const LDFLAGS: &str = "-T kernel/linker.ld -z max-page-size=0x1000";

const INCLUDE_DIRS: &[&str] = &[
    "",
    "/includes",
    "/includes/ir0",
    "/mm",
    "/arch/common",
    "/arch/$(ARCH)/include",
    "/include",
    "/kernel",
    "/drivers",
    "/fs",
    "/interrupt",
    "/scheduler",
];

const CXX_FLAGS: &str = "-m64 -ffreestanding -fno-exceptions -fno-rtti -fno-threadsafe-statics \\\n\
\t\t-mcmodel=large -mno-red-zone -mno-mmx -mno-sse -mno-sse2 \\\n\
\t\t-nostdlib -lgcc -g -Wall -Wextra -fno-stack-protector -fno-builtin \\\n\
\t\t-I./cpp/include $(CFLAGS)";

/// Render the dynamic makefile for `plan`.
///
/// `selected` is the number of subsystems the user selected after
/// migration and validation; it only appears in a summary comment.
pub fn render(root: &Path, plan: &BuildPlan, selected: usize) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_makefile(&mut out, root, plan, selected)?;
    Ok(out)
}

fn write_makefile(
    out: &mut String,
    root: &Path,
    plan: &BuildPlan,
    selected: usize,
) -> fmt::Result {
    let rule = "#".repeat(79);
    writeln!(out, "{rule}")?;
    writeln!(out, "# KERNEL DYNAMIC MAKEFILE")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "# Generated by kforge from the subsystem selection.")?;
    writeln!(out, "# Do not edit: regenerated on every configuration change.")?;
    writeln!(out, "{rule}")?;
    writeln!(out)?;

    writeln!(out, "KERNEL_ROOT := {}", root.display())?;
    writeln!(out, "ARCH := {}", plan.arch)?;
    writeln!(out)?;

    writeln!(out, "# Compiler configuration")?;
    writeln!(out, "CC = gcc")?;
    writeln!(out, "LD = ld")?;
    writeln!(out, "ASM = nasm")?;
    writeln!(out, "NASM = nasm")?;
    writeln!(out)?;

    writeln!(out, "# Flags")?;
    writeln!(out, "CFLAGS = {CFLAGS}")?;
    writeln!(out, "LDFLAGS = {LDFLAGS}")?;
    writeln!(out, "NASMFLAGS = -f elf64")?;
    writeln!(out, "ASMFLAGS = -f elf64")?;
    writeln!(out)?;

    writeln!(out, "# Include paths")?;
    for dir in INCLUDE_DIRS {
        writeln!(out, "CFLAGS += -I$(KERNEL_ROOT){dir}")?;
    }
    writeln!(out)?;

    writeln!(out, "# Object files from selected subsystems")?;
    writeln!(out, "OBJS =")?;
    for group in plan.groups.iter().filter(|g| !g.units.is_empty()) {
        writeln!(out)?;
        writeln!(out, "# Subsystem: {} ({} files)", group.id, group.units.len())?;
        for unit in &group.units {
            writeln!(out, "OBJS += {}", unit.object.display())?;
        }
    }
    writeln!(out)?;

    let total = plan.stats.total_units;
    writeln!(
        out,
        "# Total: {} object file(s) from {} subsystem(s)",
        total, plan.stats.total_components
    )?;
    writeln!(out, "# Selected: {} subsystem(s)", selected)?;
    writeln!(
        out,
        "# With dependencies: {} subsystem(s)",
        plan.stats.total_components
    )?;
    if plan.stats.missing_files > 0 {
        writeln!(
            out,
            "# Skipped: {} missing source file(s)",
            plan.stats.missing_files
        )?;
    }
    writeln!(out)?;

    writeln!(out, "# Build rules")?;
    writeln!(out, ".PHONY: all clean")?;
    writeln!(out)?;
    writeln!(out, "all: $(OBJS)")?;
    writeln!(out, "\t@echo \"Compiled {total} object file(s)\"")?;
    writeln!(out)?;

    writeln!(out, "# Compile C files")?;
    writeln!(out, "%.o: %.c")?;
    writeln!(out, "\t@echo \"  CC      $<\"")?;
    writeln!(out, "\t@$(CC) $(CFLAGS) -c $< -o $@")?;
    writeln!(out)?;

    writeln!(out, "# Compile C++ files")?;
    writeln!(out, "%.o: %.cpp")?;
    writeln!(out, "\t@echo \"  CXX     $<\"")?;
    writeln!(out, "\t@g++ {CXX_FLAGS} -c $< -o $@")?;
    writeln!(out)?;

    writeln!(out, "# Compile ASM files")?;
    writeln!(out, "%.o: %.asm")?;
    writeln!(out, "\t@echo \"  ASM     $<\"")?;
    writeln!(out, "\t@$(ASM) $(ASMFLAGS) $< -o $@")?;
    writeln!(out)?;

    writeln!(out, "# Clean rule")?;
    writeln!(out, "clean:")?;
    writeln!(out, "\t@echo \"Cleaning object files...\"")?;
    writeln!(out, "\t@rm -f $(OBJS)")?;
    writeln!(out, "\t@echo \"Clean complete\"")?;
    Ok(())
}
