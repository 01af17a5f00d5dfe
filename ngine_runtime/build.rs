// Build script compiling the GLSL sources in resources/shaders to SPIR-V

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_STAGES: [&str; 6] = ["vert", "frag", "comp", "geom", "tesc", "tese"];

/// Compile every shader stage found under `shader_dir` into `target_dir`
fn compile_shaders_recursive(shader_dir: &Path, target_dir: &Path, glslc: &Path, compiled_count: &mut u32) {
    let Ok(entries) = std::fs::read_dir(shader_dir) else {
        eprintln!("info: No shader directory found at: {}", shader_dir.display());
        return;
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                eprintln!("warning: Error reading shader directory entry: {e}");
                continue;
            }
        };

        if path.is_dir() {
            compile_shaders_recursive(&path, target_dir, glslc, compiled_count);
            continue;
        }

        let (Some(ext), Some(file_name)) = (path.extension().and_then(|e| e.to_str()), path.file_name()) else {
            continue;
        };
        // .glsl files are includes, not standalone stages
        if !SHADER_STAGES.contains(&ext) {
            continue;
        }

        // mvp.vert -> mvp.vert.spv, keeping vertex and fragment outputs apart
        let mut out_name = file_name.to_os_string();
        out_name.push(".spv");
        let out_file = target_dir.join(out_name);

        let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
        let needs_compile = match (modified(&path), modified(&out_file)) {
            (Some(src), Some(dst)) => src > dst,
            _ => true,
        };
        if !needs_compile {
            eprintln!("info: Shader {} is up to date", path.display());
            continue;
        }

        let status = Command::new(glslc)
            .arg("-I")
            .arg(shader_dir)
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();

        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}", path.display(), out_file.display());
                *compiled_count += 1;
            }
            Ok(s) => panic!("glslc failed for {} with exit code {}", path.display(), s.code().unwrap_or(-1)),
            Err(e) => panic!("Failed to run glslc for {}: {e}", path.display()),
        }
    }
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let shader_dir = manifest_dir.join("resources/shaders");
    let target_dir = manifest_dir.join("target/shaders");

    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");
    println!("cargo:rustc-env=NGINE_SHADER_DIR={}", target_dir.display());
    println!("cargo:rustc-env=NGINE_RESOURCE_DIR={}", manifest_dir.join("resources").display());

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        Path::new(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        Path::new(&vulkan_sdk).join("bin").join("glslc")
    };
    assert!(glslc.exists(), "glslc not found at {}", glslc.display());

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {}: {e}", target_dir.display());
        return;
    }

    let mut compiled_count = 0;
    compile_shaders_recursive(&shader_dir, &target_dir, &glslc, &mut compiled_count);

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {compiled_count} shader(s)");
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
