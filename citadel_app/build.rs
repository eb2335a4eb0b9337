// Compiles the GLSL sources under shaders/src into SPIR-V binaries the
// renderer loads at startup. Compilation is skipped when no Vulkan SDK is
// available so the crate still builds on machines without one.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const STAGE_EXTENSIONS: [&str; 3] = ["vert", "frag", "geom"];

fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &str) {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: no shader directory at {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        // .glsl files are includes, not standalone shaders.
        if !STAGE_EXTENSIONS.contains(&ext) {
            continue;
        }

        let Some(file_name) = path.file_name() else {
            continue;
        };
        let mut out_name = file_name.to_os_string();
        out_name.push(".spv");
        let out_file = target_dir.join(out_name);

        let needs_compile = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src_time), Ok(dst_time)) => src_time > dst_time,
                _ => true,
            },
            _ => true,
        };
        if !needs_compile {
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
                eprintln!("info: compiled {:?}", file_name);
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {:?} with exit code {}", path, s.code().unwrap_or(-1));
                panic!("shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: failed to run glslc for {:?}: {}", path, e);
                panic!("failed to execute shader compiler");
            }
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=shaders/src");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let glslc = match env::var("VULKAN_SDK") {
        Ok(sdk) => {
            let path = if cfg!(target_os = "windows") {
                format!("{}\\Bin\\glslc.exe", sdk)
            } else {
                format!("{}/bin/glslc", sdk)
            };
            if !Path::new(&path).exists() {
                eprintln!("warning: glslc not found at {}, shader compilation skipped", path);
                return;
            }
            path
        }
        Err(_) => {
            // Fall back to a glslc on PATH if one exists.
            match Command::new("glslc").arg("--version").status() {
                Ok(s) if s.success() => "glslc".to_string(),
                _ => {
                    eprintln!("warning: VULKAN_SDK not set and no glslc on PATH, shader compilation skipped");
                    return;
                }
            }
        }
    };

    let shader_dir = PathBuf::from("shaders/src");
    let target_dir = PathBuf::from("shaders/compiled");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: failed to create {:?}: {}", target_dir, e);
        return;
    }

    compile_shaders(&shader_dir, &target_dir, &glslc);
}
