use std::{env, path::PathBuf};

const WATCHED_VARIABLES: [&str; 5] = [
    "FFMPEG_DIR",
    "FFMPEG_PKG_CONFIG_PATH",
    "VCPKG_ROOT",
    "VCPKGRS_DYNAMIC",
    "VCPKGRS_TRIPLET",
];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // ffmpeg-sys-next finds FFmpeg through pkg-config everywhere but Windows.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    for hint in vcpkg_hints() {
        println!("cargo:warning={hint}");
    }
}

fn vcpkg_hints() -> Vec<String> {
    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        return vec![
            "framebridge needs FFmpeg: set FFMPEG_DIR, or install FFmpeg with vcpkg and set VCPKG_ROOT."
                .to_string(),
        ];
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install_dir = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if !install_dir.exists() {
        return vec![format!(
            "VCPKG_ROOT is set but {} does not exist; run `vcpkg install ffmpeg`.",
            install_dir.display()
        )];
    }

    let mut hints = vec![format!(
        "Found vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to pin it.",
        install_dir.display()
    )];
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        hints.push("Set VCPKGRS_DYNAMIC=1 to link a dynamic vcpkg FFmpeg build.".to_string());
    }
    hints
}
