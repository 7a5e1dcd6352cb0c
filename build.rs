use std::env;
use std::path::PathBuf;

// Compiles `fixtures/fixture.c` into a shared library that the loader tests open.
fn main() {
    println!("cargo:rerun-if-changed=fixtures/fixture.c");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    let file_name = match target_os.as_str() {
        "windows" => "dlfcn_fixture.dll",
        "macos" | "ios" => "libdlfcn_fixture.dylib",
        _ => "libdlfcn_fixture.so",
    };
    let output = out_dir.join(file_name);

    let compiler = cc::Build::new()
        .pic(true)
        .cargo_metadata(false)
        .get_compiler();

    let mut cmd = compiler.to_command();
    if compiler.is_like_msvc() {
        cmd.arg("/LD")
            .arg("fixtures/fixture.c")
            .arg(format!("/Fo{}\\", out_dir.display()))
            .arg(format!("/Fe{}", output.display()));
    } else {
        cmd.arg("-shared")
            .arg("-o")
            .arg(&output)
            .arg("fixtures/fixture.c");
    }

    let status = cmd.status().expect("failed to spawn the C compiler");
    if !status.success() {
        panic!("failed to build the fixture library: {}", status);
    }

    println!("cargo:rustc-env=DLFCN_FIXTURE={}", output.display());
}
