//! Records the rustc and cargo versions the runtime is built with. The
//! sandbox gate measures these as the live toolchain.

use std::env;
use std::process::Command;

fn tool_version(var: &str, fallback: &str) -> String {
    let tool = env::var(var).unwrap_or_else(|_| fallback.to_string());
    Command::new(tool)
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .and_then(|line| line.split_whitespace().nth(1).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");
    println!("cargo:rerun-if-env-changed=CARGO");
    println!(
        "cargo:rustc-env=BASTION_RUSTC_VERSION={}",
        tool_version("RUSTC", "rustc")
    );
    println!(
        "cargo:rustc-env=BASTION_CARGO_VERSION={}",
        tool_version("CARGO", "cargo")
    );
}
