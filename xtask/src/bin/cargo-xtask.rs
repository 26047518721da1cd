use std::env;
use std::path::PathBuf;
use std::process::{exit, Command};

/// Lets `cargo xtask <cmd>` stand in for `cargo run --package xtask -- <cmd>`.
fn main() {
    // cargo passes "xtask" as the first argument
    let args: Vec<String> = env::args().skip_while(|arg| arg != "xtask").skip(1).collect();

    let Some(root) = workspace_root() else {
        eprintln!("could not locate the workspace root");
        exit(1);
    };

    let status = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .current_dir(root)
        .args(["run", "--quiet", "--package", "xtask", "--bin", "xtask", "--"])
        .args(&args)
        .status();

    match status {
        Ok(status) => exit(status.code().unwrap_or(1)),
        Err(e) => {
            eprintln!("failed to run xtask: {e}");
            exit(1);
        }
    }
}

fn workspace_root() -> Option<PathBuf> {
    let output = Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .ok()?;
    let manifest = String::from_utf8(output.stdout).ok()?;
    PathBuf::from(manifest.trim()).parent().map(PathBuf::from)
}
