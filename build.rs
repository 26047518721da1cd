use vergen::EmitBuilder;

// Emits VERGEN_* build and git metadata, logged at startup.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .emit()?;
    Ok(())
}
