use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use clap_complete_nushell::Nushell;
use clap_mangen::Man;
use key_overlay::cli::Args;

use std::io::Write;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct XtaskArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate man page and shell completions.
    GenerateDocs,
    /// Run cargo check.
    Check,
    /// Run cargo test.
    Test,
    /// Run cargo clippy.
    Clippy,
    /// Run cargo fmt --check.
    FmtCheck,
}

fn main() -> Result<()> {
    let args = XtaskArgs::parse();

    match args.command {
        Commands::GenerateDocs => generate_docs().context("Failed to generate docs"),
        Commands::Check => run_cargo("check", &["--workspace"]).context("cargo check failed"),
        Commands::Test => run_cargo("test", &["--workspace"]).context("cargo test failed"),
        Commands::Clippy => run_cargo("clippy", &["--workspace", "--", "-D", "warnings"])
            .context("cargo clippy failed"),
        Commands::FmtCheck => run_cargo("fmt", &["--", "--check"]).context("cargo fmt failed"),
    }
}

fn run_cargo(command: &str, args: &[&str]) -> Result<()> {
    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let status = Command::new(cargo)
        .arg(command)
        .args(args)
        .current_dir(project_root()?)
        .status()
        .with_context(|| format!("Failed to execute cargo {command}"))?;

    if !status.success() {
        anyhow::bail!("cargo {command} exited with {status}");
    }
    Ok(())
}

fn project_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask manifest has no parent directory")
}

fn generate_docs() -> Result<()> {
    let docs_dir = project_root()?.join("docs");
    let man_dir = docs_dir.join("man");
    let completions_dir = docs_dir.join("completions");

    fs::create_dir_all(&man_dir).context("Failed to create man directory")?;
    fs::create_dir_all(&completions_dir).context("Failed to create completions directory")?;

    let cmd = Args::command();
    let bin_name = cmd.get_name().to_string();

    let man_path = man_dir.join(format!("{bin_name}.1"));
    println!("Generating man page: {}", man_path.display());
    generate_man_page(&cmd, &man_path)?;

    generate_completions(&cmd, &completions_dir)?;

    println!(
        "Successfully generated man page and completions in: {}",
        docs_dir.display()
    );
    Ok(())
}

// --- Man Page Content Constants ---
// roff: \fB...\fR = bold, \fI...\fR = italic, \- = hyphen, \(bu = bullet

const MAN_INPUT: &str = r#"
\fB{bin_name}\fR reads one frame at a time, either from a WebSocket (\fB\-\-connect\fR) or one line at a time from standard input (\fB\-\-stdin\fR).
Three frame shapes are understood:
.IP \(bu 4
\fB"reset"\fR: the literal text \fIreset\fR zeroes every press counter and forces the rate display to 0.
.IP \(bu 4
\fBtransition\fR: a JSON array \fB["Z", true]\fR or \fB["Z", false, 0]\fR giving the key, whether it went down, and an optional display index.
.IP \(bu 4
\fBsnapshot\fR: a JSON array of the keys currently held, e.g. \fB["Z", "X"]\fR. Each snapshot is diffed against the previous one; keys that appeared are presses, keys that disappeared are releases.
.PP
\fB\-\-format auto\fR accepts both: an array whose second element is a boolean is a transition, anything else is a snapshot.
"#;

const MAN_HISTORY: &str = r#"
.B Mechanism
.PP
Every press opens a bar. Its leading edge advances at \fB\-\-history\-pps\fR pixels per second for as long as the bar exists. While the key is held the trailing edge stays at the key box, so the bar grows; after release the trailing edge advances at the same speed and the bar scrolls away.
.PP
A bar is removed when the renderer reports it outside the surface (\fB\-\-history\-extent\fR pixels). \fB\-\-no\-history\fR disables bars entirely.
"#;

const MAN_RATE: &str = r#"
.PP
Presses are kept in a sliding window (\fB\-\-window\fR, default 1s). On every tick, presses older than the window are evicted and the rate is
.IP
.nf
ceil(presses / window_seconds / events_per_beat * 60)
.fi
.PP
With the default \fB\-\-events\-per\-beat 4\fR, four presses make one beat, so the value reads as beats per minute of sixteenth notes. A new value is sent to the renderer only when it changes.
"#;

const MAN_EXAMPLES: &str = r#"
.PP
.B Connect to a local key stream:
.IP
.nf
{bin_name} \-\-connect ws://127.0.0.1:7685/ws
.fi
.PP
.B Replay a recorded snapshot stream as JSON render records:
.IP
.nf
{bin_name} \-\-stdin \-\-format snapshot \-\-renderer json < session.ndjson
.fi
.PP
.B Rename keys and log every press:
.IP
.nf
{bin_name} \-\-label Z=K1 \-\-label X=K2 \-\-log\-all\-events
.fi
"#;

const MAN_OUTPUT: &str = r#"
.PP
\fB\-\-renderer text\fR (default) redraws one status line on standard output: per key its label, a \fB*\fR while held, the press count and the live bar count, followed by the rate.
.PP
\fB\-\-renderer json\fR writes one JSON object per renderer call, tagged by \fB"op"\fR: \fBslot\fR, \fBsegment\fR, \fBgeometry\fR, \fBremove\fR, \fBheld\fR, \fBcounter\fR and \fBrate\fR. \fB\-\-no\-geometry\fR suppresses the per-tick geometry records.
"#;

const MAN_STATISTICS: &str = r#"
.PP
Statistics are printed to standard error on exit, and every \fB\-\-log\-interval\fR when set. They cover frames received and rejected, resets, presses and releases, the peak rate, and per key the press count with min / avg / max hold time. \fB\-\-stats\-json\fR prints the same data as JSON.
"#;

const MAN_SIGNALS: &str = r#"
.TP
\fBSIGUSR1\fR
Pause or resume bar movement and rate updates. Paused time is not replayed on resume.
.TP
\fBSIGINT\fR, \fBSIGTERM\fR, \fBSIGQUIT\fR
Print final statistics and exit.
"#;

const MAN_EXIT_STATUS: &str = r#"
.TP
\fB0\fR
The stream ended.
.TP
\fB2\fR
Invalid configuration, or the stream could not be opened.
.TP
\fB3\fR
A frame was rejected while running with \fB\-\-strict\fR.
.TP
\fB4\fR
Writing renderer output failed.
.TP
\fB128+N\fR
Terminated by signal N.
"#;

const MAN_ENVIRONMENT: &str = r#"
.TP
\fBRUST_LOG\fR
Log filter directives, used when \fB\-\-log\-filter\fR is not given. Defaults to \fIkey_overlay=info\fR.
"#;

fn generate_man_page(cmd: &clap::Command, path: &Path) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let date = chrono::Local::now().format("%B %d, %Y").to_string();
    let app_name_uppercase = cmd.get_name().to_uppercase();
    let bin_name = cmd.get_name();

    let mut buffer: Vec<u8> = Vec::new();

    // clap_mangen does not emit the .TH header.
    writeln!(buffer, r#".TH "{app_name_uppercase}" 1 "{date}" "{version}" "User Commands""#)?;
    Man::new(cmd.clone()).render(&mut buffer)?;

    let custom_sections = [
        ("INPUT", MAN_INPUT),
        ("HISTORY BARS", MAN_HISTORY),
        ("RATE", MAN_RATE),
        ("OUTPUT", MAN_OUTPUT),
        ("EXAMPLES", MAN_EXAMPLES),
        ("STATISTICS", MAN_STATISTICS),
        ("SIGNALS", MAN_SIGNALS),
        ("EXIT STATUS", MAN_EXIT_STATUS),
        ("ENVIRONMENT", MAN_ENVIRONMENT),
    ];

    for (title, template) in custom_sections {
        writeln!(buffer, ".SH {title}")?;
        writeln!(buffer, "{}", template.replace("{bin_name}", bin_name))?;
    }

    fs::write(path, buffer)
        .with_context(|| format!("Failed to write man page to {}", path.display()))?;
    Ok(())
}

/// Generates shell completion files.
fn generate_completions(cmd: &clap::Command, completions_dir: &Path) -> Result<()> {
    let bin_name = cmd.get_name().to_string();
    let shells = [
        (Shell::Bash, "bash"),
        (Shell::Elvish, "elv"),
        (Shell::Fish, "fish"),
        (Shell::PowerShell, "ps1"),
        (Shell::Zsh, "zsh"),
    ];

    for (shell, ext) in shells {
        let path = completions_dir.join(format!("{bin_name}.{ext}"));
        println!("Generating completion file: {}", path.display());
        let mut file = fs::File::create(&path)
            .with_context(|| format!("Failed to create completion file: {}", path.display()))?;
        generate(shell, &mut cmd.clone(), bin_name.clone(), &mut file);
    }

    let nu_path = completions_dir.join(format!("{bin_name}.nu"));
    println!("Generating Nushell completion file: {}", nu_path.display());
    let mut nu_file = fs::File::create(&nu_path).with_context(|| {
        format!("Failed to create Nushell completion file: {}", nu_path.display())
    })?;
    generate(Nushell, &mut cmd.clone(), bin_name, &mut nu_file);

    Ok(())
}
