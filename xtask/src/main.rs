use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for cubeworld")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests, doc and the headless smoke run
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Simulate frames headlessly with a device loss mid-run
    Smoke {
        #[arg(long, default_value = "240")]
        frames: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test()?;
            doc()?;
            smoke(240)?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test => test()?,
        Commands::Doc => doc()?,
        Commands::Build => cargo("build", &["build", "--workspace"])?,
        Commands::Smoke { frames } => smoke(frames)?,
    }

    Ok(())
}

fn cargo(task: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("{task} failed ({status})");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn test() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

fn smoke(frames: u64) -> Result<()> {
    let frames = frames.max(2).to_string();
    let lose_at = "1";
    cargo(
        "smoke run",
        &[
            "run",
            "--quiet",
            "-p",
            "cubeworld-cli",
            "--",
            "simulate",
            "--frames",
            &frames,
            "--lose-device-at",
            lose_at,
        ],
    )
}
