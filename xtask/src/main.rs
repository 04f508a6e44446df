use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "snapshot_reaper_lambda";
const LAMBDA_BIN: &str = "snapshot_reaper";
const CLI_BIN: &str = "snapshot_reaper_cli";
const DIST_DIR: &str = "dist";
const ARTIFACT_NAME: &str = "snapshot_reaper.zip";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the snapshot reaper workspace",
    long_about = "A unified CLI for packaging the snapshot reaper Lambda,\n\
                  running CI checks, and dry-running against a live account."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and package the Lambda binary as a `bootstrap` zip
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
    /// Run the reconciler in dry-run mode against the current AWS environment
    DryRun {
        /// AWS region, overriding the environment
        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Unit and integration tests
    Test,
    /// Run lint + test
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_lambda(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);
    ensure_c_linker_available(target);

    step("Build snapshot reaper lambda binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        LAMBDA_BIN,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create lambda dist directory");

    package_lambda_zip(
        &target_dir.join(binary_name(LAMBDA_BIN, target)),
        &dist_dir.join(ARTIFACT_NAME),
    );

    eprintln!(
        "\nPackaged artifact:\n- {}",
        dist_dir.join(ARTIFACT_NAME).display()
    );
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

fn ensure_c_linker_available(target: &str) {
    if !cfg!(windows) || !target.ends_with("unknown-linux-gnu") {
        return;
    }

    let env_override_keys = [
        format!("CC_{}", target.replace('-', "_")),
        format!("CC_{target}"),
        "TARGET_CC".to_string(),
        "CC".to_string(),
    ];

    for key in env_override_keys {
        if let Ok(value) = std::env::var(&key) {
            let candidate = value.trim();
            if !candidate.is_empty() && tool_works(candidate) {
                return;
            }
        }
    }

    let canonical = "x86_64-linux-gnu-gcc";
    if tool_works(canonical) {
        return;
    }

    panic!(
        "missing C cross-linker for target `{target}`. install `{canonical}` (or set CC_x86_64_unknown_linux_gnu) before running `cargo run -p xtask -- package`.\n\
         Tip: the AWS SDK's TLS stack (aws-lc-sys) needs a Linux C toolchain when cross-compiling from Windows."
    );
}

fn tool_works(program: &str) -> bool {
    let mut parts = program.split_whitespace();
    let Some(bin) = parts.next() else {
        return false;
    };
    let args: Vec<&str> = parts.collect();

    Command::new(bin)
        .args(&args)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test snapshot_reaper_core");
    run_cargo(&["test", "-p", "snapshot_reaper_core"]);

    step("Test snapshot_reaper_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { target, profile } => {
            package_lambda(&target, profile);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::All => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::DryRun { region } => {
            let mut args = vec!["run", "-p", LAMBDA_PACKAGE, "--bin", CLI_BIN, "--", "--dry-run"];
            if let Some(region) = region.as_deref() {
                args.extend(["--region", region]);
            }
            run_cargo(&args);
        }
    }
}
