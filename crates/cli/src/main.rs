//! Predwrap - run Predator on one bitcode file with a timeout and write a
//! terse log of what it found

mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use predwrap_core::application::supervisor::constants::{
    DEFAULT_LOG_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_TOOL,
};
use predwrap_core::application::Supervisor;
use predwrap_core::domain::SupervisorConfig;
use predwrap_core::port::{ResultPersister, ToolchainProbe};
use predwrap_infra_fs::{LogFilePersister, LogFormat};
use predwrap_infra_system::{PathToolchainProbe, SubprocessLauncher};

#[derive(Parser, Debug)]
#[command(name = "predwrap")]
#[command(about = "Run Predator with timeout and process output", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to LLVM bitcode file to process
    #[arg(value_name = "program.bc")]
    infile: PathBuf,

    /// Number of seconds to wait until Predator produces result
    #[arg(short, long, value_name = "SEC", env = "PREDWRAP_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Where to save processed log output
    #[arg(short, long, value_name = "FILE", env = "PREDWRAP_OUT", default_value = DEFAULT_LOG_PATH)]
    out: PathBuf,

    /// Use 32-bit mode
    #[arg(long = "32")]
    is_32bit: bool,

    /// Enable debug logging of this wrapper
    #[arg(long)]
    debug: bool,

    /// Predator driver executable
    #[arg(long, value_name = "EXE", env = "PREDWRAP_TOOL", default_value = DEFAULT_TOOL)]
    tool: String,

    /// Log file format (text or json)
    #[arg(long, value_name = "FORMAT", env = "PREDWRAP_FORMAT", default_value = "text")]
    format: LogFormat,
}

impl Cli {
    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            program: self.tool.clone(),
            timeout: Duration::from_secs(self.timeout),
            is_32bit: self.is_32bit,
        }
    }
}

/// Fail unless `executable` can be found; this is a setup problem, not a run outcome
fn assert_in_path(probe: &dyn ToolchainProbe, executable: &str) -> Result<()> {
    match probe.locate(executable) {
        Some(path) => {
            debug!(executable = %executable, path = %path.display(), "Toolchain found");
            Ok(())
        }
        None => bail!("`{}` was not found in PATH", executable),
    }
}

async fn run(cli: Cli) -> Result<()> {
    debug!(version = predwrap_core::VERSION, args = ?cli, "Parsed arguments");

    assert_in_path(&PathToolchainProbe::new(), &cli.tool)?;

    let config = cli.supervisor_config();
    let supervisor = Supervisor::new(Arc::new(SubprocessLauncher::new()));
    let result = supervisor
        .run(&config.invocation(&cli.infile))
        .await
        .context("Supervising the analyser failed")?;

    info!(path = %cli.out.display(), "Writing logfile");
    let persister = LogFilePersister::new(&cli.out, cli.format);
    persister
        .persist(&result)
        .await
        .with_context(|| format!("Failed to write {}", cli.out.display()))?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.debug) {
        eprintln!("predwrap: failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "predwrap failed");
            ExitCode::FAILURE
        }
    }
}
