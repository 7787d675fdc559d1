use chim_installer::{InstallerSettings, Orchestrator, ProgressEvent, Services, SetupError, StepResult, StepStatus};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "CHIM mod package installer")]
struct Args {
    /// Path to a JSON settings file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Installation root (overrides the settings file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the system requirement checks (Exit 0 = pass, 1 = fail)
    Check,
    /// Run the full installation pipeline
    Install,
    /// Restart the machine to finish the installation
    Restart {
        /// Confirm the restart
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, SetupError> {
    let mut settings = match &args.config {
        Some(path) => InstallerSettings::from_json_file(path)?,
        None => InstallerSettings::default(),
    };
    if let Some(root) = args.root {
        settings.install_root = root;
    }

    let services = Services::host(&settings)?;
    let orchestrator = Orchestrator::new(settings, services);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let on_progress = |event: ProgressEvent| match event.percent_complete() {
        Some(pct) => println!("[{:>5.1}%] {}", pct, event.message()),
        None => println!("{}", event.message()),
    };

    let code = match args.cmd {
        Cmd::Check => {
            let checks = orchestrator.run_checks().await;
            for check in &checks {
                print_result(check.kind.display_name(), &check.result);
            }
            match checks.last() {
                Some(overall) => exit_code(&overall.result),
                None => ExitCode::FAILURE,
            }
        }
        Cmd::Install => {
            let report = orchestrator.run(&cancel, &on_progress).await;
            for (stage, result) in &report.stages {
                print_result(stage.display_name(), result);
            }
            if let Some(warnings) = &report.warnings {
                println!("{}", warnings);
            }
            println!("{}", report.outcome.message);
            if report.outcome.is_success() && report.restart_required {
                println!("A restart is required. Run `chim-installer restart --yes` when ready.");
            }
            exit_code(&report.outcome)
        }
        Cmd::Restart { yes: false } => {
            eprintln!("Refusing to restart without --yes");
            ExitCode::FAILURE
        }
        Cmd::Restart { yes: true } => {
            let result = orchestrator.scripts().restart_system(&cancel).await;
            print_result("Restart", &result);
            exit_code(&result)
        }
    };
    Ok(code)
}

fn print_result(label: &str, result: &StepResult) {
    let mark = match result.status {
        StepStatus::Succeeded => "ok",
        StepStatus::Failed => "FAILED",
        StepStatus::Cancelled => "cancelled",
    };
    println!("[{}] {}: {}", mark, label, result.message);
    if let Some(details) = &result.details {
        for line in details.lines() {
            println!("    {}", line);
        }
    }
}

fn exit_code(result: &StepResult) -> ExitCode {
    match result.status {
        StepStatus::Succeeded => ExitCode::SUCCESS,
        StepStatus::Failed => ExitCode::FAILURE,
        StepStatus::Cancelled => ExitCode::from(130),
    }
}
