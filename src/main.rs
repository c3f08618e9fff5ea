mod build_info;
mod cli;
mod client;
mod config;
mod detection;
mod error;
mod image_io;
mod logging;
mod metrics;
mod overlay;
mod render;
mod report;
mod session;
mod settings;
mod thermal;
mod utils;

#[allow(unused_imports)]
use log::{Level, trace, debug, info, warn, error};

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use crate::build_info::BuildInfo;
use crate::cli::{Cli, Command, OutputArgs, SettingsCommand};
use crate::client::{DetectionClient, ServerStatus};
use crate::config::Config;
use crate::detection::DetectionResponse;
use crate::error::{LeafError, LeafResult};
use crate::report::AnalysisReport;
use crate::session::AnalysisSession;
use crate::settings::UserSettings;

const APP_NAME: &str = "leafscope";

fn main() -> ExitCode {
    let cli = Cli::parse();

    let shared_log_buffer = logging::setup_logger(cli.verbose);
    logging::setup_panic_hook(APP_NAME, logging::shared_log_buffer());
    info!("{} starting", BuildInfo::display_version());

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let export_logs = cli.export_logs;
    let result = runtime.block_on(run(cli));

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    };

    if export_logs {
        match logging::export_debug_logs(APP_NAME, &shared_log_buffer) {
            Ok(path) => eprintln!("Debug log written to {}", path.display()),
            Err(e) => eprintln!("Failed to export debug log: {}", e),
        }
    }

    code
}

async fn run(cli: Cli) -> LeafResult<ExitCode> {
    let settings = UserSettings::load(cli.settings.as_deref());
    let config = Config::from_settings(&settings, cli.backend.as_deref());

    match cli.command {
        Command::Analyze(args) => {
            let client = build_client(&config)?;
            let mut session = AnalysisSession::new();

            if session.refresh_status(&client).await == ServerStatus::Offline {
                return Err(LeafError::BackendOffline(config.backend_url.clone()));
            }
            session.select_image(&args.image).await?;

            let mut rng = make_rng(args.output.seed);
            session.analyze(&client, &config.overlay, &mut rng).await?;
            finish(&session, &args.image, &args.output, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Render(args) => {
            let response = DetectionResponse::from_file(&args.detections)
                .await
                .map_err(LeafError::Detections)?;

            let mut session = AnalysisSession::new();
            session.select_image(&args.image).await?;

            let mut rng = make_rng(args.output.seed);
            session.render_offline(response, &config.overlay, &mut rng)?;
            finish(&session, &args.image, &args.output, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let client = build_client(&config)?;
            let status = client.health().await;
            println!("Backend {}: {}", config.backend_url, status);
            Ok(if status == ServerStatus::Online { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Settings(command) => {
            let path = cli.settings.clone().unwrap_or_else(UserSettings::settings_path);
            match command {
                SettingsCommand::Init { force } => {
                    UserSettings::default().save_to(&path, force).map_err(LeafError::Settings)?;
                    println!("Wrote {}", path.display());
                }
                SettingsCommand::Show => print!("{}", settings.to_yaml_with_comments()),
                SettingsCommand::Path => println!("{}", path.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            println!("{}", BuildInfo::detailed_info());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_client(config: &Config) -> LeafResult<DetectionClient> {
    Ok(DetectionClient::new(&config.backend_url, config.connect_timeout, config.request_timeout)?)
}

fn make_rng(seed: Option<u64>) -> fastrand::Rng {
    match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    }
}

/// Write the visualization (and the optional report), then print the summary
async fn finish(session: &AnalysisSession, image: &Path, output: &OutputArgs, config: &Config) -> LeafResult<()> {
    let Some(outcome) = session.outcome() else {
        return Err(LeafError::AnalyzeUnavailable);
    };

    let out_path = output
        .out
        .clone()
        .unwrap_or_else(|| image_io::default_output_path(image, &config.output_suffix));
    image_io::save_png(&outcome.visualization.image, &out_path).await?;

    let report = AnalysisReport::new(image, Some(&out_path), outcome);
    if let Some(report_path) = &output.report {
        report.save(report_path).await?;
        info!("Report written to {}", report_path.display());
    }

    println!("{}", report.summary());
    Ok(())
}
