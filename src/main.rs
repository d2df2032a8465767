use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use tbx_check::cli::{Cli, Command};
use tbx_check::config::{Config, ConfigManager};
use tbx_check::http_client::SchemaHttpClient;
use tbx_check::importer::SchemaImporter;
use tbx_check::output::Output;
use tbx_check::pipeline;
use tbx_check::report::{ReportComposer, open_in_viewer};
use tbx_check::sync::SchemaSync;

const EXIT_INVALID: u8 = 1;
const EXIT_SETUP: u8 = 2;

fn init_tracing(cli: &Cli) {
    let filter = match cli.log_directive() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(EXIT_SETUP)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    let output = Output::new(config.verbosity());

    match &cli.command {
        Command::Validate(args) => validate(config, args.file.clone(), &output).await,
        Command::Import { schema_file } => {
            let importer = SchemaImporter::new(config.schema_layout().external_dir());
            let imported = importer.import(schema_file)?;
            print!("{}", output.format_import(&imported));
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync => {
            let client = SchemaHttpClient::new(config.http_client_config())?;
            let summary = SchemaSync::new(client, config.schema_layout())
                .run()
                .await
                .context("Schema sync failed, local schemas were left unchanged")?;
            print!("{}", output.format_sync(&summary));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn validate(config: Config, document: PathBuf, output: &Output) -> anyhow::Result<ExitCode> {
    let pipeline_config = config.pipeline_config();
    let composer = ReportComposer::new(&config.output.report_dir);

    let (report, artifact) = tokio::task::spawn_blocking(move || {
        pipeline::run(&pipeline_config, &document, &composer)
    })
    .await
    .context("Validation task panicked")??;

    print!("{}", output.format_report(&report, &artifact.path));

    if config.output.open_report
        && let Err(err) = open_in_viewer(&artifact.path)
    {
        tracing::warn!("could not open {}: {}", artifact.path.display(), err);
    }

    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID)
    })
}
