use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use satseg_client::config::{ClientConfig, TransportKind};
use satseg_client::logging::{LogFacade, init_logging};
use satseg_client::models::ProcessingStatus;
use satseg_client::pipeline::Pipeline;
use satseg_client::server_images::image_name_from_url;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "satseg-client", version, about = "Upload satellite images and run correction and cloud segmentation")]
struct Cli {
    /// Base URL of the upload/segmentation/listing service
    #[arg(long, env = "SATSEG_MAIN_SERVICE_URL", default_value = "http://localhost:8000")]
    main_service_url: String,

    /// Base URL of the correction service
    #[arg(long, env = "SATSEG_CORRECTION_SERVICE_URL", default_value = "http://localhost:8080")]
    correction_service_url: String,

    #[arg(long, value_enum, env = "SATSEG_TRANSPORT", default_value_t = TransportKind::Http)]
    transport: TransportKind,

    #[arg(long, env = "SATSEG_MOCK_DELAY_MS", default_value_t = 1000)]
    mock_delay_ms: u64,

    /// Per-request timeout in seconds; waits forever when unset
    #[arg(long, env = "SATSEG_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    #[arg(long, env = "SATSEG_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the local control API
    Serve {
        #[arg(long, env = "SATSEG_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "SATSEG_PORT", default_value_t = 5173)]
        port: u16,
        #[arg(long, env = "SATSEG_MAX_UPLOAD_BYTES", default_value_t = 64 * 1024 * 1024)]
        max_upload_bytes: usize,
    },
    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands that run once against the backends and exit.
#[derive(Debug, Subcommand)]
enum ClientCommand {
    /// Run one image through upload, correction and segmentation
    Process {
        /// Local image file
        #[arg(long, conflicts_with_all = ["url", "last"])]
        file: Option<PathBuf>,
        /// Image already on the server
        #[arg(long, conflicts_with = "last")]
        url: Option<String>,
        /// Newest image from the satellite
        #[arg(long)]
        last: bool,
    },
    /// Print the URL of the newest satellite image
    LastImage,
    /// List processed images on the server, oldest first
    List,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            main_service_url: self.main_service_url.clone(),
            correction_service_url: self.correction_service_url.clone(),
            transport: self.transport,
            mock_delay_ms: self.mock_delay_ms,
            request_timeout_secs: self.request_timeout_secs,
            log_level: self.log_level.clone(),
            ..ClientConfig::default()
        };
        if let Command::Serve {
            host,
            port,
            max_upload_bytes,
        } = &self.command
        {
            config.host = host.clone();
            config.port = *port;
            config.max_upload_bytes = *max_upload_bytes;
        }
        config
    }
}

async fn run_command(command: ClientCommand, pipeline: Pipeline) -> anyhow::Result<()> {
    match command {
        ClientCommand::Process { file, url, last } => {
            if let Some(path) = file {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("image path has no file name")?;
                pipeline.select_local_file(&name, bytes.into()).await;
            } else if let Some(url) = url {
                pipeline.select_server_image(&url).await;
            } else if last {
                if !pipeline.fetch_last_image().await? {
                    bail!("correction service returned no image");
                }
            } else {
                bail!("one of --file, --url or --last is required");
            }

            let snapshot = pipeline.process_current_image().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            if snapshot.status == ProcessingStatus::Error {
                bail!(
                    "{}",
                    snapshot
                        .last_error
                        .unwrap_or_else(|| snapshot.status_text.clone())
                );
            }
        }
        ClientCommand::LastImage => {
            if !pipeline.fetch_last_image().await? {
                bail!("correction service returned no image");
            }
            let snapshot = pipeline.snapshot().await;
            println!("{}", snapshot.uploaded_image_url.unwrap_or_default());
        }
        ClientCommand::List => {
            let list = pipeline.load_server_images().await?;
            if list.images.is_empty() {
                println!("Nothing here yet");
            }
            let name = |url: &Option<String>| {
                url.as_deref()
                    .map(image_name_from_url)
                    .unwrap_or("null")
                    .to_string()
            };
            for (i, image) in list.images.iter().enumerate() {
                println!(
                    "{} {} | {} | {}",
                    i + 1,
                    image_name_from_url(&image.normal_url),
                    name(&image.corrected_url),
                    name(&image.processed_url)
                );
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = cli.config();

    let command = match cli.command {
        Command::Serve { .. } => return satseg_client::start(config),
        Command::Client(command) => command,
    };

    let config = config.validated()?;
    init_logging(config.log_level_filter()?);
    let pipeline = Pipeline::from_config(&config, Arc::new(LogFacade))?;
    actix_web::rt::System::new().block_on(run_command(command, pipeline))
}
