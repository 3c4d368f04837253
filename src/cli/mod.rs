pub mod documents;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::daemon::{self, ServeOptions};
use crate::models::RelayConfig;

/// BMN document relay - forwards form submissions to the document pipeline
/// and tracks generated documents
#[derive(Parser, Debug)]
#[command(
    name = "bmn-docgen",
    version,
    about = "BMN document relay - forwards form submissions to the document pipeline and tracks generated documents"
)]
pub struct Cli {
    /// Relay host
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Relay port
    #[arg(long, default_value_t = 3000, global = true)]
    pub port: u16,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,

        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short = 'p', long = "listen-port")]
        listen_port: Option<u16>,

        /// Pipeline webhook address (overrides N8N_WEBHOOK_URL)
        #[arg(long = "pipeline-url")]
        pipeline_url: Option<String>,

        /// Public base address used to build the callback URL
        #[arg(long = "public-base-url")]
        public_base_url: Option<String>,
    },

    /// Submit a document-generation job
    Submit {
        /// Category used to generate the job id (e.g. psp, penjualan)
        #[arg(long)]
        category: Option<String>,

        /// Explicit job id (generated when omitted)
        #[arg(long = "job-id")]
        job_id: Option<String>,

        /// Form fields (KEY=VALUE)
        #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
        field: Vec<String>,

        /// JSON file holding the form data; --field entries are merged on top
        #[arg(long = "form-json")]
        form_json: Option<PathBuf>,

        /// Poll until the document is ready
        #[arg(short = 'w', long)]
        wait: bool,

        /// Poll interval in milliseconds (defaults to pollIntervalMs from the config file)
        #[arg(long = "interval-ms", value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },

    /// Show the status of a job
    Status {
        /// Job id
        job: String,
    },

    /// List every document the relay knows about
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll jobs until each one completes or fails
    Watch {
        /// Job ids
        #[arg(required = true)]
        jobs: Vec<String>,

        /// Poll interval in milliseconds (defaults to pollIntervalMs from the config file)
        #[arg(long = "interval-ms", value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },

    /// Send a test message to the pipeline webhook
    Ping,

    /// Simulate a successful pipeline callback
    TestCallback {
        /// Job id (generated when omitted)
        job: Option<String>,
    },
}

/// Build the base URL for the relay HTTP API.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Parse form field arguments from "KEY=VALUE" format into a JSON object.
pub fn parse_form_fields(
    fields: &[String],
) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    let mut map = serde_json::Map::new();
    for arg in fields {
        if let Some((key, value)) = arg.split_once('=') {
            if key.is_empty() {
                return Err(format!("Invalid form field: '{}'", arg));
            }
            map.insert(
                key.to_string(),
                serde_json::Value::String(value.to_string()),
            );
        } else {
            return Err(format!(
                "Invalid form field format: '{}'. Expected KEY=VALUE",
                arg
            ));
        }
    }
    Ok(map)
}

/// Poll interval for `submit --wait` and `watch`: the flag when given,
/// otherwise `pollIntervalMs` from the loaded config.
pub fn poll_interval(
    interval_ms: Option<u64>,
    load_config: impl FnOnce() -> anyhow::Result<RelayConfig>,
) -> anyhow::Result<Duration> {
    match interval_ms {
        Some(ms) => Ok(Duration::from_millis(ms.max(1))),
        None => Ok(load_config()?.poll_interval()),
    }
}

/// Format a connection error message for when the relay is not reachable.
pub fn connection_error_message(host: &str, port: u16) -> String {
    format!(
        "Could not connect to relay at {}:{}. Is it running? (try: bmn-docgen serve)",
        host, port
    )
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Serve {
            config,
            bind,
            listen_port,
            pipeline_url,
            public_base_url,
        }) => {
            daemon::start_server(ServeOptions {
                config_path: config.clone(),
                host: bind.clone(),
                port: *listen_port,
                pipeline_url: pipeline_url.clone(),
                public_base_url: public_base_url.clone(),
            })
            .await
        }
        Some(Commands::Submit {
            category,
            job_id,
            field,
            form_json,
            wait,
            interval_ms,
        }) => {
            documents::cmd_submit(
                &cli.host,
                cli.port,
                category.as_deref(),
                job_id.as_deref(),
                field,
                form_json.as_deref(),
                *wait,
                *interval_ms,
            )
            .await
        }
        Some(Commands::Status { job }) => documents::cmd_status(&cli.host, cli.port, job).await,
        Some(Commands::List { json }) => documents::cmd_list(&cli.host, cli.port, *json).await,
        Some(Commands::Watch { jobs, interval_ms }) => {
            let interval = poll_interval(*interval_ms, || daemon::load_config(None))?;
            documents::cmd_watch(&cli.host, cli.port, jobs, interval).await
        }
        Some(Commands::Ping) => documents::cmd_ping(&cli.host, cli.port).await,
        Some(Commands::TestCallback { job }) => {
            documents::cmd_test_callback(&cli.host, cli.port, job.as_deref()).await
        }
        None => {
            // No subcommand provided -- print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
