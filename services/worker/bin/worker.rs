//! Main Entrypoint for the Govi Voice Agent Worker
//!
//! This binary is responsible for:
//! 1. Loading and validating configuration from the environment.
//! 2. Initializing logging.
//! 3. Loading prompt assets and assembling the agent definition.
//! 4. Constructing the collaborator implementations (room transport,
//!    realtime model provider, conversation runtime).
//! 5. Running one job to the conversing state and holding it until the
//!    process is told to stop.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use govi_core::{
    agent::OpeningTurn,
    job::{JobContext, run_job},
};
use govi_worker::{
    config::WorkerConfig,
    prompts::{self, GREETING},
    provider::OpenAiRealtimeProvider,
    room::SignalRoomConnector,
    session::RealtimeSessionRuntime,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "govi-worker",
    about = "Voice agent worker that joins a room and converses on behalf of GovLab"
)]
struct Cli {
    /// Room this worker is assigned to.
    #[arg(long)]
    room: String,

    /// Participant identity the agent joins under.
    #[arg(long, default_value = "govi-agent")]
    identity: String,

    /// How the agent produces its opening turn.
    #[arg(long, value_enum, default_value_t = OpeningMode::Scripted)]
    opening: OpeningMode,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OpeningMode {
    /// Speak the scripted greeting.
    Scripted,
    /// Let the model compose its own greeting from the seed context.
    Generated,
}

/// Listens for the `Ctrl+C` signal to end the job.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Ending the job...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Preparing job...");

    // --- 3. Agent Definition ---
    let prompts = prompts::load_prompts(&config.prompts_path)?;
    let opening_turn = match cli.opening {
        OpeningMode::Scripted => OpeningTurn::Scripted {
            text: GREETING.to_string(),
            allow_interruptions: true,
        },
        OpeningMode::Generated => OpeningTurn::GeneratedReply,
    };
    let definition = prompts::govi_definition(&prompts, &config, opening_turn)?;

    // --- 4. Collaborators ---
    let connector = SignalRoomConnector::new(
        config.room_server_url.clone(),
        config.room_api_key.clone(),
        config.room_api_secret.clone(),
        cli.identity,
    );
    let provider = OpenAiRealtimeProvider::new(config.openai_api_key.clone());
    let runtime = RealtimeSessionRuntime;

    // --- 5. Run the Job ---
    let mut ctx = JobContext::new(cli.room);
    info!(job_id = %ctx.job_id(), room = %ctx.room_name(), "starting job");
    let _session = run_job(&mut ctx, &definition, &connector, &provider, &runtime)
        .await
        .context("job did not reach the conversing state")?;

    // The conversation now runs on its own tasks; hold the session alive
    // until the host asks the worker to stop. Dropping it tears down the
    // bridge tasks and the model session.
    shutdown_signal().await;
    info!("Job ended.");
    Ok(())
}
