use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acdbot::clients::{
    build_http_client, CalendarClient, DiscourseClient, GithubClient, TelegramClient,
    YoutubeClient, ZoomClient,
};
use acdbot::config::AppConfig;
use acdbot::parse_schedule;
use acdbot::workflow::{IssueWorkflow, MeetingOutcome, RecordingWorkflow};

#[derive(Parser)]
#[command(name = "acdbot")]
#[command(about = "Schedules protocol calls from GitHub issues and follows up on their recordings")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the forum topic and meeting for an issue
    HandleIssue {
        #[arg(long)]
        issue_number: u64,

        /// Repository as owner/name (default: from config)
        #[arg(long)]
        repo: Option<String>,
    },

    /// Post transcripts (and upload recordings) for finished meetings
    PollRecordings {
        /// Process this meeting now, ignoring the eligibility delay
        #[arg(long)]
        force_meeting_id: Option<String>,
    },

    /// Post one meeting's transcript to the forum
    PostTranscript {
        #[arg(long)]
        meeting_id: String,
    },

    /// Upload one meeting's recording to YouTube
    UploadRecording {
        #[arg(long)]
        meeting_id: String,
    },

    /// Parse an issue body and print the schedule as JSON
    ParseIssue {
        /// File containing the issue body (default: stdin)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(Some(&cli.config))
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    info!("Starting acdbot v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::HandleIssue { issue_number, repo } => {
            handle_issue(&config, issue_number, repo).await?;
        }

        Commands::PollRecordings { force_meeting_id } => {
            let workflow = recording_workflow(&config)?;
            let summary = workflow
                .poll_recordings(Utc::now(), force_meeting_id.as_deref())
                .await
                .context("Polling recordings failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::PostTranscript { meeting_id } => {
            let workflow = recording_workflow(&config)?;
            let outcome = workflow
                .post_transcript(&meeting_id)
                .await
                .with_context(|| format!("Failed to post transcript for meeting {}", meeting_id))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::UploadRecording { meeting_id } => {
            config.youtube()?;
            let workflow = recording_workflow(&config)?;
            let outcome = workflow
                .upload_recording(&meeting_id)
                .await
                .with_context(|| format!("Failed to upload recording for meeting {}", meeting_id))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::ParseIssue { path } => {
            let body = read_body(path.as_deref())?;
            match parse_schedule(&body) {
                Ok(schedule) => println!("{}", serde_json::to_string_pretty(&schedule)?),
                Err(e) => {
                    let out = json!({ "error": e.kind(), "detail": e.detail() });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

async fn handle_issue(config: &AppConfig, issue_number: u64, repo: Option<String>) -> Result<()> {
    let github = config.github()?;
    let zoom = config.zoom()?;
    let discourse = config.discourse()?;
    let http = build_http_client(&config.http)?;

    let mut issues = GithubClient::new(http.clone(), github);
    if let Some(repo) = repo {
        issues = issues.with_repo(repo);
    }

    let mut workflow = IssueWorkflow::new(
        Arc::new(issues),
        Arc::new(ZoomClient::new(http.clone(), zoom)),
        Arc::new(DiscourseClient::new(http.clone(), discourse)),
        discourse.category_id,
        config.mapping_file.clone(),
    );
    if let Some(calendar) = &config.calendar {
        workflow = workflow.with_calendar(Arc::new(CalendarClient::new(http.clone(), calendar)));
    }
    if let Some(telegram) = &config.telegram {
        workflow = workflow.with_chat(Arc::new(TelegramClient::new(http.clone(), telegram)));
    }

    let outcome = workflow
        .handle_issue(issue_number)
        .await
        .with_context(|| format!("Failed to handle issue #{}", issue_number))?;

    info!(
        "Issue #{} -> topic {}{}",
        outcome.issue_number,
        outcome.topic_id,
        if outcome.topic_created { " (new)" } else { "" }
    );
    match &outcome.meeting {
        MeetingOutcome::Created { meeting_id, join_url } => {
            info!("Created meeting {} ({})", meeting_id, join_url)
        }
        MeetingOutcome::AlreadyScheduled { meeting_id } => {
            info!("Meeting {} already scheduled", meeting_id)
        }
        MeetingOutcome::InvalidSchedule(e) => info!("No meeting created: {}", e),
        MeetingOutcome::Failed(e) => anyhow::bail!("Meeting creation failed: {}", e),
    }
    Ok(())
}

fn recording_workflow(config: &AppConfig) -> Result<RecordingWorkflow> {
    let zoom = config.zoom()?;
    let discourse = config.discourse()?;
    let http = build_http_client(&config.http)?;
    let transfer_timeout = Duration::from_secs(config.http.transfer_timeout_seconds);

    let workflow = RecordingWorkflow::new(
        Arc::new(ZoomClient::new(http.clone(), zoom).with_transfer_timeout(transfer_timeout)),
        Arc::new(DiscourseClient::new(http.clone(), discourse)),
        discourse.category_id,
        config.mapping_file.clone(),
        config.recordings_dir(),
        config.polling.clone(),
    );
    Ok(match &config.youtube {
        Some(youtube) => workflow.with_videos(Arc::new(
            YoutubeClient::new(http, youtube).with_transfer_timeout(transfer_timeout),
        )),
        None => workflow,
    })
}

fn read_body(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read issue body from {:?}", path)),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read issue body from stdin")?;
            Ok(body)
        }
    }
}
