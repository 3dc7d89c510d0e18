use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use videogen::{
    GenerationForm, GenerationRequest, HttpJobClient, JobController, JobStatus, Notice,
    RemoteJobService, ServiceConfig, SubmissionGate, TaskId,
};

#[derive(Parser)]
#[command(name = "videogen-cli")]
#[command(about = "Video generation client - submit jobs and track them to completion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the generation service
    #[arg(
        long,
        global = true,
        env = "VIDEOGEN_BASE_URL",
        default_value = videogen::config::DEFAULT_BASE_URL
    )]
    base_url: String,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a generation job and follow it until it finishes
    Generate {
        /// Topic to generate the video about
        topic: String,

        /// Number of images to generate
        #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=10))]
        num_images: u32,

        /// Narration language (en, it, es, fr, de)
        #[arg(long, default_value = "en")]
        language: String,

        /// Text model (0 = GPT-4, 1 = GPT-3.5)
        #[arg(long, default_value = "0")]
        text_model: u32,

        /// Image model (0 = DALL-E 2, 1 = DALL-E 3)
        #[arg(long, default_value = "1")]
        image_model: u32,

        /// Target length (0 = 30s, 1 = 1min, 2 = 4min)
        #[arg(long, default_value = "1")]
        video_length: u32,

        /// Personal OpenAI API key; the server's key is used when omitted
        #[arg(long, env = "VIDEOGEN_OPENAI_KEY")]
        openai_key: Option<String>,

        /// Skip the pre-generation web search
        #[arg(long)]
        no_web_search: bool,

        /// Access key checked by the client-side gate
        #[arg(long, env = "VIDEOGEN_ACCESS_KEY", default_value = "")]
        access_key: String,

        /// Expected gate secret; the gate is disabled when unset
        #[arg(long, env = "VIDEOGEN_ACCESS_SECRET")]
        access_secret: Option<String>,

        /// Where to write the finished video (default video_<task_id>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave the finished video on the server
        #[arg(long)]
        no_download: bool,
    },

    /// Print the current status of a task
    Status {
        /// Task identifier returned at submission
        task_id: String,
    },

    /// Download a completed video
    Download {
        /// Task identifier returned at submission
        task_id: String,

        /// Where to write the video (default video_<task_id>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = ServiceConfig::new(cli.base_url.clone());

    match cli.command {
        Commands::Generate {
            topic,
            num_images,
            language,
            text_model,
            image_model,
            video_length,
            openai_key,
            no_web_search,
            access_key,
            access_secret,
            output,
            no_download,
        } => {
            let request = GenerationRequest {
                topic,
                num_images,
                language,
                text_model,
                image_model,
                video_length,
                openai_key,
                use_web_search: !no_web_search,
            };
            let config = match access_secret {
                Some(secret) => config.with_access_secret(secret),
                None => config,
            };
            generate_command(config, request, access_key, output, no_download).await
        }
        Commands::Status { task_id } => status_command(config, task_id).await,
        Commands::Download { task_id, output } => download_command(config, task_id, output).await,
    }
}

async fn generate_command(
    config: ServiceConfig,
    request: GenerationRequest,
    access_key: String,
    output: Option<PathBuf>,
    no_download: bool,
) -> Result<()> {
    let service = Arc::new(HttpJobClient::new(&config));
    let gate = SubmissionGate::new(config.access_secret.clone());
    let (controller, mut notices) = JobController::new(service, gate, config.poll_interval);

    info!("Submitting generation request to {}", config.base_url);
    if let Err(err) = controller
        .submit(GenerationForm::new(request, access_key))
        .await
    {
        bail!("{err}");
    }

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .context("progress template")?
            .progress_chars("=>-"),
    );

    // Render controller snapshots until the job settles.
    let job = loop {
        while let Ok(notice) = notices.try_recv() {
            match notice {
                Notice::Info(msg) => info!("{msg}"),
                Notice::Error(msg) => warn!("{msg}"),
            }
        }

        let state = controller.snapshot();
        if let Some(job) = state.job {
            bar.set_position(job.progress.clamp(0.0, 100.0) as u64);
            let label = match job.status {
                JobStatus::Submitting => "submitting".to_string(),
                JobStatus::Queued => "queued".to_string(),
                JobStatus::Processing if !job.current_step.is_empty() => job.current_step.clone(),
                JobStatus::Processing => "processing".to_string(),
                JobStatus::Completed | JobStatus::Failed | JobStatus::Idle => String::new(),
            };
            bar.set_message(label);
            if job.status.is_terminal() {
                break job;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    if job.status == JobStatus::Failed {
        bar.abandon_with_message("failed");
        bail!(
            "video generation failed: {}",
            job.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    bar.finish_with_message("completed");
    let task_id = job.task_id.clone().context("completed job has a task id")?;
    info!("Video generation completed for task {task_id}");

    if no_download {
        println!("{task_id}");
        return Ok(());
    }

    let download = controller
        .download()
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    let path = output.unwrap_or_else(|| PathBuf::from(&download.file_name));
    std::fs::write(&path, &download.bytes)
        .with_context(|| format!("write video to {}", path.display()))?;
    info!("Saved {} bytes to {}", download.bytes.len(), path.display());
    Ok(())
}

async fn status_command(config: ServiceConfig, task_id: String) -> Result<()> {
    let service = HttpJobClient::new(&config);
    let response = service
        .poll(&TaskId(task_id))
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    println!("status:   {:?}", response.status);
    if let Some(step) = response.current_step {
        println!("step:     {step}");
    }
    if let Some(progress) = response.progress {
        println!("progress: {progress}%");
    }
    if let Some(error) = response.error {
        println!("error:    {error}");
    }
    Ok(())
}

async fn download_command(
    config: ServiceConfig,
    task_id: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let service = HttpJobClient::new(&config);
    let task_id = TaskId(task_id);
    let bytes = service
        .download(&task_id)
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    let path = output.unwrap_or_else(|| PathBuf::from(videogen::artifact_file_name(&task_id)));
    std::fs::write(&path, &bytes).with_context(|| format!("write video to {}", path.display()))?;
    info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
