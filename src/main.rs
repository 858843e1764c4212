use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine as _;
use clap::{Arg, Command};
use dumu::backend::http::{cli as http_cli, HttpBackend};
use dumu::backend::Collaborators;
use dumu::engine::events::JobEvent;
use dumu::engine::model::{AudioInput, JobStatus, LogOrigin};
use dumu::engine::JobOrchestrator;
use dumu::i18n::{get_messages, Locale, Messages};
use indicatif::{ProgressBar, ProgressStyle};
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT_NAME: &str = "dumu_output.mid";

fn build_cli() -> Command {
    let extract = Command::new("extract")
        .about("Upload a track, follow the extraction live and save the bass line as MIDI")
        .arg(
            Arg::new("file")
                .help("Audio file to upload")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Directory the MIDI file is written to")
                .default_value("./output")
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("Output language (en, zh)")
                .default_value("en")
                .num_args(1),
        );

    let extract = http_cli::augment_command(extract);

    Command::new("dumu")
        .about("Bass-to-MIDI extraction client")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(extract)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("extract", m)) => {
            let file: PathBuf = m.get_one::<String>("file").context("missing file")?.into();
            let out_dir: PathBuf = m.get_one::<String>("out_dir").context("missing out dir")?.into();
            let msgs = get_messages(Locale::from_tag(
                m.get_one::<String>("locale").map(String::as_str).unwrap_or("en"),
            ));
            let ctx = http_cli::context_from_matches(m)?;

            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload.bin".to_string());

            let backend = Arc::new(HttpBackend::new(ctx)?);
            let orchestrator = JobOrchestrator::new(Collaborators::from_backend(backend));

            let ui_task = tokio::spawn(render(orchestrator.subscribe(), msgs));

            orchestrator.start(AudioInput::new(filename, data)).await;

            let status = tokio::select! {
                s = orchestrator.wait_terminal() => s,
                _ = tokio::signal::ctrl_c() => {
                    orchestrator.reset().await;
                    ui_task.abort();
                    anyhow::bail!("interrupted");
                }
            };
            let _ = ui_task.await;

            let snapshot = orchestrator.snapshot().await;
            match (status, snapshot.result, snapshot.error) {
                (JobStatus::Done, Some(result), _) => {
                    let path = save_midi(&out_dir, &result.filename, &result.encoded_artifact).await?;
                    println!("{}: {}", msgs.bpm_label, result.bpm);
                    println!("{} {}", msgs.saved_to, path.display());
                }
                (_, _, Some(error)) => anyhow::bail!("{}", error.message),
                (other, _, _) => anyhow::bail!("job ended in unexpected state {:?}", other),
            }
        }
        _ => {}
    }

    Ok(())
}

async fn render(mut rx: tokio::sync::broadcast::Receiver<JobEvent>, msgs: &'static Messages) {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner:.green} {prefix} {bar:40.cyan/blue} {pos:>3}% {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("|/-\\ ");
    pb.set_style(style);
    pb.set_prefix("[dumu]");
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        match evt {
            JobEvent::StatusChanged { status } => pb.set_message(msgs.status(status).to_string()),
            JobEvent::Accepted { job_id } => {
                pb.println(format!("[{}] {}: {}", msgs.job_prefix, msgs.job_accepted, job_id));
            }
            JobEvent::Progress { progress } => pb.set_position(progress.clamp(0, 100) as u64),
            JobEvent::Log(line) => match line.origin {
                LogOrigin::Local => pb.println(line.text),
                LogOrigin::Stream => pb.println(format!("  {}", line.text)),
            },
            JobEvent::Completed { .. } => {
                pb.finish_with_message(msgs.done.to_string());
                break;
            }
            JobEvent::Failed(record) => {
                pb.abandon_with_message(format!("[{}] {}", msgs.error_prefix, record.message));
                break;
            }
            JobEvent::Reset => {}
        }
    }
}

async fn save_midi(out_dir: &Path, filename: &str, encoded: &str) -> anyhow::Result<PathBuf> {
    let bytes = BASE64_ENGINE
        .decode(encoded.trim())
        .context("decode MIDI payload")?;

    let name = sanitize(filename);
    let name = if name.is_empty() { DEFAULT_OUTPUT_NAME.to_string() } else { name };
    let path = out_dir.join(name);

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("create out_dir {}", out_dir.display()))?;
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
