//! Run one Claude Code turn from the terminal
//!
//! Ctrl-C mid-turn records the interruption; the next invocation resumes the
//! conversation before (or instead of) running a new prompt.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use claude_session::{FileRecoveryStore, LogKind, SessionEvent, SessionManager, SessionOptions};

#[derive(Parser, Debug)]
#[command(name = "claude-session")]
#[command(about = "Drive a streaming Claude Code CLI session")]
#[command(version)]
struct Args {
    /// Prompt for a new turn
    prompt: Option<String>,

    /// Path to the claude executable
    #[arg(long)]
    cli_path: Option<PathBuf>,

    /// Project root the CLI runs in
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Turn cap passed to the CLI
    #[arg(long, default_value_t = 25)]
    max_turns: u32,

    /// Kill the CLI after this many seconds without stdout (0 disables)
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Directory holding the recovery file
    #[arg(long, default_value = ".claude-session")]
    state_dir: PathBuf,

    /// Do not resume an interrupted session automatically
    #[arg(long)]
    no_auto_resume: bool,
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut builder = SessionOptions::builder()
        .max_turns(args.max_turns)
        .inactivity_timeout(Duration::from_secs(args.timeout_secs))
        .auto_resume(!args.no_auto_resume);
    if let Some(path) = args.cli_path {
        builder = builder.cli_path(path);
    }
    if let Some(cwd) = args.cwd {
        builder = builder.cwd(cwd);
    }
    let options = builder.build()?;

    let store = Arc::new(FileRecoveryStore::in_dir(&args.state_dir)?);
    let mut manager = SessionManager::new(options, store)?;

    let mut pending_prompt = args.prompt;
    if !manager.initialize()? {
        match pending_prompt.take() {
            Some(prompt) => manager.launch(&prompt, None)?,
            None => {
                print_events(manager.poll());
                eprintln!("Nothing to do: no prompt given and no interrupted session");
                return Ok(());
            }
        }
    }

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_events(manager.poll());
                if manager.phase().is_running() || manager.has_process() {
                    continue;
                }
                // A resumed turn finished; run the prompt given on this invocation.
                match pending_prompt.take() {
                    Some(prompt) => manager.send(&prompt)?,
                    None => break,
                }
            }
            _ = &mut ctrl_c => {
                eprintln!("Interrupted");
                manager.on_teardown()?;
                print_events(manager.poll());
                break;
            }
        }
    }

    Ok(())
}

fn print_events(events: Vec<SessionEvent>) {
    for event in events {
        match event {
            SessionEvent::Log(entry) => match entry.kind {
                LogKind::Assistant => println!("{}", entry.text),
                LogKind::User => println!("> {}", entry.text),
                LogKind::Status => eprintln!("[{}] {}", entry.at.format("%H:%M:%S"), entry.text),
                LogKind::Error => eprintln!("[{}] error: {}", entry.at.format("%H:%M:%S"), entry.text),
            },
            SessionEvent::PhaseChanged(phase) => log::info!("phase: {phase}"),
            SessionEvent::SessionIdChanged(id) => eprintln!("session: {id}"),
            SessionEvent::Completed => {}
        }
    }
}
