mod render;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tailtrace_engine::reconstruct_teams;
use tailtrace_runtime::{
    SessionWatcher, discover_project_sessions, load_subagents, read_session,
};

/// Timeline viewer for AI coding assistant session transcripts.
#[derive(Parser, Debug)]
#[command(name = "tailtrace", version, about)]
pub struct Cli {
    /// Session transcript to open. Defaults to the most recent session of
    /// the current project.
    pub session_file: Option<PathBuf>,

    /// Render the session once and exit
    #[arg(long)]
    pub dump: bool,

    /// Show full message bodies instead of previews
    #[arg(long)]
    pub expand: bool,

    /// Projects root directory (default: ~/.claude/projects)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    init_tracing();

    let path = resolve_session(&cli)?;
    let mut chunks =
        read_session(&path).with_context(|| format!("failed to load {}", path.display()))?;
    if chunks.is_empty() {
        bail!("no renderable content in {}", path.display());
    }

    let (processes, _colors) = match load_subagents(&path, &mut chunks) {
        Ok(loaded) => loaded,
        Err(err) => {
            tracing::warn!(error = %err, "sub-agent discovery failed, continuing without links");
            (Vec::new(), HashMap::new())
        }
    };

    let renderer = render::Renderer::new(cli.expand);
    renderer.render_chunks(&chunks);
    renderer.render_subagents(&processes);
    renderer.render_teams(&reconstruct_teams(&chunks, &processes));

    if cli.dump {
        return Ok(());
    }

    tail(&path, &renderer, chunks.len())
}

/// Follow the session, printing chunks as the watcher publishes snapshots.
fn tail(path: &Path, renderer: &render::Renderer, mut rendered: usize) -> anyhow::Result<()> {
    let watcher = SessionWatcher::new(path.to_path_buf())?;
    loop {
        match watcher.updates().recv_timeout(Duration::from_millis(500)) {
            Ok(update) => {
                if update.chunks.len() < rendered {
                    // Rotation: start the rendering over.
                    rendered = 0;
                }
                renderer.render_chunks(&update.chunks[rendered..]);
                rendered = update.chunks.len();
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
        }
        for err in watcher.errors().try_iter() {
            eprintln!("watch error: {err}");
        }
    }
}

fn resolve_session(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = &cli.session_file {
        if !path.is_file() {
            bail!("session file not found: {}", path.display());
        }
        return Ok(path.clone());
    }

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => dirs::home_dir()
            .context("cannot resolve home directory")?
            .join(".claude")
            .join("projects"),
    };
    let cwd = std::env::current_dir()?;
    let project_dir = root.join(encode_project_dir(&cwd));
    let sessions = discover_project_sessions(&project_dir)
        .with_context(|| format!("failed to list sessions under {}", project_dir.display()))?;
    sessions
        .first()
        .map(|s| s.path.clone())
        .with_context(|| format!("no sessions found under {}", project_dir.display()))
}

/// Project paths are encoded with `/` and `.` mapped to `-`, keeping the
/// leading separator: `/Users/foo/bar.app` becomes `-Users-foo-bar-app`.
fn encode_project_dir(path: &Path) -> String {
    let encoded = path.to_string_lossy().replace(['/', '.'], "-");
    format!("-{}", encoded.trim_start_matches('-'))
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
