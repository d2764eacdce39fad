// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Application entry point.
//!
//! This module:
//! - parses CLI args (`pad`, `view`, `ratios`)
//! - pads batches of images in parallel
//! - runs the viewer input loop (keys + mouse mapped to viewer events)
//! - sends status updates to `TerminalWriter`
//!
//! Terminal output is centralized in `TerminalWriter` (see `src/sender.rs`).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind},
    terminal,
};
use ratatui::layout::Rect;
use rayon::prelude::*;

use photoshoot::app::{App, is_tmux_env};
use photoshoot::compose;
use photoshoot::config::Config;
use photoshoot::logging::{LogTarget, init_logging};
use photoshoot::picture::Picture;
use photoshoot::ratio::{AspectRatio, PRESETS};
use photoshoot::sender::StatusIndicator;
use photoshoot::viewer::{Point, ViewerEvent};

#[derive(Parser, Debug)]
#[command(
    name = "photoshoot",
    version,
    about = "Aspect-ratio padding and a compare/zoom viewer for photoshoot results"
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Letterbox/pillarbox images onto a black canvas of the given aspect ratio
    Pad {
        /// Image file(s) or `data:` URL(s)
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Target ratio as W:H
        #[arg(short, long)]
        ratio: AspectRatio,
        /// Output directory (defaults to each input's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Print the padded image as a data URL instead of writing a file
        #[arg(long)]
        stdout_data_url: bool,
    },
    /// Open results fullscreen with zoom, pan and compare
    View {
        /// Result image file(s) and/or directory path(s)
        #[arg(required = true)]
        results: Vec<PathBuf>,
        /// Source image to compare against
        #[arg(long)]
        original: Option<PathBuf>,
    },
    /// List the preset aspect ratios
    Ratios,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Command::Pad {
            inputs,
            ratio,
            out_dir,
            stdout_data_url,
        } => {
            let _guard = init_logging(LogTarget::Stderr, &config.log_level, cli.verbose);
            run_pad(&inputs, ratio, out_dir.as_deref(), stdout_data_url, &config)
        }
        Command::View { results, original } => {
            let _guard = init_logging(LogTarget::File, &config.log_level, cli.verbose);
            run_view(&results, original, config)
        }
        Command::Ratios => {
            for (ratio, label) in PRESETS {
                println!("{ratio}\t{label}");
            }
            Ok(())
        }
    }
}

fn load_input(input: &str) -> photoshoot::Result<Picture> {
    if input.starts_with("data:") {
        Picture::from_data_url(input)
    } else {
        Picture::open(Path::new(input))
    }
}

/// `<stem>-<W>x<H>.png`, next to the input unless `out_dir` is given.
fn output_path(input: &str, index: usize, ratio: AspectRatio, out_dir: Option<&Path>) -> PathBuf {
    let name_for = |stem: &str| format!("{stem}-{}x{}.png", ratio.w(), ratio.h());
    if input.starts_with("data:") {
        let name = name_for(&format!("image-{}", index + 1));
        return out_dir.map_or_else(|| PathBuf::from(&name), |dir| dir.join(&name));
    }
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(name_for(&stem))
}

fn pad_one(input: &str, ratio: AspectRatio, max_pixels: u64) -> Result<Picture> {
    let picture = load_input(input)?;
    let padded = compose::pad_with_limit(&picture, ratio, max_pixels)?;
    tracing::debug!(
        from = ?picture.dimensions(),
        to = ?padded.dimensions(),
        "padded {}",
        display_input(input)
    );
    Ok(padded)
}

fn display_input(input: &str) -> &str {
    const MAX: usize = 32;
    if input.starts_with("data:") {
        input.get(..MAX).unwrap_or(input)
    } else {
        input
    }
}

fn run_pad(
    inputs: &[String],
    ratio: AspectRatio,
    out_dir: Option<&Path>,
    stdout_data_url: bool,
    config: &Config,
) -> Result<()> {
    if stdout_data_url {
        let [input] = inputs else {
            anyhow::bail!("--stdout-data-url takes exactly one input");
        };
        let padded = pad_one(input, ratio, config.max_canvas_pixels)
            .with_context(|| format!("padding {}", display_input(input)))?;
        println!("{}", padded.to_data_url());
        return Ok(());
    }

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let outcomes: Vec<Result<PathBuf>> = inputs
        .par_iter()
        .enumerate()
        .map(|(index, input)| {
            let padded = pad_one(input, ratio, config.max_canvas_pixels)?;
            let path = output_path(input, index, ratio, out_dir);
            std::fs::write(&path, padded.bytes())
                .with_context(|| format!("writing {}", path.display()))?;
            Ok(path)
        })
        .collect();

    let mut failed = 0usize;
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                failed += 1;
                tracing::error!("{}: {e:#}", display_input(input));
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} inputs failed", inputs.len());
    }
    Ok(())
}

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_images_from_path(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if is_image_file(path) {
            return Ok(vec![path.to_path_buf()]);
        } else {
            anyhow::bail!("Not a supported image file: {:?}", path);
        }
    }

    if path.is_dir() {
        let mut images: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        images.sort();
        if images.is_empty() {
            anyhow::bail!("No image files found in directory: {:?}", path);
        }
        return Ok(images);
    }

    anyhow::bail!("Path does not exist: {:?}", path);
}

fn collect_images(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out: Vec<PathBuf> = Vec::new();
    for p in paths {
        out.extend(collect_images_from_path(p)?);
    }
    let mut seen = std::collections::HashSet::<PathBuf>::new();
    out.retain(|p| seen.insert(p.clone()));
    if out.is_empty() {
        anyhow::bail!("No image files found");
    }
    Ok(out)
}

fn use_alt_screen(config: &Config) -> bool {
    config.force_alt_screen || (!config.no_alt_screen && !is_tmux_env())
}

fn run_view(results: &[PathBuf], original: Option<PathBuf>, config: Config) -> Result<()> {
    let results = collect_images(results)?;
    if let Some(original) = &original
        && !(original.is_file() && is_image_file(original))
    {
        anyhow::bail!("Not a supported image file: {:?}", original);
    }
    tracing::info!(results = results.len(), original = ?original, "opening viewer");

    let use_alt = use_alt_screen(&config);
    init_terminal(use_alt)?;
    let result = run(results, original, config);
    restore_terminal(use_alt);

    result
}

/// Viewer-level actions reachable from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    Viewer(ViewerEvent),
    Next,
    Prev,
    ToggleFit,
}

fn map_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Char('+' | '=' | 'i') => Action::Viewer(ViewerEvent::ZoomIn),
        KeyCode::Char('-' | 'o') => Action::Viewer(ViewerEvent::ZoomOut),
        KeyCode::Char('c') => Action::Viewer(ViewerEvent::ToggleCompare),
        KeyCode::Char('d') => Action::Viewer(ViewerEvent::Download),
        KeyCode::Char('q') => Action::Viewer(ViewerEvent::Close),
        KeyCode::Esc => Action::Viewer(ViewerEvent::Escape),
        KeyCode::Char('f') => Action::ToggleFit,
        KeyCode::Char('j' | 'l' | ' ') => Action::Next,
        KeyCode::Char('k' | 'h') | KeyCode::Backspace => Action::Prev,
        _ => return None,
    };
    Some(action)
}

fn map_mouse(mouse: MouseEvent, to_point: impl Fn(u16, u16) -> Point) -> Option<ViewerEvent> {
    let event = match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            ViewerEvent::PointerDown(to_point(mouse.column, mouse.row))
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            ViewerEvent::PointerMove(to_point(mouse.column, mouse.row))
        }
        MouseEventKind::Up(MouseButton::Left) => ViewerEvent::PointerUp,
        MouseEventKind::ScrollUp => ViewerEvent::Wheel { delta_y: -1.0 },
        MouseEventKind::ScrollDown => ViewerEvent::Wheel { delta_y: 1.0 },
        _ => return None,
    };
    Some(event)
}

fn run(results: Vec<PathBuf>, original: Option<PathBuf>, config: Config) -> Result<()> {
    let mut app = App::new(results, original, config)?;
    let mut last_status = String::new();
    let mut last_size: (u16, u16) = (0, 0);
    let mut last_indicator = StatusIndicator::Busy;

    loop {
        app.poll_worker();
        app.poll_writer();

        // Drain pending input before deciding what to render.
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match map_key(key.code) {
                    Some(Action::Viewer(ev)) => app.handle(ev),
                    Some(Action::Next) => app.move_by(1),
                    Some(Action::Prev) => app.move_by(-1),
                    Some(Action::ToggleFit) => app.toggle_fit_mode(),
                    None => {}
                },
                Event::Mouse(mouse) => {
                    if let Some(ev) = map_mouse(mouse, |col, row| app.cell_to_point(col, row)) {
                        app.handle(ev);
                    }
                }
                Event::FocusLost => app.handle(ViewerEvent::PointerLeave),
                Event::Resize(..) => app.clear_kgp_overlay(),
                _ => {}
            }
            if app.should_quit {
                break;
            }
        }

        if app.should_quit {
            app.clear_kgp_overlay();
            break;
        }

        let (w, h) = terminal::size()?;
        let terminal_rect = Rect::new(0, 0, w, h);

        // Update status bar only when it changes (or on resize).
        let status_now = app.status_text();
        let indicator = app.status_indicator(terminal_rect);
        if status_now != last_status || (w, h) != last_size || indicator != last_indicator {
            app.send_status(status_now.clone(), (w, h), indicator);
            last_status = status_now;
            last_size = (w, h);
            last_indicator = indicator;
        }

        app.prepare_render_request(terminal_rect);

        let _ = event::poll(Duration::from_millis(16));
    }

    tracing::info!("viewer closed");
    Ok(())
}

fn init_terminal(use_alt_screen: bool) -> std::io::Result<()> {
    use std::io::stdout;

    use ratatui::crossterm::{
        cursor::{Hide, MoveTo},
        event::{EnableFocusChange, EnableMouseCapture},
        execute,
        terminal::{Clear, ClearType, EnterAlternateScreen, enable_raw_mode},
    };

    enable_raw_mode()?;
    if use_alt_screen {
        execute!(stdout(), EnterAlternateScreen)?;
    }
    execute!(
        stdout(),
        EnableMouseCapture,
        EnableFocusChange,
        Clear(ClearType::All),
        MoveTo(0, 0),
        Hide
    )?;
    Ok(())
}

fn restore_terminal(use_alt_screen: bool) {
    use std::io::stdout;

    use ratatui::crossterm::{
        cursor::Show,
        event::{DisableFocusChange, DisableMouseCapture},
        execute,
        terminal::{LeaveAlternateScreen, disable_raw_mode},
    };

    let _ = execute!(stdout(), DisableMouseCapture, DisableFocusChange);
    let _ = disable_raw_mode();
    if use_alt_screen {
        let _ = execute!(stdout(), LeaveAlternateScreen);
    }
    let _ = execute!(stdout(), Show);
}
