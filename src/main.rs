//! Draws a few overlapping blocks below the shell prompt and counts key presses.
//!
//! Press `q` or Ctrl-C to quit. Set `BLOCK_LOG=<file>` (or pass `--log <file>`) to write
//! renderer logs to a file.
//!
//! cargo run --bin blocks -- --fps 30

use blockterm::rendering::cursor::CursorDown;
use blockterm::{Block, BlockRenderer, RendererConfig, RendererError};
use clap::Parser;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute, style};
use log::{info, warn};
use std::fs::File;
use std::io::{self, stdout, Stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Composite positioned text blocks in the terminal")]
struct Args {
    /// Frames per second of the background renderer.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Write logs to this file.
    #[arg(long, env = "BLOCK_LOG")]
    log: Option<PathBuf>,
}

#[derive(Default)]
struct Model {
    presses: usize,
    last_key: Option<KeyCode>,
    size: Option<(u16, u16)>,
}

enum Action {
    Continue,
    Quit,
}

fn update(model: &mut Model, event: &Event) -> Action {
    match *event {
        Event::Key(KeyEvent {
            code: KeyCode::Char('c'),
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) if modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        Event::Key(KeyEvent {
            code: KeyCode::Char('q' | 'Q'),
            kind: KeyEventKind::Press,
            ..
        }) => Action::Quit,
        Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) => {
            model.presses += 1;
            model.last_key = Some(code);
            Action::Continue
        }
        Event::Resize(width, height) => {
            model.size = Some((width, height));
            Action::Continue
        }
        _ => Action::Continue,
    }
}

fn view(model: &Model) -> Vec<Block> {
    let mut status = format!("keys pressed: {}", model.presses);
    if let Some(code) = model.last_key {
        status.push_str(&format!("\nlast: {code:?}"));
    }
    if let Some((width, height)) = model.size {
        status.push_str(&format!("\nterminal: {width}x{height}"));
    }

    vec![
        Block::new(1, 1, "01 Hi!\n01 Meow"),
        Block::new(4, 4, "02 Hello!\n02 Purr"),
        Block::new(12, 2, format!("\x1b[1;36m{status}\x1b[0m")).with_z(1),
    ]
}

fn init_logging(path: Option<&PathBuf>) -> io::Result<()> {
    // the terminal is busy showing blocks, so only log when asked to and only to a file
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    info!("------ Starting...");
    Ok(())
}

/// Raw mode so keys arrive immediately; the blocks render inline, not on the alternate screen.
fn terminal_setup(stdout: &mut Stdout) -> io::Result<()> {
    enable_raw_mode()?;
    execute!(stdout, cursor::Hide)?;
    Ok(())
}

/// Moves the cursor below the rendered region and restores the terminal.
fn terminal_cleanup(stdout: &mut Stdout, rows_below_cursor: usize) -> io::Result<()> {
    let moved = execute!(
        stdout,
        CursorDown(rows_below_cursor),
        style::Print("\r\n"),
        cursor::Show
    );
    disable_raw_mode()?;
    moved
}

fn install_panic_handler() {
    let old_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |pinfo| {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), cursor::Show);
        old_hook(pinfo);
    }));
}

/// Runs `app`, then `cleanup` however `app` ended. An error from `app` wins over one from
/// `cleanup`.
fn run_then_cleanup<T>(
    app: impl FnOnce() -> Result<T, RendererError>,
    cleanup: impl FnOnce(Option<&T>) -> io::Result<()>,
) -> Result<T, RendererError> {
    let result = app();
    let cleaned = cleanup(result.as_ref().ok());
    let value = result?;
    cleaned?;
    Ok(value)
}

/// Drives the model/update/view loop until the user quits. Returns how far the cursor has to
/// move down to leave the rendered region.
fn run(config: RendererConfig) -> Result<usize, RendererError> {
    let mut renderer = BlockRenderer::new(stdout(), config)?;
    let handle = renderer.handle();

    let (event_writer, event_reader) = mpsc::channel();
    let (event_read_stop_signal, event_read_stop_receiver) = mpsc::channel::<()>();
    let event_read_thread_handle = std::thread::spawn(move || loop {
        match crossterm::event::poll(Duration::from_millis(10)) {
            Ok(true) => {
                if let Ok(event) = crossterm::event::read() {
                    if event_writer.send(event).is_err() {
                        break;
                    }
                }
            }
            Ok(false) => {}
            Err(err) => {
                warn!("failed to poll terminal events: {err}");
                break;
            }
        }
        if event_read_stop_receiver.try_recv().is_ok() {
            break;
        }
    });

    let mut model = Model {
        size: crossterm::terminal::size().ok(),
        ..Model::default()
    };
    if let Some((width, height)) = model.size {
        handle.resize(width as usize, height as usize);
    }
    handle.submit(view(&model));

    let started = renderer.start();
    if started.is_ok() {
        while let Ok(event) = event_reader.recv() {
            handle.handle_event(&event);
            if let Action::Quit = update(&mut model, &event) {
                break;
            }
            handle.submit(view(&model));
        }
    }

    let _ = event_read_stop_signal.send(());
    if event_read_thread_handle.join().is_err() {
        warn!("event reader thread panicked");
    }

    started?;
    renderer.stop()?;
    info!("------ Stopped after {} key presses", model.presses);
    Ok(renderer.rows_below_cursor())
}

fn main() -> Result<(), RendererError> {
    let args = Args::parse();
    init_logging(args.log.as_ref())?;
    let config = RendererConfig::with_fps(args.fps)?;

    let mut out = stdout();
    run_then_cleanup(
        || {
            terminal_setup(&mut stdout())?;
            install_panic_handler();
            run(config)
        },
        |rows_below_cursor| terminal_cleanup(&mut out, rows_below_cursor.copied().unwrap_or(0)),
    )?;
    Ok(())
}
