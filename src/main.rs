// Host application: a winit window drawing the automaton through egui, or a
// headless text dump for terminals and scripts.
mod input;
mod painter;
mod state;

use crate::state::State;

use clap::Parser;
use gpu_eca::compute::{build_backend, ContextPool};
use gpu_eca::render::TextRenderer;
use gpu_eca::{
    AdvanceOutcome, AnimationSequencer, BackendError, BackendPreference, CaError, Config, ConfigError, Variant,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::Window,
};

#[derive(Parser, Debug)]
#[command(name = "gpu_eca", version, about = "Elementary cellular automaton display")]
struct Cli {
    /// JSON configuration file; overrides --variant
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preset to start from: background, header or demo
    #[arg(long, default_value = "background")]
    variant: Variant,

    /// Compute backend: cpu, gpu or auto
    #[arg(long)]
    backend: Option<BackendPreference>,

    /// Initial Wolfram rule number (0-255)
    #[arg(long, allow_negative_numbers = true)]
    rule: Option<i64>,

    /// Cycle to a new rule after each completed run
    #[arg(long)]
    cycle: bool,

    /// Print the automaton as text instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Generations to compute in headless mode; defaults to a full run
    #[arg(long, requires = "headless")]
    generations: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Automaton(#[from] CaError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Window error: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("Surface error: {0}")]
    Surface(String),
}

impl Cli {
    fn settings(&self) -> Result<Config, AppError> {
        let mut settings = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::for_variant(self.variant),
        };
        if let Some(backend) = self.backend {
            settings.backend = backend;
        }
        if let Some(rule) = self.rule {
            settings.initial_rule = rule;
        }
        if self.cycle {
            settings.cycling_enabled = true;
        }
        settings.validate()?;
        Ok(settings)
    }
}

async fn run(event_loop: EventLoop<()>, window: Arc<Window>, settings: Config) -> Result<(), AppError> {
    let mut state = State::new(window, settings).await?;

    event_loop.run(move |event, window_target| {
        window_target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, ref event } if window_id == state.window.id() => {
                // Pass window-specific events to egui_winit first
                let response = state.egui_winit_state.on_window_event(&state.window, event);
                if response.repaint {
                    state.window.request_redraw();
                }

                // Resizes must reach the surface even when egui used them
                let consumed_by_egui = response.consumed && !matches!(event, WindowEvent::Resized(_));
                if consumed_by_egui {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        window_target.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(*new_size);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if let Some(action) = input::action_for_key(event) {
                            input::apply(&mut state, action);
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        state.update(now);
                        match state.render(now) {
                            Ok(()) => (),
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("Out of GPU memory, exiting");
                                window_target.exit();
                            }
                            Err(e) => {
                                log::warn!("Skipping frame due to surface {:?}", e);
                                state.window.request_redraw();
                            }
                        }
                    }
                    _ => (),
                }
            }
            Event::AboutToWait => {
                state.window.request_redraw();
            }
            _ => (),
        }
    })?;
    Ok(())
}

/// Compute a run without a window and print it as shaded text.
fn run_headless(settings: &Config, generations: Option<usize>) -> Result<(), AppError> {
    let pool = ContextPool::shared(1);
    let backend = build_backend(settings.backend, &pool)?;
    let mut sequencer = AnimationSequencer::from_config(settings)?.with_backend(backend);
    sequencer.subscribe(|event| log::debug!("{:?}", event));

    let limit = generations.unwrap_or_else(|| settings.rows.saturating_sub(1));
    for _ in 0..limit {
        match sequencer.advance()? {
            AdvanceOutcome::Completed { .. } | AdvanceOutcome::Idle => break,
            _ => (),
        }
    }

    let mut text = TextRenderer::new();
    sequencer.render(&mut text, 1.0, &settings.style);
    print!("{}", text.output());
    log::info!(
        "{} after {} generations on {} backend",
        sequencer.rule(),
        sequencer.current_generation(),
        sequencer.backend_name().unwrap_or("cpu")
    );
    Ok(())
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    if cli.headless {
        return run_headless(&settings, cli.generations);
    }

    let event_loop = EventLoop::new()?;
    let initial_size = winit::dpi::LogicalSize::new(
        settings.cols as f64 * settings.cell_size as f64,
        settings.rows as f64 * settings.cell_size as f64,
    );
    let window = Arc::new(
        winit::window::WindowBuilder::new()
            .with_title("Elementary Cellular Automaton")
            .with_inner_size(initial_size)
            .build(&event_loop)?,
    );

    pollster::block_on(run(event_loop, window, settings))
}

fn main() {
    env_logger::init();

    if let Err(e) = run_cli() {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
