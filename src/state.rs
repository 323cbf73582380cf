use crate::input::{self, Action, MAX_TICK_MS, MIN_TICK_MS};
use crate::painter::PainterRenderer;
use crate::AppError;
use gpu_eca::compute::{build_backend, ComputeBackend, ContextPool, CpuBackend, WorkerBackend};
use gpu_eca::{
    AnimationSequencer, BackendError, BackendPreference, Config, Phase, SequencerEvent, Ticker, NAMED_RULES,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::window::Window;

// GUI Imports
use egui::Context as EguiContext;
use egui_wgpu::Renderer as EguiWgpuRenderer;
use egui_winit::State as EguiWinitState;

const BACKGROUND: wgpu::Color = wgpu::Color { r: 0.02, g: 0.02, b: 0.03, a: 1.0 };

// The window's own device is separate; this only caps compute contexts.
const COMPUTE_CONTEXT_LIMIT: usize = 2;

/// Running tally of sequencer events for the side panel
#[derive(Debug, Default)]
pub struct StatusLog {
    pub last_error: Option<String>,
    pub rule_changes: usize,
    pub completed: usize,
}

impl StatusLog {
    fn record(&mut self, event: &SequencerEvent) {
        match event {
            SequencerEvent::Error(e) => self.last_error = Some(e.to_string()),
            SequencerEvent::RuleChanged { .. } => self.rule_changes += 1,
            SequencerEvent::Completed { .. } => self.completed += 1,
            _ => (),
        }
    }
}

pub struct State {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    pub window: Arc<Window>,

    // --- Automaton ---
    pub settings: Config,
    pub sequencer: AnimationSequencer,
    pub worker: WorkerBackend,
    pub ticker: Ticker,
    pub status: Rc<RefCell<StatusLog>>,
    pub started: Instant,
    _pool: Arc<ContextPool>,

    // GUI state
    pub egui_ctx: EguiContext,
    pub egui_winit_state: EguiWinitState,
    pub egui_renderer: EguiWgpuRenderer,
    pub menu_open: bool,
}

impl State {
    pub async fn new(window: Arc<Window>, settings: Config) -> Result<Self, AppError> {
        let size = window.inner_size();

        log::info!("Initializing wgpu...");

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| AppError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or(BackendError::AdapterUnavailable)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceRequest(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| AppError::Surface("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // --- Automaton Setup ---
        // Fill the window when it is large enough, otherwise keep the configured grid
        let (cols, rows) = match settings.grid_for_surface(config.width, config.height) {
            (0, _) | (_, 0) => (settings.cols, settings.rows),
            grid => grid,
        };
        let mut sequencer = AnimationSequencer::from_config(&Config { cols, rows, ..settings.clone() })?;

        let status = Rc::new(RefCell::new(StatusLog::default()));
        let sink = Rc::clone(&status);
        sequencer.subscribe(move |event| sink.borrow_mut().record(event));

        let pool = ContextPool::shared(COMPUTE_CONTEXT_LIMIT);
        let worker = spawn_worker(settings.backend, &pool)?;
        let ticker = Ticker::new(Duration::from_millis(settings.tick_interval_ms));
        log::info!(
            "Automaton {}x{} with rule {} on {} backend",
            cols,
            rows,
            sequencer.rule().number(),
            worker.name()
        );
        // --- End Automaton Setup ---

        log::info!("Initializing egui...");
        let egui_ctx = EguiContext::default();
        let egui_winit_state = EguiWinitState::new(egui_ctx.clone(), egui_ctx.viewport_id(), &window, None, None);
        let egui_renderer = EguiWgpuRenderer::new(&device, config.format, None, 1);
        log::info!("egui initialized.");

        log::info!("wgpu initialized successfully.");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
            settings,
            sequencer,
            worker,
            ticker,
            status,
            started: Instant::now(),
            _pool: pool,
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            menu_open: false,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);

            // Keep the pattern centered in the new grid instead of starting over
            let (cols, rows) = self.settings.grid_for_surface(new_size.width, new_size.height);
            self.sequencer.resize(cols, rows);

            log::info!("Reconfigured surface to: {}x{}", new_size.width, new_size.height);
        } else {
            log::warn!("Ignoring resize to zero dimensions: {}x{}", new_size.width, new_size.height);
        }
    }

    /// Collect finished work and, when a tick is due, start the next
    /// generation or cycle the rule.
    pub fn update(&mut self, now: Instant) {
        match self.worker.try_collect() {
            Ok(Some(done)) => {
                // Failures reach the UI through the event listener
                let _ = self.sequencer.finish_advance(done.pending, done.result);
            }
            Ok(None) => (),
            Err(e) => {
                self.sequencer.abort_in_flight(e);
            }
        }

        if !self.ticker.poll(now) {
            return;
        }
        match self.sequencer.phase() {
            Phase::Running => {
                if let Some(pending) = self.sequencer.begin_advance() {
                    if let Err(e) = self.worker.submit(pending) {
                        self.sequencer.abort_in_flight(e);
                    }
                }
            }
            Phase::Complete => {
                self.sequencer.maybe_cycle(now);
            }
            Phase::Stopped => (),
        }
    }

    /// Draw the automaton and the side panel, then present.
    pub fn render(&mut self, now: Instant) -> Result<(), wgpu::SurfaceError> {
        // --- Get Surface Texture (early exit on error) ---
        let output_frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) => {
                log::warn!("Surface lost, recreating...");
                self.resize(self.size);
                return Err(wgpu::SurfaceError::Lost);
            }
            Err(e) => {
                log::error!("Failed to acquire next swap chain texture: {:?}", e);
                return Err(e);
            }
        };
        let output_view = output_frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Begin egui frame
        let raw_input = self.egui_winit_state.take_egui_input(&self.window);
        self.egui_ctx.begin_frame(raw_input);

        // --- Automaton Layer ---
        let mut style = self.settings.style;
        if let Some(breathing) = self.settings.breathing {
            style.alpha *= breathing.alpha_at(now.saturating_duration_since(self.started));
        }
        let points_per_cell = self.settings.cell_size / self.window.scale_factor() as f32;
        {
            let painter = self.egui_ctx.layer_painter(egui::LayerId::background());
            let mut renderer = PainterRenderer::new(&painter, egui::Pos2::ZERO);
            self.sequencer.render(&mut renderer, points_per_cell, &style);
        }

        let actions = self.build_ui();

        // End egui frame
        let full_output = self.egui_ctx.end_frame();
        for action in actions {
            input::apply(self, action);
        }

        let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, self.window.scale_factor() as f32);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        // Upload egui data to GPU
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let user_buffers = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        self.egui_winit_state.handle_platform_output(&self.window, full_output.platform_output);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        // Free texture delta
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(user_buffers.into_iter().chain(std::iter::once(encoder.finish())));
        output_frame.present();
        Ok(())
    }

    /// Menu button and side panel. Returns what the user clicked.
    fn build_ui(&self) -> Vec<Action> {
        let mut actions = Vec::new();

        egui::Area::new(egui::Id::new("menu_button_area"))
            .anchor(egui::Align2::LEFT_TOP, egui::vec2(5.0, 5.0))
            .show(&self.egui_ctx, |ui| {
                if ui.button("☰").clicked() {
                    actions.push(Action::ToggleMenu);
                }
            });

        if !self.menu_open {
            return actions;
        }

        let panel_frame = egui::Frame {
            fill: egui::Color32::from_rgba_unmultiplied(25, 25, 25, 100),
            ..egui::Frame::side_top_panel(&self.egui_ctx.style())
        };

        egui::SidePanel::left("side_panel")
            .frame(panel_frame)
            .resizable(true)
            .default_width(220.0)
            .show(&self.egui_ctx, |ui| {
                let seq = &self.sequencer;

                ui.heading("Automaton");
                ui.separator();
                ui.label("Rules:");
                for named in NAMED_RULES.iter() {
                    let selected = seq.rule().number() == named.number;
                    if ui
                        .selectable_label(selected, named.name)
                        .on_hover_text(named.description)
                        .clicked()
                    {
                        actions.push(Action::SetRule(named.number));
                    }
                }
                if ui.button("Random rule").clicked() {
                    actions.push(Action::RandomRule);
                }
                ui.separator();

                let mut cycling = seq.is_cycling();
                if ui.checkbox(&mut cycling, "Cycle rules on completion").changed() {
                    actions.push(Action::ToggleCycling);
                }
                let mut tick_ms = self.settings.tick_interval_ms;
                if ui
                    .add(egui::Slider::new(&mut tick_ms, MIN_TICK_MS..=MAX_TICK_MS).text("Tick (ms)"))
                    .changed()
                {
                    actions.push(Action::SetTickInterval(tick_ms));
                }
                ui.horizontal(|ui| {
                    let pause_label = if seq.phase() == Phase::Stopped { "Resume" } else { "Stop" };
                    if ui.button(pause_label).clicked() {
                        actions.push(Action::TogglePause);
                    }
                    if ui.button("Restart").clicked() {
                        actions.push(Action::Restart);
                    }
                });
                ui.separator();

                ui.label(format!("Rule: {}", seq.rule().number()));
                ui.label(format!("Generation: {} / {}", seq.current_generation(), seq.rows() - 1));
                ui.label(format!("Grid: {}x{}", seq.cols(), seq.rows()));
                ui.label(format!("Phase: {:?}", seq.phase()));
                ui.label(format!("Backend: {}", self.worker.name()));

                let status = self.status.borrow();
                ui.label(format!("Completed runs: {}", status.completed));
                ui.label(format!("Rule changes: {}", status.rule_changes));
                if let Some(error) = &status.last_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, error.as_str());
                }
            });

        actions
    }
}

/// Start the compute worker for `preference`, dropping to the CPU when the
/// preferred backend cannot be built.
fn spawn_worker(preference: BackendPreference, pool: &Arc<ContextPool>) -> Result<WorkerBackend, BackendError> {
    let worker_pool = Arc::clone(pool);
    match WorkerBackend::spawn(move || build_backend(preference, &worker_pool).map(|b| b as Box<dyn ComputeBackend>)) {
        Ok(worker) => Ok(worker),
        Err(e) => {
            log::warn!("{:?} backend unavailable ({}), using cpu", preference, e);
            WorkerBackend::spawn(|| Ok(Box::new(CpuBackend) as Box<dyn ComputeBackend>))
        }
    }
}
