mod app;
mod config;
mod error;
mod integrator;
mod metrics;
mod renderer;
mod screenshot;
mod simulation;
mod ui;

use std::process::ExitCode;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{WindowAttributes, WindowId};

use crate::error::{Error, Result};
use crate::ui::OrbitPlot;

struct PlotViewer {
    app: Option<app::App>,
    /// Handed to the window once it exists.
    plot: Option<OrbitPlot>,
    size: (u32, u32),
    error: Option<Error>,
}

impl PlotViewer {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some(plot) = self.plot.take() else {
            return Ok(());
        };
        let attrs = WindowAttributes::default()
            .with_title(ui::TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(self.size.0, self.size.1));

        let window = Arc::new(event_loop.create_window(attrs)?);
        self.app = Some(app::App::new(window.clone(), plot)?);
        window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for PlotViewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_none() {
            if let Err(e) = self.open(event_loop) {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let close = match &event {
            WindowEvent::CloseRequested => true,
            WindowEvent::KeyboardInput { event, .. } => {
                event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
            }
            _ => false,
        };
        // Drop the app while the window is still alive so the surface goes first.
        if close {
            self.app = None;
            event_loop.exit();
            return;
        }

        let Some(app) = &mut self.app else { return };

        match &event {
            WindowEvent::RedrawRequested => app.render(),
            _ => app.handle_window_event(&event),
        }
    }
}

/// Opens the plot window and blocks until it is closed.
fn show_window(plot: OrbitPlot, width: u32, height: u32) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut viewer = PlotViewer {
        app: None,
        plot: Some(plot),
        size: (width, height),
        error: None,
    };
    event_loop.run_app(&mut viewer)?;

    match viewer.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn run(args: &[String]) -> Result<()> {
    let Some(config) = config::parse_args(args)? else {
        print!("{}", config::USAGE);
        return Ok(());
    };

    let trajectory = simulation::simulate(&config.simulation)?;
    log::debug!("integrator stats: {:?}", trajectory.stats);
    let plot = OrbitPlot::from_trajectory(&trajectory);

    match &config.output {
        Some(path) => screenshot::render_to_png(&plot, config.width, config.height, path),
        None => show_window(plot, config.width, config.height),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
