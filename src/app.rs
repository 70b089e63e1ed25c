use std::sync::Arc;

use winit::event::WindowEvent;
use winit::window::Window;

use crate::error::Result;
use crate::renderer::egui_pass::EguiPass;
use crate::renderer::gpu;
use crate::ui::{self, OrbitPlot};

/// Window showing the orbit plot until it is closed.
pub struct App {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    egui_ctx: egui::Context,
    egui_winit: egui_winit::State,
    egui_pass: EguiPass,
    plot: OrbitPlot,
    window: Arc<Window>,
}

impl App {
    pub fn new(window: Arc<Window>, plot: OrbitPlot) -> Result<Self> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = gpu::create_instance();
        let surface = instance.create_surface(window.clone())?;
        let (adapter, device, queue) = gpu::request_device(&instance, Some(&surface), "Plot Device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_ctx = egui::Context::default();
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_pass = EguiPass::new(&device, surface_format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            egui_ctx,
            egui_winit,
            egui_pass,
            plot,
            window,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        let response = self.egui_winit.on_window_event(&self.window, event);

        if let WindowEvent::Resized(size) = event {
            self.resize(size.width, size.height);
            self.window.request_redraw();
        } else if response.repaint {
            self.window.request_redraw();
        }
    }

    pub fn render(&mut self) {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.resize(self.config.width, self.config.height);
                self.window.request_redraw();
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let raw_input = self.egui_winit.take_egui_input(&self.window);
        let plot = &self.plot;
        let full_output = self.egui_ctx.run(raw_input, |ctx| ui::draw_plot(ctx, plot));

        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output.clone());
        let repaint_now = full_output
            .viewport_output
            .get(&egui::ViewportId::ROOT)
            .is_some_and(|v| v.repaint_delay.is_zero());

        self.egui_pass.paint(
            &self.device,
            &self.queue,
            &view,
            &self.egui_ctx,
            full_output,
            [self.config.width, self.config.height],
            wgpu::Color::WHITE,
        );
        output.present();

        self.device.poll(wgpu::Maintain::Poll);

        // The first frame only lays out text; egui asks for a second pass.
        if repaint_now {
            self.window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Wait for all GPU work to finish before the surface is destroyed.
        self.device.poll(wgpu::Maintain::Wait);
    }
}
