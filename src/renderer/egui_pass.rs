/// Uploads one egui frame and paints it into a texture view.
pub struct EguiPass {
    renderer: egui_wgpu::Renderer,
}

impl EguiPass {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        Self {
            renderer: egui_wgpu::Renderer::new(device, target_format, None, 1, false),
        }
    }

    /// Tessellates `output`, clears `target` to `clear` and draws the frame.
    /// Submits all GPU work before returning.
    #[allow(clippy::too_many_arguments)]
    pub fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        ctx: &egui::Context,
        output: egui::FullOutput,
        size_in_pixels: [u32; 2],
        clear: wgpu::Color,
    ) {
        let paint_jobs = ctx.tessellate(output.shapes, output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: output.pixels_per_point,
        };

        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Plot Encoder"),
        });
        let callback_buffers =
            self.renderer
                .update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Plot Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            })
            .forget_lifetime();
        self.renderer
            .render(&mut pass, &paint_jobs, &screen_descriptor);
        drop(pass);

        queue.submit(
            callback_buffers
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
