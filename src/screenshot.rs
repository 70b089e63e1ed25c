use std::path::Path;

use crate::error::{Error, Result};
use crate::renderer::egui_pass::EguiPass;
use crate::renderer::gpu;
use crate::ui::{self, OrbitPlot};

/// Renders the figure offscreen and writes it to `path` as PNG.
pub fn render_to_png(plot: &OrbitPlot, width: u32, height: u32, path: &Path) -> Result<()> {
    let width = width.max(1);
    let height = height.max(1);

    let instance = gpu::create_instance();
    let (_adapter, device, queue) = gpu::request_device(&instance, None, "Screenshot Device")?;

    // Non-sRGB target: egui then writes gamma-space colors that go straight
    // into the PNG.
    let format = wgpu::TextureFormat::Rgba8Unorm;
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Plot Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let ctx = egui::Context::default();
    let raw_input = egui::RawInput {
        screen_rect: Some(egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(width as f32, height as f32),
        )),
        ..Default::default()
    };
    let output = ctx.run(raw_input, |ctx| ui::draw_plot(ctx, plot));

    let mut pass = EguiPass::new(&device, format);
    pass.paint(
        &device,
        &queue,
        &view,
        &ctx,
        output,
        [width, height],
        wgpu::Color::WHITE,
    );

    let image = read_texture(&device, &queue, &texture, width, height)?;
    image.save(path).map_err(|source| Error::SaveImage {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Plot saved to {}", path.display());
    Ok(())
}

/// Copies an RGBA8 texture back to the CPU.
fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<image::RgbaImage> {
    let unpadded_bytes_per_row = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Plot Readback Buffer"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

    let data = slice.get_mapped_range();
    let stride = padded_bytes_per_row as usize;
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        let i = y as usize * stride + x as usize * 4;
        image::Rgba([data[i], data[i + 1], data[i + 2], data[i + 3]])
    });
    drop(data);
    buffer.unmap();

    Ok(image)
}
