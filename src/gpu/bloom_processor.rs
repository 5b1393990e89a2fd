//! Multi-pass bloom processor.
//!
//! Implements bloom using:
//! 1. Threshold pass - extract bright pixels
//! 2. Downscale - process at lower resolution
//! 3. Separable blur - horizontal then vertical passes
//! 4. Composite - blend bloom back with original

use bytemuck::{Pod, Zeroable};

use super::pipeline::{
    create_fullscreen_pipeline, create_linear_sampler, create_quad_buffer, create_uniform_buffer,
    draw_fullscreen, post_source, sampler_entry, single_texture_layout, texture_bind_group,
    texture_entry, uniform_bind_group, uniform_layout, RenderTarget,
};

/// Maximum blur radius (caps GPU cost)
pub const MAX_BLOOM_RADIUS: f32 = 32.0;

/// Default downsample factor (1 = full res, 2 = half res, etc.)
pub const DEFAULT_DOWNSAMPLE: u32 = 2;

const SOFT_KNEE: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomParams {
    pub threshold: f32,
    pub intensity: f32,
    /// Blur radius in bloom-texture pixels.
    pub radius: f32,
    pub downsample: u32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            intensity: 0.0,
            radius: 6.4,
            downsample: DEFAULT_DOWNSAMPLE,
        }
    }
}

impl BloomParams {
    /// Clamp parameters to safe ranges
    pub fn sanitize(&self) -> Self {
        Self {
            threshold: self.threshold.max(0.0),
            intensity: self.intensity.max(0.0),
            radius: self.radius.clamp(0.0, MAX_BLOOM_RADIUS),
            downsample: self.downsample.clamp(1, 8),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ThresholdUniforms {
    threshold: f32,
    soft_knee: f32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BlurUniforms {
    direction_and_radius: [f32; 4], // xy = direction, z = radius
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CompositeUniforms {
    intensity: f32,
    _padding: [f32; 3],
}

pub struct BloomProcessor {
    // Downsampled ping-pong targets
    bloom_a: RenderTarget,
    bloom_b: RenderTarget,

    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    blit_pipeline: wgpu::RenderPipeline,

    single_texture_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,

    threshold_uniform_buffer: wgpu::Buffer,
    // Queue writes all land before the encoder runs: one buffer per direction.
    blur_h_uniform_buffer: wgpu::Buffer,
    blur_v_uniform_buffer: wgpu::Buffer,
    composite_uniform_buffer: wgpu::Buffer,

    threshold_uniform_bind_group: wgpu::BindGroup,
    blur_h_uniform_bind_group: wgpu::BindGroup,
    blur_v_uniform_bind_group: wgpu::BindGroup,
    composite_uniform_bind_group: wgpu::BindGroup,

    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    bloom_width: u32,
    bloom_height: u32,
    format: wgpu::TextureFormat,
    current_downsample: u32,
}

impl BloomProcessor {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let downsample = DEFAULT_DOWNSAMPLE;
        let bloom_width = (width / downsample).max(1);
        let bloom_height = (height / downsample).max(1);

        let bloom_a = RenderTarget::new(device, "Bloom A", format, bloom_width, bloom_height);
        let bloom_b = RenderTarget::new(device, "Bloom B", format, bloom_width, bloom_height);

        let sampler = create_linear_sampler(device, "Bloom Sampler");
        let quad_vertex_buffer = create_quad_buffer(device, "Bloom Quad Buffer");

        let single_texture_layout = single_texture_layout(device, "Bloom Single Texture Layout");
        let uniforms = uniform_layout(device, "Bloom Uniform Layout");

        // Scene + bloom textures
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Composite Layout"),
            entries: &[texture_entry(0), sampler_entry(1), texture_entry(2), sampler_entry(3)],
        });

        let threshold_pipeline = create_fullscreen_pipeline(
            device,
            "Bloom Threshold",
            &post_source(include_str!("shader_post_bloom_threshold.wgsl")),
            &[&single_texture_layout, &uniforms],
            format,
        );
        let blur_pipeline = create_fullscreen_pipeline(
            device,
            "Bloom Blur",
            &post_source(include_str!("shader_post_bloom_blur.wgsl")),
            &[&single_texture_layout, &uniforms],
            format,
        );
        let composite_pipeline = create_fullscreen_pipeline(
            device,
            "Bloom Composite",
            &post_source(include_str!("shader_post_bloom_composite.wgsl")),
            &[&composite_layout, &uniforms],
            format,
        );
        let blit_pipeline = create_fullscreen_pipeline(
            device,
            "Bloom Blit",
            &post_source(include_str!("shader_post_blit.wgsl")),
            &[&single_texture_layout],
            format,
        );

        let threshold_uniform_buffer = create_uniform_buffer(
            device,
            "Bloom Threshold Uniform Buffer",
            std::mem::size_of::<ThresholdUniforms>() as u64,
        );
        let blur_size = std::mem::size_of::<BlurUniforms>() as u64;
        let blur_h_uniform_buffer = create_uniform_buffer(device, "Bloom Blur H Uniform Buffer", blur_size);
        let blur_v_uniform_buffer = create_uniform_buffer(device, "Bloom Blur V Uniform Buffer", blur_size);
        let composite_uniform_buffer = create_uniform_buffer(
            device,
            "Bloom Composite Uniform Buffer",
            std::mem::size_of::<CompositeUniforms>() as u64,
        );

        let threshold_uniform_bind_group = uniform_bind_group(
            device,
            "Bloom Threshold Uniform Bind Group",
            &uniforms,
            &threshold_uniform_buffer,
        );
        let blur_h_uniform_bind_group =
            uniform_bind_group(device, "Bloom Blur H Uniform Bind Group", &uniforms, &blur_h_uniform_buffer);
        let blur_v_uniform_bind_group =
            uniform_bind_group(device, "Bloom Blur V Uniform Bind Group", &uniforms, &blur_v_uniform_buffer);
        let composite_uniform_bind_group = uniform_bind_group(
            device,
            "Bloom Composite Uniform Bind Group",
            &uniforms,
            &composite_uniform_buffer,
        );

        Self {
            bloom_a,
            bloom_b,
            threshold_pipeline,
            blur_pipeline,
            composite_pipeline,
            blit_pipeline,
            single_texture_layout,
            composite_layout,
            threshold_uniform_buffer,
            blur_h_uniform_buffer,
            blur_v_uniform_buffer,
            composite_uniform_buffer,
            threshold_uniform_bind_group,
            blur_h_uniform_bind_group,
            blur_v_uniform_bind_group,
            composite_uniform_bind_group,
            quad_vertex_buffer,
            sampler,
            bloom_width,
            bloom_height,
            format,
            current_downsample: downsample,
        }
    }

    /// Resize bloom textures
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32, downsample: u32) {
        let ds = downsample.clamp(1, 8);
        let bloom_w = (width / ds).max(1);
        let bloom_h = (height / ds).max(1);

        if bloom_w == self.bloom_width && bloom_h == self.bloom_height {
            return;
        }

        self.bloom_width = bloom_w;
        self.bloom_height = bloom_h;
        self.current_downsample = ds;
        self.bloom_a = RenderTarget::new(device, "Bloom A", self.format, bloom_w, bloom_h);
        self.bloom_b = RenderTarget::new(device, "Bloom B", self.format, bloom_w, bloom_h);
    }

    pub fn current_downsample(&self) -> u32 {
        self.current_downsample
    }

    /// Bloom `input_view` into `output_view`. Zero intensity is a plain copy.
    pub fn process(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        input_view: &wgpu::TextureView,
        output_view: &wgpu::TextureView,
        params: &BloomParams,
    ) {
        let params = params.sanitize();

        if params.intensity <= 0.0 {
            let bind_group = texture_bind_group(
                device,
                "Bloom Blit Bind Group",
                &self.single_texture_layout,
                input_view,
                &self.sampler,
            );
            draw_fullscreen(
                encoder,
                "Bloom Blit Pass",
                output_view,
                wgpu::Color::BLACK,
                None,
                &self.blit_pipeline,
                &[&bind_group],
                &self.quad_vertex_buffer,
            );
            return;
        }

        // 1. Threshold: scene -> bloom_a (downsampled)
        queue.write_buffer(
            &self.threshold_uniform_buffer,
            0,
            bytemuck::bytes_of(&ThresholdUniforms {
                threshold: params.threshold,
                soft_knee: SOFT_KNEE,
                _padding: [0.0; 2],
            }),
        );
        let scene_group = texture_bind_group(
            device,
            "Bloom Threshold Texture Bind Group",
            &self.single_texture_layout,
            input_view,
            &self.sampler,
        );
        draw_fullscreen(
            encoder,
            "Bloom Threshold Pass",
            &self.bloom_a.view,
            wgpu::Color::BLACK,
            None,
            &self.threshold_pipeline,
            &[&scene_group, &self.threshold_uniform_bind_group],
            &self.quad_vertex_buffer,
        );

        // 2. Horizontal blur: bloom_a -> bloom_b
        queue.write_buffer(
            &self.blur_h_uniform_buffer,
            0,
            bytemuck::bytes_of(&BlurUniforms { direction_and_radius: [1.0, 0.0, params.radius, 0.0] }),
        );
        let a_group = texture_bind_group(
            device,
            "Bloom Blur H Texture Bind Group",
            &self.single_texture_layout,
            &self.bloom_a.view,
            &self.sampler,
        );
        draw_fullscreen(
            encoder,
            "Bloom Blur H Pass",
            &self.bloom_b.view,
            wgpu::Color::BLACK,
            None,
            &self.blur_pipeline,
            &[&a_group, &self.blur_h_uniform_bind_group],
            &self.quad_vertex_buffer,
        );

        // 3. Vertical blur: bloom_b -> bloom_a
        queue.write_buffer(
            &self.blur_v_uniform_buffer,
            0,
            bytemuck::bytes_of(&BlurUniforms { direction_and_radius: [0.0, 1.0, params.radius, 0.0] }),
        );
        let b_group = texture_bind_group(
            device,
            "Bloom Blur V Texture Bind Group",
            &self.single_texture_layout,
            &self.bloom_b.view,
            &self.sampler,
        );
        draw_fullscreen(
            encoder,
            "Bloom Blur V Pass",
            &self.bloom_a.view,
            wgpu::Color::BLACK,
            None,
            &self.blur_pipeline,
            &[&b_group, &self.blur_v_uniform_bind_group],
            &self.quad_vertex_buffer,
        );

        // 4. Composite: scene + bloom_a -> output
        queue.write_buffer(
            &self.composite_uniform_buffer,
            0,
            bytemuck::bytes_of(&CompositeUniforms { intensity: params.intensity, _padding: [0.0; 3] }),
        );
        let composite_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Composite Texture Bind Group"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.bloom_a.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        draw_fullscreen(
            encoder,
            "Bloom Composite Pass",
            output_view,
            wgpu::Color::BLACK,
            None,
            &self.composite_pipeline,
            &[&composite_group, &self.composite_uniform_bind_group],
            &self.quad_vertex_buffer,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clamps() {
        let params = BloomParams { threshold: -1.0, intensity: -2.0, radius: 100.0, downsample: 0 };
        let clean = params.sanitize();
        assert_eq!(clean.threshold, 0.0);
        assert_eq!(clean.intensity, 0.0);
        assert_eq!(clean.radius, MAX_BLOOM_RADIUS);
        assert_eq!(clean.downsample, 1);
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<ThresholdUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<BlurUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<CompositeUniforms>() % 16, 0);
    }
}
