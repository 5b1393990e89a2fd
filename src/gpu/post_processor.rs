//! GPU post-processing chain.
//!
//! Runs the active passes of [`PostSettings`] in fixed order over a pair of
//! intermediate targets, finishing in the caller's output view. Bloom is
//! routed through the multi-pass [`BloomProcessor`].

use bytemuck::{Pod, Zeroable};

use super::bloom_processor::BloomProcessor;
use super::pipeline::{
    create_fullscreen_pipeline, create_linear_sampler, create_quad_buffer, create_uniform_buffer,
    draw_fullscreen, post_source, single_texture_layout, texture_bind_group, uniform_bind_group,
    uniform_layout, RenderTarget,
};
use crate::post_processing::{
    ColorGradeParams, DitherParams, EdgeParams, NormalsParams, PostPass, PostSettings,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct NormalsUniforms {
    strength: f32,
    blend: f32,
    roughness: f32,
    f0: f32,
    diffuse_scale: f32,
    specular_scale: f32,
    _padding: [f32; 2],
}

impl From<&NormalsParams> for NormalsUniforms {
    fn from(p: &NormalsParams) -> Self {
        Self {
            strength: p.strength,
            blend: p.blend,
            roughness: p.roughness,
            f0: p.f0,
            diffuse_scale: p.diffuse_scale,
            specular_scale: p.specular_scale,
            _padding: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DitherUniforms {
    strength: f32,
    scale: f32,
    rgb_split: f32,
    _padding: f32,
}

impl From<&DitherParams> for DitherUniforms {
    fn from(p: &DitherParams) -> Self {
        Self {
            strength: p.dither_strength,
            scale: p.dither_scale,
            rgb_split: p.rgb_split,
            _padding: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GradeUniforms {
    contrast: f32,
    saturation: f32,
    brightness: f32,
    gamma: f32,
    hue_shift: f32,
    solarize_mix: f32,
    solarize_light_thresh: f32,
    solarize_light_soft: f32,
    solarize_dark_thresh: f32,
    solarize_dark_soft: f32,
    border_thickness: f32,
    _padding: f32,
    border_color: [f32; 4],
}

impl From<&ColorGradeParams> for GradeUniforms {
    fn from(p: &ColorGradeParams) -> Self {
        let [r, g, b] = p.border_color.to_array();
        Self {
            contrast: p.contrast,
            saturation: p.saturation,
            brightness: p.brightness,
            // Guard the 1/gamma exponent.
            gamma: if p.gamma.abs() < 1e-4 { 1e-4 } else { p.gamma },
            hue_shift: p.hue_shift,
            solarize_mix: p.solarize_mix,
            solarize_light_thresh: p.solarize_light_thresh,
            solarize_light_soft: p.solarize_light_soft,
            solarize_dark_thresh: p.solarize_dark_thresh,
            solarize_dark_soft: p.solarize_dark_soft,
            border_thickness: p.border_thickness,
            _padding: 0.0,
            border_color: [r, g, b, 1.0],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct EdgeUniforms {
    strength: f32,
    threshold: f32,
    sharpen_strength: f32,
    _padding: f32,
    edge_color: [f32; 4],
}

impl From<&EdgeParams> for EdgeUniforms {
    fn from(p: &EdgeParams) -> Self {
        Self {
            strength: p.strength,
            threshold: p.threshold,
            sharpen_strength: p.sharpen_strength,
            _padding: 0.0,
            edge_color: [p.color_r, p.color_g, p.color_b, 1.0],
        }
    }
}

/// Pipeline plus its uniform buffer for one single-draw pass.
struct PassResources {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PassResources {
    fn new(
        device: &wgpu::Device,
        label: &str,
        body: &str,
        uniform_size: usize,
        texture_layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> Self {
        let pipeline = create_fullscreen_pipeline(
            device,
            label,
            &post_source(body),
            &[texture_layout, uniforms],
            format,
        );
        let uniform_buffer =
            create_uniform_buffer(device, &format!("{} Uniform Buffer", label), uniform_size as u64);
        let bind_group =
            uniform_bind_group(device, &format!("{} Uniform Bind Group", label), uniforms, &uniform_buffer);
        Self { pipeline, uniform_buffer, bind_group }
    }
}

pub struct PostProcessor {
    /// Ping-pong intermediates.
    intermediates: [RenderTarget; 2],
    normals: PassResources,
    dither: PassResources,
    grade: PassResources,
    edge: PassResources,
    bloom: BloomProcessor,
    blit_pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl PostProcessor {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let texture_layout = single_texture_layout(device, "Post-Process Texture Layout");
        let uniforms = uniform_layout(device, "Post-Process Uniform Layout");

        let pass = |label: &str, body: &str, size: usize| {
            PassResources::new(device, label, body, size, &texture_layout, &uniforms, format)
        };
        let normals = pass(
            "Screen Normals",
            include_str!("shader_post_normals.wgsl"),
            std::mem::size_of::<NormalsUniforms>(),
        );
        let dither = pass(
            "Dither",
            include_str!("shader_post_dither.wgsl"),
            std::mem::size_of::<DitherUniforms>(),
        );
        let grade = pass(
            "Color Grade",
            include_str!("shader_post_color_grade.wgsl"),
            std::mem::size_of::<GradeUniforms>(),
        );
        let edge = pass(
            "Edge",
            include_str!("shader_post_edge.wgsl"),
            std::mem::size_of::<EdgeUniforms>(),
        );

        let blit_pipeline = create_fullscreen_pipeline(
            device,
            "Post Blit",
            &post_source(include_str!("shader_post_blit.wgsl")),
            &[&texture_layout],
            format,
        );

        Self {
            intermediates: [
                RenderTarget::new(device, "Post-Process Texture A", format, width, height),
                RenderTarget::new(device, "Post-Process Texture B", format, width, height),
            ],
            normals,
            dither,
            grade,
            edge,
            bloom: BloomProcessor::new(device, format, width, height),
            blit_pipeline,
            texture_layout,
            quad_vertex_buffer: create_quad_buffer(device, "Post-Process Quad Buffer"),
            sampler: create_linear_sampler(device, "Post-Process Sampler"),
            width,
            height,
            format,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width.max(1);
        self.height = height.max(1);
        self.intermediates = [
            RenderTarget::new(device, "Post-Process Texture A", self.format, self.width, self.height),
            RenderTarget::new(device, "Post-Process Texture B", self.format, self.width, self.height),
        ];
        self.bloom
            .resize(device, self.width, self.height, self.bloom.current_downsample());
    }

    /// Run the active chain from `input_view` into `output_view`.
    pub fn process(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        input_view: &wgpu::TextureView,
        output_view: &wgpu::TextureView,
        settings: &PostSettings,
    ) {
        let passes = settings.active_passes();
        if passes.is_empty() {
            self.blit(device, encoder, input_view, output_view);
            return;
        }

        let mut current_input = input_view;
        let mut ping = 0;
        for (i, pass) in passes.iter().enumerate() {
            let is_last = i == passes.len() - 1;
            let output = if is_last { output_view } else { &self.intermediates[ping].view };

            match pass {
                PostPass::Bloom => {
                    self.bloom.process(
                        device,
                        encoder,
                        queue,
                        current_input,
                        output,
                        &settings.bloom.to_params(),
                    );
                }
                PostPass::Normals => {
                    let uniforms = NormalsUniforms::from(&settings.normals);
                    self.run(device, encoder, queue, *pass, &self.normals, &uniforms, current_input, output);
                }
                PostPass::Dither => {
                    let uniforms = DitherUniforms::from(&settings.dither);
                    self.run(device, encoder, queue, *pass, &self.dither, &uniforms, current_input, output);
                }
                PostPass::ColorGrade => {
                    let uniforms = GradeUniforms::from(&settings.color_grading);
                    self.run(device, encoder, queue, *pass, &self.grade, &uniforms, current_input, output);
                }
                PostPass::Edge => {
                    let uniforms = EdgeUniforms::from(&settings.edge);
                    self.run(device, encoder, queue, *pass, &self.edge, &uniforms, current_input, output);
                }
            }

            if !is_last {
                current_input = &self.intermediates[ping].view;
                ping = 1 - ping;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run<U: Pod>(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        pass: PostPass,
        resources: &PassResources,
        uniforms: &U,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        queue.write_buffer(&resources.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        let texture_group = texture_bind_group(
            device,
            &format!("{} Texture Bind Group", pass.label()),
            &self.texture_layout,
            input,
            &self.sampler,
        );
        draw_fullscreen(
            encoder,
            &format!("{} Pass", pass.label()),
            output,
            wgpu::Color::BLACK,
            None,
            &resources.pipeline,
            &[&texture_group, &resources.bind_group],
            &self.quad_vertex_buffer,
        );
    }

    fn blit(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        let group = texture_bind_group(device, "Post Blit Bind Group", &self.texture_layout, input, &self.sampler);
        draw_fullscreen(
            encoder,
            "Post Blit Pass",
            output,
            wgpu::Color::BLACK,
            None,
            &self.blit_pipeline,
            &[&group],
            &self.quad_vertex_buffer,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_processing::Rgb;

    #[test]
    fn test_uniform_sizes_match_wgsl_structs() {
        assert_eq!(std::mem::size_of::<NormalsUniforms>(), 32);
        assert_eq!(std::mem::size_of::<DitherUniforms>(), 16);
        assert_eq!(std::mem::size_of::<GradeUniforms>(), 64);
        assert_eq!(std::mem::size_of::<EdgeUniforms>(), 32);
    }

    #[test]
    fn test_grade_uniforms_carry_border_colour() {
        let params = ColorGradeParams {
            border_color: Rgb { x: 0.0, y: 1.0, z: 0.5 },
            gamma: 0.0,
            ..Default::default()
        };
        let u = GradeUniforms::from(&params);
        assert_eq!(u.border_color, [0.0, 1.0, 0.5, 1.0]);
        assert!(u.gamma > 0.0);
    }

    #[test]
    fn test_dither_uniforms_from_defaults() {
        let u = DitherUniforms::from(&DitherParams::default());
        assert_eq!(u.strength, 0.25);
        assert_eq!(u.scale, 1.0);
        assert_eq!(u.rgb_split, 0.0);
    }
}
