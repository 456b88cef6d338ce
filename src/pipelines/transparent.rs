use crate::{
    data_structures::texture::Texture,
    pipelines::{
        basic::{DepthMode, flat_shader, mk_render_pipeline},
        position_layout,
    },
};

/**
 * X-ray surfaces: alpha blended and tested against, but never written to,
 * the depth buffer.
 *
 * Opacity itself comes from the per-mesh uniform, so toggling x-ray only
 * switches which of the two surface pipelines a mesh is drawn with.
 */
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    layout: &wgpu::PipelineLayout,
) -> wgpu::RenderPipeline {
    mk_render_pipeline(
        device,
        layout,
        format,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        DepthMode::TestOnly,
        wgpu::PrimitiveTopology::TriangleList,
        &[position_layout()],
        flat_shader(),
    )
}
