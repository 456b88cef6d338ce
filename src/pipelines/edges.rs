use crate::{
    data_structures::texture::Texture,
    pipelines::{
        basic::{DepthMode, flat_shader, mk_render_pipeline},
        position_layout,
    },
};

/// Line lists for the edge overlay and the ground grid.
pub fn mk_edge_pipeline(
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
        wgpu::PrimitiveTopology::LineList,
        &[position_layout()],
        flat_shader(),
    )
}
