//! Pass recording.
//!
//! Pass calls arrive one at a time while a wgpu render pass needs every
//! referenced object up front, so a pass is recorded into owned commands and
//! replayed into the frame encoder when it ends.

use super::convert;
use crate::gfx::action::ResolvedPassAction;

pub(crate) enum Recorded {
    Viewport { x: f32, y: f32, w: f32, h: f32 },
    Scissor { x: u32, y: u32, w: u32, h: u32 },
    Pipeline {
        pipeline: wgpu::RenderPipeline,
        stencil_ref: u32,
        blend_color: wgpu::Color,
    },
    BindGroup {
        index: u32,
        group: wgpu::BindGroup,
        offsets: Vec<u32>,
    },
    VertexBuffer {
        slot: u32,
        buffer: wgpu::Buffer,
        offset: u64,
    },
    IndexBuffer {
        buffer: wgpu::Buffer,
        format: wgpu::IndexFormat,
        offset: u64,
    },
    Draw {
        indexed: bool,
        base: u32,
        count: u32,
        instances: u32,
    },
}

/// Render targets resolved for replay.
pub(crate) struct Targets {
    pub colors: Vec<(wgpu::TextureView, Option<u32>)>,
    pub depth: Option<wgpu::TextureView>,
    pub stencil: bool,
}

pub(crate) fn replay(
    encoder: &mut wgpu::CommandEncoder,
    targets: &Targets,
    action: &ResolvedPassAction,
    commands: &[Recorded],
) {
    let colors: Vec<_> = targets
        .colors
        .iter()
        .zip(action.colors)
        .map(|((view, depth_slice), load)| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: convert::color_load(load),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: *depth_slice,
            })
        })
        .collect();

    let depth_stencil_attachment =
        targets
            .depth
            .as_ref()
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: convert::depth_load(action.depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: targets.stencil.then(|| wgpu::Operations {
                    load: convert::stencil_load(action.stencil),
                    store: wgpu::StoreOp::Store,
                }),
            });

    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("tessera pass"),
        color_attachments: &colors,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    for cmd in commands {
        match cmd {
            Recorded::Viewport { x, y, w, h } => rpass.set_viewport(*x, *y, *w, *h, 0.0, 1.0),
            Recorded::Scissor { x, y, w, h } => rpass.set_scissor_rect(*x, *y, *w, *h),
            Recorded::Pipeline {
                pipeline,
                stencil_ref,
                blend_color,
            } => {
                rpass.set_pipeline(pipeline);
                rpass.set_stencil_reference(*stencil_ref);
                rpass.set_blend_constant(*blend_color);
            }
            Recorded::BindGroup {
                index,
                group,
                offsets,
            } => rpass.set_bind_group(*index, group, offsets),
            Recorded::VertexBuffer {
                slot,
                buffer,
                offset,
            } => rpass.set_vertex_buffer(*slot, buffer.slice(*offset..)),
            Recorded::IndexBuffer {
                buffer,
                format,
                offset,
            } => rpass.set_index_buffer(buffer.slice(*offset..), *format),
            Recorded::Draw {
                indexed: true,
                base,
                count,
                instances,
            } => rpass.draw_indexed(*base..*base + *count, 0, 0..*instances),
            Recorded::Draw {
                indexed: false,
                base,
                count,
                instances,
            } => rpass.draw(*base..*base + *count, 0..*instances),
        }
    }
}
