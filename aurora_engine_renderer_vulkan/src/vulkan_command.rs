/// Command buffer recording
///
/// Translates a recorded [`Command`] list into driver calls. The list is
/// checked first so that an ill-formed list never leaves a half-recorded
/// command buffer behind.

use aurora_engine::aurora::device::{Command, ImageAspect, PipelineStage};
use aurora_engine::aurora::{Error, Result};
use aurora_engine::engine_error;
use ash::vk;
use ash::vk::Handle;

use crate::vulkan_format::*;

/// Check rendering scopes and binding order of a command list
///
/// Draws and attachment-scoped commands must sit inside a
/// BeginRendering/EndRendering pair; transfers and barriers must sit outside
/// one; a draw needs a bound pipeline.
pub fn validate_commands(commands: &[Command]) -> Result<()> {
    let mut rendering = false;
    let mut pipeline_bound = false;

    for (i, command) in commands.iter().enumerate() {
        let fail = |message: &str| Err(Error::BackendError(format!("Command {}: {}", i, message)));
        match command {
            Command::BeginRendering { .. } => {
                if rendering {
                    return fail("BeginRendering inside an active rendering scope");
                }
                rendering = true;
            }
            Command::EndRendering => {
                if !rendering {
                    return fail("EndRendering without BeginRendering");
                }
                rendering = false;
            }
            Command::CopyBuffer { .. }
            | Command::CopyBufferToImage { .. }
            | Command::BufferBarrier(_)
            | Command::ImageBarrier(_) => {
                if rendering {
                    return fail("transfer or barrier inside a rendering scope");
                }
            }
            Command::BindPipeline(_) => pipeline_bound = true,
            Command::DrawIndexed { .. } => {
                if !rendering {
                    return fail("draw outside a rendering scope");
                }
                if !pipeline_bound {
                    return fail("draw without a bound pipeline");
                }
            }
            Command::BindDescriptorSet { .. }
            | Command::BindVertexBuffer { .. }
            | Command::BindIndexBuffer { .. }
            | Command::PushConstants { .. } => {}
        }
    }

    if rendering {
        return Err(Error::BackendError("Command list ends inside a rendering scope".to_string()));
    }
    Ok(())
}

fn src_stage_mask(stage: PipelineStage) -> vk::PipelineStageFlags {
    let mask = pipeline_stages_to_vk(stage);
    if mask.is_empty() { vk::PipelineStageFlags::TOP_OF_PIPE } else { mask }
}

fn dst_stage_mask(stage: PipelineStage) -> vk::PipelineStageFlags {
    let mask = pipeline_stages_to_vk(stage);
    if mask.is_empty() { vk::PipelineStageFlags::BOTTOM_OF_PIPE } else { mask }
}

fn full_range(aspect: ImageAspect) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: image_aspect_to_vk(aspect),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Begin `command_buffer` as one-time-submit, record `commands`, end it
///
/// # Safety
///
/// `command_buffer` must come from `device`, be in the initial state and not
/// be in use by the GPU. Every handle in `commands` must be alive.
pub unsafe fn record(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    commands: &[Command],
) -> Result<()> {
    validate_commands(commands)?;

    let begin_info = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    device.begin_command_buffer(command_buffer, &begin_info).map_err(|e| {
        engine_error!("aurora::vulkan", "Failed to begin command buffer: {:?}", e);
        Error::BackendError(format!("Failed to begin command buffer: {:?}", e))
    })?;

    for command in commands {
        record_one(device, command_buffer, command);
    }

    device.end_command_buffer(command_buffer).map_err(|e| {
        engine_error!("aurora::vulkan", "Failed to end command buffer: {:?}", e);
        Error::BackendError(format!("Failed to end command buffer: {:?}", e))
    })
}

unsafe fn record_one(device: &ash::Device, cb: vk::CommandBuffer, command: &Command) {
    match command {
        Command::CopyBuffer { src, dst, region } => {
            let copy = vk::BufferCopy {
                src_offset: region.src_offset,
                dst_offset: region.dst_offset,
                size: region.size,
            };
            device.cmd_copy_buffer(cb, vk::Buffer::from_raw(src.0), vk::Buffer::from_raw(dst.0), &[copy]);
        }

        Command::BufferBarrier(barrier) => {
            let vk_barrier = vk::BufferMemoryBarrier::default()
                .src_access_mask(access_to_vk(barrier.src_access))
                .dst_access_mask(access_to_vk(barrier.dst_access))
                .src_queue_family_index(queue_family_to_vk(barrier.src_queue_family))
                .dst_queue_family_index(queue_family_to_vk(barrier.dst_queue_family))
                .buffer(vk::Buffer::from_raw(barrier.buffer.0))
                .offset(barrier.offset)
                .size(barrier.size);
            device.cmd_pipeline_barrier(
                cb,
                src_stage_mask(barrier.src_stage),
                dst_stage_mask(barrier.dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[vk_barrier],
                &[],
            );
        }

        Command::ImageBarrier(barrier) => {
            let vk_barrier = vk::ImageMemoryBarrier::default()
                .src_access_mask(access_to_vk(barrier.src_access))
                .dst_access_mask(access_to_vk(barrier.dst_access))
                .old_layout(image_layout_to_vk(barrier.old_layout))
                .new_layout(image_layout_to_vk(barrier.new_layout))
                .src_queue_family_index(queue_family_to_vk(barrier.src_queue_family))
                .dst_queue_family_index(queue_family_to_vk(barrier.dst_queue_family))
                .image(vk::Image::from_raw(barrier.image.0))
                .subresource_range(full_range(barrier.aspect));
            device.cmd_pipeline_barrier(
                cb,
                src_stage_mask(barrier.src_stage),
                dst_stage_mask(barrier.dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[vk_barrier],
            );
        }

        Command::CopyBufferToImage { src, dst, extent } => {
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D { width: extent.width, height: extent.height, depth: 1 },
            };
            device.cmd_copy_buffer_to_image(
                cb,
                vk::Buffer::from_raw(src.0),
                vk::Image::from_raw(dst.0),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        Command::BeginRendering { color_view, depth_view, extent, clear_color, clear_depth } => {
            let color = [vk::RenderingAttachmentInfo::default()
                .image_view(vk::ImageView::from_raw(color_view.0))
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue { float32: *clear_color },
                })];

            let depth = depth_view.map(|view| {
                vk::RenderingAttachmentInfo::default()
                    .image_view(vk::ImageView::from_raw(view.0))
                    .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .clear_value(vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue { depth: *clear_depth, stencil: 0 },
                    })
            });

            let mut rendering_info = vk::RenderingInfo::default()
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent: extent_to_vk(*extent),
                })
                .layer_count(1)
                .color_attachments(&color);
            if let Some(depth) = depth.as_ref() {
                rendering_info = rendering_info.depth_attachment(depth);
            }

            device.cmd_begin_rendering(cb, &rendering_info);
        }

        Command::EndRendering => device.cmd_end_rendering(cb),

        Command::BindPipeline(pipeline) => {
            device.cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, vk::Pipeline::from_raw(pipeline.0));
        }

        Command::BindDescriptorSet { layout, set_index, set } => {
            device.cmd_bind_descriptor_sets(
                cb,
                vk::PipelineBindPoint::GRAPHICS,
                vk::PipelineLayout::from_raw(layout.0),
                *set_index,
                &[vk::DescriptorSet::from_raw(set.0)],
                &[],
            );
        }

        Command::BindVertexBuffer { binding, buffer } => {
            device.cmd_bind_vertex_buffers(cb, *binding, &[vk::Buffer::from_raw(buffer.0)], &[0]);
        }

        Command::BindIndexBuffer { buffer, index_type } => {
            device.cmd_bind_index_buffer(cb, vk::Buffer::from_raw(buffer.0), 0, index_type_to_vk(*index_type));
        }

        Command::PushConstants { layout, stages, offset, data } => {
            device.cmd_push_constants(
                cb,
                vk::PipelineLayout::from_raw(layout.0),
                shader_stages_to_vk(*stages),
                *offset,
                data,
            );
        }

        Command::DrawIndexed { index_count } => {
            device.cmd_draw_indexed(cb, *index_count, 1, 0, 0, 0);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_tests.rs"]
mod tests;
