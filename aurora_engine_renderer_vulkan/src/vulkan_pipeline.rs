/// Graphics pipeline creation for dynamic rendering
///
/// Viewport and scissor are baked into the pipeline; a swapchain extent change
/// therefore needs new pipelines.

use aurora_engine::aurora::device::GraphicsPipelineDesc;
use aurora_engine::aurora::{Error, Result};
use aurora_engine::engine_err;
use ash::vk;
use ash::vk::Handle;

use crate::vulkan_format::*;

/// Build the pipeline layout and pipeline for `desc`
///
/// The layout is destroyed again if pipeline creation fails.
///
/// # Safety
///
/// Every handle in `desc` must be alive and belong to `device`.
pub unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    desc: &GraphicsPipelineDesc,
) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
    // ========== LAYOUT ==========
    let set_layouts: Vec<vk::DescriptorSetLayout> = desc
        .set_layouts
        .iter()
        .map(|layout| vk::DescriptorSetLayout::from_raw(layout.0))
        .collect();

    let push_constant_ranges: Vec<vk::PushConstantRange> = desc
        .push_constant_ranges
        .iter()
        .map(|range| vk::PushConstantRange {
            stage_flags: shader_stages_to_vk(range.stages),
            offset: range.offset,
            size: range.size,
        })
        .collect();

    let layout_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_constant_ranges);

    let layout = device
        .create_pipeline_layout(&layout_info, None)
        .map_err(|e| engine_err!("aurora::vulkan", "Failed to create pipeline layout: {:?}", e))?;

    // ========== SHADER STAGES ==========
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vk::ShaderModule::from_raw(desc.vertex_module.0))
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(vk::ShaderModule::from_raw(desc.fragment_module.0))
            .name(c"main"),
    ];

    // ========== FIXED FUNCTION ==========
    let bindings: Vec<vk::VertexInputBindingDescription> = desc
        .vertex_bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: binding.binding,
            stride: binding.stride,
            input_rate: input_rate_to_vk(binding.input_rate),
        })
        .collect();

    let attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: attribute.binding,
            format: buffer_format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(desc.topology))
        .primitive_restart_enable(false);

    let viewports = [vk::Viewport {
        x: desc.viewport.x,
        y: desc.viewport.y,
        width: desc.viewport.width,
        height: desc.viewport.height,
        min_depth: desc.viewport.min_depth,
        max_depth: desc.viewport.max_depth,
    }];
    let scissors = [vk::Rect2D {
        offset: vk::Offset2D { x: desc.scissor.x, y: desc.scissor.y },
        extent: vk::Extent2D { width: desc.scissor.width, height: desc.scissor.height },
    }];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode_to_vk(desc.polygon_mode))
        .line_width(1.0)
        .cull_mode(cull_mode_to_vk(desc.cull_mode))
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_test_enable)
        .depth_write_enable(desc.depth_write_enable)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachment = {
        let attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(desc.blend_enable);
        if desc.blend_enable {
            attachment
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
        } else {
            attachment
        }
    };
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_attachment));

    // ========== DYNAMIC RENDERING ==========
    let color_formats = [texture_format_to_vk(desc.color_format)];
    let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&color_formats);
    if let Some(depth_format) = desc.depth_format {
        rendering_info = rendering_info.depth_attachment_format(texture_format_to_vk(depth_format));
    }

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .push_next(&mut rendering_info)
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .layout(layout);

    let pipeline = device
        .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        .map_err(|(_, e)| e)
        .and_then(|pipelines| pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN));

    match pipeline {
        Ok(pipeline) => Ok((pipeline, layout)),
        Err(e) => {
            device.destroy_pipeline_layout(layout, None);
            Err(match e {
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                    Error::OutOfMemory
                }
                other => engine_err!("aurora::vulkan", "Failed to create graphics pipeline: {:?}", other),
            })
        }
    }
}
