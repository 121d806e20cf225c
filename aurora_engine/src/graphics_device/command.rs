/// Recorded GPU commands
///
/// Command buffers are recorded in one call from a slice of [`Command`]s. The
/// backend translates each variant into the matching driver entry point.

use super::handles::*;
use super::types::*;

/// Region copied by [`Command::CopyBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Buffer memory barrier, optionally transferring queue-family ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
}

/// Image memory barrier with layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub aspect: ImageAspect,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
}

impl ImageBarrier {
    /// Layout transition without ownership transfer
    pub fn transition(
        image: ImageHandle,
        aspect: ImageAspect,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        (src_stage, src_access): (PipelineStage, AccessFlags),
        (dst_stage, dst_access): (PipelineStage, AccessFlags),
    ) -> Self {
        Self {
            image,
            aspect,
            old_layout,
            new_layout,
            src_stage,
            dst_stage,
            src_access,
            dst_access,
            src_queue_family: QUEUE_FAMILY_IGNORED,
            dst_queue_family: QUEUE_FAMILY_IGNORED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CopyBuffer {
        src: BufferHandle,
        dst: BufferHandle,
        region: BufferCopy,
    },
    BufferBarrier(BufferBarrier),
    ImageBarrier(ImageBarrier),
    /// Copy a tightly packed buffer into mip 0 / layer 0 of an image in TRANSFER_DST layout
    CopyBufferToImage {
        src: BufferHandle,
        dst: ImageHandle,
        extent: Extent2D,
    },
    BeginRendering {
        color_view: ImageViewHandle,
        depth_view: Option<ImageViewHandle>,
        extent: Extent2D,
        clear_color: [f32; 4],
        clear_depth: f32,
    },
    EndRendering,
    BindPipeline(PipelineHandle),
    BindDescriptorSet {
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    },
    BindVertexBuffer {
        binding: u32,
        buffer: BufferHandle,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        index_type: IndexType,
    },
    PushConstants {
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    DrawIndexed {
        index_count: u32,
    },
}
