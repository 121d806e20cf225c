/// RenderObject - GPU state for one scene object
///
/// Built by `setup_scene` and replaced wholesale by the next one. Holds the
/// object's scene index instead of a reference; the mesh and transform are
/// looked up in the slice handed to each `draw_frame`.

use glam::Mat4;

use crate::cache::{ShaderProgramHandle, TextureHandle};
use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, BufferCopy, Command, DescriptorSetHandle, IndexType, PipelineStage,
    ShaderStageFlags,
};
use crate::memory::Buffer;
use crate::shader::Pipeline;
use super::ownership::OwnershipTransfer;
use super::scene::{MaterialUniform, MeshData};

pub struct RenderObject {
    pub(super) scene_index: usize,
    pub(super) program: ShaderProgramHandle,
    pub(super) texture: Option<TextureHandle>,
    pub(super) pipeline_index: usize,
    pub(super) vertex_buffer: Buffer,
    pub(super) index_buffer: Buffer,
    pub(super) uniform_buffer: Buffer,
    /// Vertex, index and uniform payloads back to back
    pub(super) staging: Buffer,
    pub(super) descriptor_set: DescriptorSetHandle,
    pub(super) index_count: u32,
}

impl RenderObject {
    pub fn scene_index(&self) -> usize {
        self.scene_index
    }

    pub fn program(&self) -> ShaderProgramHandle {
        self.program
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn pipeline_index(&self) -> usize {
        self.pipeline_index
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    pub fn uniform_buffer(&self) -> &Buffer {
        &self.uniform_buffer
    }

    pub fn staging_buffer(&self) -> &Buffer {
        &self.staging
    }

    pub fn descriptor_set(&self) -> DescriptorSetHandle {
        self.descriptor_set
    }

    fn index_offset(&self) -> u64 {
        self.vertex_buffer.size()
    }

    fn uniform_offset(&self) -> u64 {
        self.vertex_buffer.size() + self.index_buffer.size()
    }

    /// Copy this frame's host payload into the staging buffer
    ///
    /// Only valid once the previous transfer reading the staging buffer has
    /// completed (transfer fence signaled).
    pub fn write_staging(&mut self, mesh: &MeshData) -> Result<()> {
        let vertex_bytes = mesh.vertex_bytes();
        let index_bytes = mesh.index_bytes();
        if vertex_bytes.len() as u64 != self.vertex_buffer.size()
            || index_bytes.len() as u64 != self.index_buffer.size()
        {
            return Err(Error::InvalidResource(format!(
                "scene object {} changed size since setup ({} + {} bytes, expected {} + {})",
                self.scene_index,
                vertex_bytes.len(),
                index_bytes.len(),
                self.vertex_buffer.size(),
                self.index_buffer.size()
            )));
        }

        let uniform: MaterialUniform = mesh.material.uniform();
        let index_offset = self.index_offset();
        let uniform_offset = self.uniform_offset();
        self.staging.write(0, vertex_bytes)?;
        self.staging.write(index_offset, index_bytes)?;
        self.staging.write_pod(uniform_offset, &uniform)?;
        Ok(())
    }

    /// Transfers for vertex, index and uniform buffers, in that order
    pub fn ownership_transfers(&self, src_family: u32, dst_family: u32) -> [OwnershipTransfer; 3] {
        let whole = |buffer: &Buffer, stage, access| {
            OwnershipTransfer::new(buffer.handle(), 0, buffer.size(), src_family, dst_family, stage, access)
        };
        [
            whole(&self.vertex_buffer, PipelineStage::VERTEX_INPUT, AccessFlags::VERTEX_ATTRIBUTE_READ),
            whole(&self.index_buffer, PipelineStage::VERTEX_INPUT, AccessFlags::INDEX_READ),
            whole(
                &self.uniform_buffer,
                PipelineStage::VERTEX_SHADER | PipelineStage::FRAGMENT_SHADER,
                AccessFlags::UNIFORM_READ,
            ),
        ]
    }

    /// Staging copies followed by the release half of each transfer
    pub fn transfer_commands(&self, transfers: &[OwnershipTransfer; 3]) -> Vec<Command> {
        let copies = [
            (0, &self.vertex_buffer),
            (self.index_offset(), &self.index_buffer),
            (self.uniform_offset(), &self.uniform_buffer),
        ];

        let mut commands = Vec::with_capacity(6);
        for (src_offset, dst) in copies {
            commands.push(Command::CopyBuffer {
                src: self.staging.handle(),
                dst: dst.handle(),
                region: BufferCopy { src_offset, dst_offset: 0, size: dst.size() },
            });
        }
        commands.extend(transfers.iter().map(|t| Command::BufferBarrier(t.release())));
        commands
    }

    /// Bind, push `mvp` and draw
    pub fn draw_commands(&self, pipeline: &Pipeline, mvp: &Mat4) -> [Command; 6] {
        [
            Command::BindPipeline(pipeline.handle()),
            Command::BindDescriptorSet {
                layout: pipeline.layout(),
                set_index: 0,
                set: self.descriptor_set,
            },
            Command::BindVertexBuffer { binding: 0, buffer: self.vertex_buffer.handle() },
            Command::BindIndexBuffer { buffer: self.index_buffer.handle(), index_type: IndexType::U32 },
            Command::PushConstants {
                layout: pipeline.layout(),
                stages: ShaderStageFlags::VERTEX,
                offset: 0,
                data: bytemuck::bytes_of(mvp).to_vec(),
            },
            Command::DrawIndexed { index_count: self.index_count },
        ]
    }
}

impl std::fmt::Debug for RenderObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderObject")
            .field("scene_index", &self.scene_index)
            .field("pipeline_index", &self.pipeline_index)
            .field("index_count", &self.index_count)
            .field("textured", &self.texture.is_some())
            .finish()
    }
}
