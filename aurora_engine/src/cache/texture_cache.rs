/// TextureCache - decoded, uploaded textures shared by path
///
/// A miss decodes the file to RGBA8, rejects non-power-of-two sizes, flips
/// rows so the first row is the bottom of the image, then uploads through a
/// staging buffer with a one-shot command buffer on the graphics queue. The
/// upload waits on a fence with an explicit timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotmap::new_key_type;

use crate::device_context::DeviceContext;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, BufferUsage, Command, CommandBufferHandle, CommandPoolHandle, Extent2D,
    FenceHandle, FenceStatus, ImageAspect, ImageBarrier, ImageLayout, ImageUsage, ImageViewHandle,
    MemoryProperty, PipelineStage, SubmitInfo, TextureFormat,
};
use crate::memory::{GpuAllocator, Image};
use crate::{engine_debug, engine_error, engine_warn};
use super::ref_counted_cache::RefCountedCache;

new_key_type! {
    /// Handle to a cached texture
    pub struct TextureHandle;
}

/// Texel format of every cached texture
pub const TEXTURE_FORMAT: TextureFormat = TextureFormat::R8G8B8A8_SRGB;

// ===== DECODING =====

/// RGBA8 pixels ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decode an image file into bottom-up RGBA8 rows
///
/// # Errors
///
/// `Error::TextureDecode` if the file cannot be read or decoded, or if either
/// dimension is not a power of two.
pub fn decode_texture(path: &Path) -> Result<DecodedTexture> {
    let fail = |message: String| {
        engine_error!("aurora::TextureCache", "Cannot load texture '{}': {}", path.display(), message);
        Error::TextureDecode { path: path.to_path_buf(), message }
    };

    let mut rgba = image::open(path).map_err(|e| fail(e.to_string()))?.into_rgba8();
    let (width, height) = rgba.dimensions();

    if !width.is_power_of_two() || !height.is_power_of_two() {
        return Err(fail(format!("{}x{} is not a power-of-two size", width, height)));
    }

    image::imageops::flip_vertical_in_place(&mut rgba);

    Ok(DecodedTexture { width, height, pixels: rgba.into_raw() })
}

/// Path used as the cache key: canonical when the file exists
fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// ===== TEXTURE =====

#[derive(Debug)]
pub struct Texture {
    path: PathBuf,
    image: Image,
}

impl Texture {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn view(&self) -> ImageViewHandle {
        self.image.view()
    }

    pub fn extent(&self) -> Extent2D {
        self.image.extent()
    }
}

// ===== CACHE =====

/// Driver objects for one-shot uploads
struct Uploader {
    context: Arc<DeviceContext>,
    command_pool: CommandPoolHandle,
    command_buffer: CommandBufferHandle,
    fence: FenceHandle,
    timeout_ns: u64,
}

pub struct TextureCache {
    allocator: GpuAllocator,
    uploader: Uploader,
    textures: RefCountedCache<PathBuf, TextureHandle, Texture>,
}

impl TextureCache {
    /// Create the cache and its upload command pool/fence on the graphics family
    pub fn new(allocator: GpuAllocator, upload_timeout_ns: u64) -> Result<Self> {
        let context = allocator.context().clone();
        let device = context.device();

        let command_pool = device.create_command_pool(context.graphics().family_index)?;
        let command_buffer = match device.allocate_command_buffer(command_pool) {
            Ok(cb) => cb,
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        let fence = match device.create_fence(false) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        };

        Ok(Self {
            allocator,
            uploader: Uploader { context, command_pool, command_buffer, fence, timeout_ns: upload_timeout_ns },
            textures: RefCountedCache::new(),
        })
    }

    /// Get (or load) the texture at `path`
    ///
    /// # Errors
    ///
    /// `Error::TextureDecode` for unreadable or non-power-of-two files, or the
    /// upload's error. Nothing is cached for the path on failure, so a later
    /// call with a fixed file retries.
    pub fn acquire(&mut self, path: &Path) -> Result<TextureHandle> {
        let key = normalize_path(path);
        let allocator = &self.allocator;
        let uploader = &self.uploader;

        self.textures.acquire_with(key, |key| {
            let decoded = decode_texture(key)?;
            let image = uploader.upload(allocator, &decoded).map_err(|e| {
                engine_error!("aurora::TextureCache", "Upload of '{}' failed: {}", key.display(), e);
                e
            })?;

            engine_debug!(
                "aurora::TextureCache",
                "Loaded '{}' ({}x{})",
                key.display(), decoded.width, decoded.height
            );
            Ok(Texture { path: key.clone(), image })
        })
    }

    /// Drop one reference; the image is destroyed at zero
    ///
    /// Releasing a handle that is not live is a caller bug: it is logged and
    /// otherwise ignored.
    pub fn release(&mut self, handle: TextureHandle) {
        match self.textures.release(handle) {
            Ok(Some(texture)) => {
                engine_debug!("aurora::TextureCache", "Evicted '{}'", texture.path.display());
            }
            Ok(None) => {}
            Err(e) => {
                engine_error!("aurora::TextureCache", "{}", e);
            }
        }
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle)
    }

    pub fn refcount(&self, handle: TextureHandle) -> Option<u32> {
        self.textures.refcount(handle)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.textures.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Number of decode + upload operations so far
    pub fn creations(&self) -> u64 {
        self.textures.creations()
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        let remaining = self.textures.drain();
        if !remaining.is_empty() {
            engine_warn!("aurora::TextureCache", "{} textures still referenced at shutdown", remaining.len());
        }
        drop(remaining);

        let device = self.uploader.context.device();
        device.destroy_fence(self.uploader.fence);
        device.destroy_command_pool(self.uploader.command_pool);
    }
}

impl Uploader {
    fn upload(&self, allocator: &GpuAllocator, decoded: &DecodedTexture) -> Result<Image> {
        let device = self.context.device();
        let graphics = self.context.graphics();
        let extent = Extent2D::new(decoded.width, decoded.height);

        let mut staging = allocator.create_buffer(
            decoded.pixels.len() as u64,
            BufferUsage::TRANSFER_SRC,
            MemoryProperty::host_visible(),
            graphics.family_index,
        )?;
        staging.write(0, &decoded.pixels)?;

        let image = allocator.create_image(
            TEXTURE_FORMAT,
            ImageAspect::COLOR,
            ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
            extent,
            graphics.family_index,
        )?;

        let commands = [
            Command::ImageBarrier(ImageBarrier::transition(
                image.handle(),
                ImageAspect::COLOR,
                ImageLayout::Undefined,
                ImageLayout::TransferDst,
                (PipelineStage::TOP_OF_PIPE, AccessFlags::empty()),
                (PipelineStage::TRANSFER, AccessFlags::TRANSFER_WRITE),
            )),
            Command::CopyBufferToImage { src: staging.handle(), dst: image.handle(), extent },
            Command::ImageBarrier(ImageBarrier::transition(
                image.handle(),
                ImageAspect::COLOR,
                ImageLayout::TransferDst,
                ImageLayout::ShaderReadOnly,
                (PipelineStage::TRANSFER, AccessFlags::TRANSFER_WRITE),
                (PipelineStage::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
            )),
        ];

        device.reset_command_pool(self.command_pool)?;
        device.record_commands(self.command_buffer, &commands)?;
        device.reset_fence(self.fence)?;
        device.queue_submit(
            graphics.queue,
            &SubmitInfo {
                waits: &[],
                command_buffers: &[self.command_buffer],
                signals: &[],
                fence: Some(self.fence),
            },
        )?;

        match device.wait_for_fence(self.fence, self.timeout_ns)? {
            FenceStatus::Signaled => Ok(image),
            FenceStatus::Timeout => {
                // The copy may still be reading staging; drain before both drop
                engine_warn!(
                    "aurora::TextureCache",
                    "Upload fence timed out after {} ns, waiting for device idle",
                    self.timeout_ns
                );
                device.wait_idle()?;
                Err(Error::BackendError(format!("texture upload timed out after {} ns", self.timeout_ns)))
            }
        }
    }
}

#[cfg(test)]
#[path = "texture_cache_tests.rs"]
mod tests;
