/// Reference-counted caches for shader programs and textures

pub mod ref_counted_cache;
pub mod shader_cache;
pub mod texture_cache;

pub use ref_counted_cache::RefCountedCache;
pub use shader_cache::{ShaderCache, ShaderProgram, ShaderProgramHandle, ShaderProgramKey};
pub use texture_cache::{decode_texture, DecodedTexture, Texture, TextureCache, TextureHandle, TEXTURE_FORMAT};
