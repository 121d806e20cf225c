/// GPU memory: allocator and RAII buffer/image wrappers

pub mod allocator;
pub mod buffer;
pub mod image;

pub use allocator::GpuAllocator;
pub use buffer::Buffer;
pub use image::Image;
