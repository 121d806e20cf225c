/// Frame module - scene input, per-object GPU state and the frame protocol

pub mod scene;
pub mod ownership;
pub mod render_object;
pub mod frame_orchestrator;

pub use scene::{
    Material, MaterialUniform, MeshData, SceneObject, Vertex, FLAG_ALPHA_BLEND, FLAG_HAS_TEXTURE,
};
pub use ownership::OwnershipTransfer;
pub use render_object::RenderObject;
pub use frame_orchestrator::{
    FrameOrchestrator, FrameOutcome, FrameState, FrameStats, SkipReason, DEPTH_FORMAT,
    FRAMES_IN_FLIGHT, PUSH_CONSTANT_SIZE,
};
