//! The render side of a worker: scene cache, view state, pump loop and the pipeline that ties
//! them together, plus the thread that owns it all.

pub mod events;
pub mod handle;
pub mod pipeline;
pub mod pump;
pub mod scene_cache;
pub mod view;

pub use events::{PipelineCommand, RequestId};
pub use handle::PipelineHandle;
pub use pipeline::RenderPipeline;
pub use scene_cache::{ResolvedScene, SceneCache};
