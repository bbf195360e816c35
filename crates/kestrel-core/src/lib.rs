pub mod color;
pub mod error;
pub mod id;
pub mod logging;
pub mod task;
pub mod transform;
pub mod uri;
pub mod util;

pub use {
    color::{HdrRgba, Rgba},
    error::{Error, Result},
    id::Id,
    logging::LogFilter,
    task::{Task, TaskProgress, TaskStatus},
    transform::Transform,
    uri::Uri,
};
