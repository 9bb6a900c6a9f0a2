pub mod comment;
pub mod envelope;
pub mod error;
pub mod file;
pub mod resource;
pub mod task;
pub mod validate;

pub use comment::Comment;
pub use envelope::Envelope;
pub use error::TaskfyError;
pub use resource::Resource;
pub use task::{Task, TaskStatus};
