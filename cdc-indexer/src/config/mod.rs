//! Configuration and dependency wiring.

mod dependencies;
mod settings;
mod topic_map;

pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, Settings};
pub use topic_map::TopicHandlerMap;
