pub mod dependency;
pub mod entity;

// Re-export core models for easy access
pub use dependency::{Dependency, DependencyType, DependencyView, NewDependency, TaskInfo};
pub use entity::{EntityKind, FeatureRecord, ProjectRecord, Status, StatusRole, TaskRecord};
