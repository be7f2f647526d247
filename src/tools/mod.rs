pub mod context;
pub mod registry;
pub mod schema;
pub mod smart_home;

pub use context::TurnContext;
pub use registry::ToolRegistry;
pub use schema::{ParamSpec, ParamType, ToolArgs, ToolDecl};
