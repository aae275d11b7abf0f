//! Standard component library
//!
//! Collection of built-in components for common operations

pub mod boundary;
pub mod debug;
pub mod http;
pub mod math;
pub mod time;
pub mod transform;

pub use boundary::CatchNode;
pub use debug::DebugNode;
pub use http::HttpRequestNode;
pub use math::{AddNode, MultiplyNode};
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode};

use flowruntime::ComponentRegistry;

/// Register all standard components with a registry
pub fn register_all(registry: &mut ComponentRegistry) {
    registry.register(boundary::input());
    registry.register(boundary::output());
    registry.register(boundary::catch());
    registry.register(debug::log());
    registry.register(http::request());
    registry.register(math::add());
    registry.register(math::multiply());
    registry.register(transform::json_parse());
    registry.register(transform::json_stringify());
    registry.register(time::delay());
}

/// A registry holding every standard component
pub fn standard_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    register_all(&mut registry);
    registry
}
