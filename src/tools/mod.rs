//! 工具层：注册表、调用器与四个旅行搜索工具

pub mod attractions;
pub mod flights;
pub mod geocode;
pub mod hotels;
pub mod invoker;
pub mod provider;
pub mod registry;

pub use attractions::AttractionSearchTool;
pub use flights::FlightSearchTool;
pub use geocode::GeocodeTool;
pub use hotels::HotelSearchTool;
pub use invoker::{ToolErrorKind, ToolInvocation, ToolInvoker, ToolOutcome};
pub use registry::{parse_args, Tool, ToolDescriptor, ToolError, ToolRegistry};
