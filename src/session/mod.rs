//! 会话层：偏好模型、上下文状态与存储抽象

pub mod context;
pub mod preferences;
pub mod store;

pub use context::{
    ContextUpdate, ConversationTurn, HistoryLimits, SearchKind, SearchRecord, SessionContext,
};
pub use preferences::{
    Budget, CabinClass, DepartureWindow, FlightPreferences, HotelPreferences, PreferenceDelta,
    ScalarUpdate, SeatPreference, TravelPreferences, TravelStyle,
};
pub use store::{ContextStore, MemoryContextStore, StoreError};
