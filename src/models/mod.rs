pub mod direction;
pub mod opportunity;
pub mod session;
pub mod timeframe;

pub use direction::*;
pub use opportunity::Opportunity;
pub use session::Session;
pub use timeframe::Timeframe;
