pub mod actions;
pub mod config;
pub mod events;
pub mod form;
pub mod reducer;
pub mod state;
pub mod view;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use events::decode_event;
pub use events::RunEvent;
