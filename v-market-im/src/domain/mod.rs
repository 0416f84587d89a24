pub mod message;
pub mod participant;
pub mod thread;

pub use message::*;
pub use participant::*;
pub use thread::*;
