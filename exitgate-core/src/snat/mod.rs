pub mod controller;
pub mod mark;

pub use controller::SnatController;
pub use mark::mark_socket;
