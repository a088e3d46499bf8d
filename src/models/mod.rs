pub mod coords;
pub mod record;
pub mod session_view;
