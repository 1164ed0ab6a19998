pub mod extract;
pub mod preview;
