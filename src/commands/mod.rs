pub mod display;
pub mod extract;
pub mod info;
pub mod preview;
pub mod shell;
