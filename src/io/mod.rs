pub mod display;
pub mod reader;
pub mod writer;

pub use reader::read_matrix;
pub use writer::{OutputWriter, format_double};
