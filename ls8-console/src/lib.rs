//! The LS-8 console system
//!
//! Everything the machine core treats as an external collaborator lives
//! here: the console output device driven by `PRN`, and the loader for
//! textual program images.
#![warn(missing_docs)]

mod console;
mod load;

pub use console::Console;
pub use load::{parse_image, read_image};
