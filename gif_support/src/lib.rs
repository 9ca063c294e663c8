#[macro_use]
extern crate log;
extern crate custom_error;

pub mod bits;
pub mod common;
pub mod errors;
pub mod extensions;
pub mod hash_table;
pub mod info;
pub mod lzw;
pub mod packet;
pub mod reader;
pub mod writer;

pub use common::ColorTable;
pub use errors::GIFError;
pub use info::{CalcStatus, FractalInfo, FractalMetadata};
pub use reader::{DecodedGIF, GIFReader};
pub use writer::{EncodeOutcome, GIFWriter};
