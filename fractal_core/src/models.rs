pub mod color;
pub mod image;
pub mod io;

pub use color::Color;
pub use image::IndexedImage;
pub use io::{
    ByteSink, ByteSource, ImageIOError, ImageWriterOptions, Interrupt, NeverInterrupt, PixelSink, PixelSource,
};
