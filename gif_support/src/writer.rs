use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use fractal_core::models::{ByteSink, ImageIOError, ImageWriterOptions, Interrupt, NeverInterrupt, PixelSource};

use crate::{
    bits::BitPacker,
    common::{
        start_bits, ColorTable, COLOR_RESOLUTION_BITS, FLAG_GLOBAL_COLOR_TABLE, HEADER_SIZE,
        IMAGE_DESCRIPTOR_SIZE, IMAGE_SEPARATOR, PIXEL_PACKET_SIZE, SIGNATURE_GIF87A, SIGNATURE_GIF89A,
        TRAILER,
    },
    errors::GIFError,
    extensions::write_extensions,
    info::FractalMetadata,
    lzw::{Compressor, CompressorStats},
    packet::PacketFramer,
};

/// Plain GIF87a output: no aspect byte and no extension blocks.
pub const OPTION_GIF87A: &str = "gif87a";
/// Store 16 bit continuous potential: every row is followed by the low-order bytes.
pub const OPTION_POTENTIAL_16BIT: &str = "potential_16bit";
/// Height to width ratio of the rendered area, used for the pixel aspect byte.
pub const OPTION_FINAL_ASPECT_RATIO: &str = "final_aspect_ratio";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Header,
    ScreenDescriptor,
    ColorTable,
    ImageDescriptor,
    CompressedPayload,
    ExtensionBlocks,
    Terminator,
}

impl fmt::Display for Stage {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Header => "header",
            Stage::ScreenDescriptor => "screen descriptor",
            Stage::ColorTable => "color table",
            Stage::ImageDescriptor => "image descriptor",
            Stage::CompressedPayload => "compressed payload",
            Stage::ExtensionBlocks => "extension blocks",
            Stage::Terminator => "terminator",
        };

        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncodeOutcome {
    pub rows_written: usize,
    pub interrupted: bool,
    pub stats: CompressorStats,
    pub extension_bytes: usize,
}

struct WriterSettings {
    legacy: bool,
    potential_16bit: bool,
    final_aspect_ratio: f64,
}

pub struct GIFWriter {
}

impl GIFWriter {

    pub fn new() -> Self {
        GIFWriter {
        }
    }

    pub fn write(
        &self,
        source: &dyn PixelSource,
        color_table: &ColorTable,
        metadata: &FractalMetadata,
        sink: &mut dyn ByteSink,
        options: &ImageWriterOptions,
        interrupt: &mut dyn Interrupt,
    ) -> Result<EncodeOutcome, GIFError> {
        let settings = settings_from_options(source, options)?;
        let color_table = effective_color_table(color_table);

        let width = source.width();
        let height = source.height();
        let stored_width = if settings.potential_16bit { width * 2 } else { width };

        if stored_width > u16::MAX as usize || height > u16::MAX as usize {
            return Err(GIFError::InvalidImage {
                description: format!("image of {}x{} does not fit gif dimensions", stored_width, height),
            });
        }

        let aspect = if settings.legacy {
            0
        } else {
            aspect_byte(width, height, settings.final_aspect_ratio)
        };

        debug!("writing {}x{} image, {} colors", stored_width, height, color_table.colors.len());

        in_stage(Stage::Header, write_header(sink, settings.legacy))?;
        in_stage(
            Stage::ScreenDescriptor,
            write_screen_descriptor(sink, stored_width, height, &color_table, aspect),
        )?;
        in_stage(Stage::ColorTable, write_color_table(sink, &color_table))?;
        in_stage(Stage::ImageDescriptor, write_image_descriptor(sink, stored_width, height))?;

        let (rows_written, interrupted, stats) = in_stage(
            Stage::CompressedPayload,
            write_image_data(sink, source, &color_table, settings.potential_16bit, interrupt),
        )?;

        let extension_bytes = if settings.legacy {
            0
        } else {
            in_stage(
                Stage::ExtensionBlocks,
                write_extensions(sink, metadata, interrupted, settings.potential_16bit),
            )?
        };

        in_stage(Stage::Terminator, write_bytes(sink, &[TRAILER]))?;

        if interrupted {
            info!("save interrupted after {} of {} rows", rows_written, height);
        }

        Ok(EncodeOutcome {
            rows_written,
            interrupted,
            stats,
            extension_bytes,
        })
    }

    pub fn write_to_vec(
        &self,
        source: &dyn PixelSource,
        color_table: &ColorTable,
        metadata: &FractalMetadata,
        options: &ImageWriterOptions,
    ) -> Result<Vec<u8>, GIFError> {
        let mut data: Vec<u8> = Vec::new();
        self.write(source, color_table, metadata, &mut data, options, &mut NeverInterrupt)?;
        Ok(data)
    }
}

fn settings_from_options(source: &dyn PixelSource, options: &ImageWriterOptions) -> Result<WriterSettings, GIFError> {
    let invalid_options = |err: ImageIOError| GIFError::InvalidImage {
        description: format!("invalid writer options: {}", err),
    };

    let legacy = options.get_bool(OPTION_GIF87A, false).map_err(invalid_options)?;
    let potential_16bit = options.get_bool(OPTION_POTENTIAL_16BIT, false).map_err(invalid_options)?;
    let final_aspect_ratio = match options.get_f64(OPTION_FINAL_ASPECT_RATIO).map_err(invalid_options)? {
        Some(v) => v,
        None if source.width() > 0 => source.height() as f64 / source.width() as f64,
        None => 0.0,
    };

    Ok(WriterSettings {
        legacy,
        potential_16bit,
        final_aspect_ratio,
    })
}

fn in_stage<T>(stage: Stage, result: Result<T, GIFError>) -> Result<T, GIFError> {
    result.map_err(|err| {
        debug!("{} stage failed", stage);

        match err {
            GIFError::FailedToWrite { description } => GIFError::FailedToWrite {
                description: format!("{}: {}", stage, description),
            },
            GIFError::FailedToRead { description } => GIFError::FailedToRead {
                description: format!("{}: {}", stage, description),
            },
            GIFError::InvalidHeader { description } => GIFError::InvalidHeader {
                description: format!("{}: {}", stage, description),
            },
            GIFError::InvalidBlock { description } => GIFError::InvalidBlock {
                description: format!("{}: {}", stage, description),
            },
            GIFError::InvalidImage { description } => GIFError::InvalidImage {
                description: format!("{}: {}", stage, description),
            },
            GIFError::NotImplemented { description } => GIFError::NotImplemented {
                description: format!("{}: {}", stage, description),
            },
        }
    })
}

fn write_bytes(sink: &mut dyn ByteSink, data: &[u8]) -> Result<(), GIFError> {
    sink.write_bytes(data).map_err(|err| GIFError::FailedToWrite {
        description: err.to_string(),
    })
}

/// Two-color images always get a black and white table.
fn effective_color_table(color_table: &ColorTable) -> ColorTable {
    if color_table.colors.len() <= 2 {
        ColorTable::black_and_white()
    } else {
        color_table.clone()
    }
}

fn write_header(sink: &mut dyn ByteSink, legacy: bool) -> Result<(), GIFError> {
    write_bytes(sink, if legacy {
        SIGNATURE_GIF87A
    } else {
        SIGNATURE_GIF89A
    })
}

fn write_screen_descriptor(
    sink: &mut dyn ByteSink,
    width: usize,
    height: usize,
    color_table: &ColorTable,
    aspect: u8,
) -> Result<(), GIFError> {
    let mut data: Vec<u8> = vec![0 as u8; HEADER_SIZE - 6];

    LittleEndian::write_u16(&mut data[0..2], width as u16);
    LittleEndian::write_u16(&mut data[2..4], height as u16);

    let mut packed: u8 = FLAG_GLOBAL_COLOR_TABLE;
    packed = packed | ((COLOR_RESOLUTION_BITS - 1) << 4);
    packed = packed | (color_table.bits_per_pixel() - 1);
    data[4] = packed;

    // data[5] is the background color, index 0
    data[6] = aspect;

    trace!("screen descriptor packed: {:#010b}, aspect byte: {}", data[4], data[6]);

    write_bytes(sink, &data)
}

/// Pixel aspect ratio as stored in the screen descriptor, relative to the
/// aspect of the pixel grid itself.
pub fn aspect_byte(width: usize, height: usize, final_aspect_ratio: f64) -> u8 {
    if width == 0 || height == 0 || !(final_aspect_ratio > 0.0) {
        return 0;
    }

    let value = ((height as f64 / width as f64) / final_aspect_ratio * 64.0 - 14.5).round();

    if value < 1.0 {
        1
    } else if value > 255.0 {
        255
    } else {
        value as u8
    }
}

fn write_color_table(sink: &mut dyn ByteSink, color_table: &ColorTable) -> Result<(), GIFError> {
    let mut data = Vec::new();

    for color in color_table.padded() {
        data.push(color.red);
        data.push(color.green);
        data.push(color.blue);
    }

    write_bytes(sink, &data)
}

fn write_image_descriptor(sink: &mut dyn ByteSink, width: usize, height: usize) -> Result<(), GIFError> {
    let mut data: Vec<u8> = vec![0 as u8; IMAGE_DESCRIPTOR_SIZE];
    data[0] = IMAGE_SEPARATOR;

    LittleEndian::write_u16(&mut data[1..3], 0); // left
    LittleEndian::write_u16(&mut data[3..5], 0); // top
    LittleEndian::write_u16(&mut data[5..7], width as u16);
    LittleEndian::write_u16(&mut data[7..9], height as u16);

    data[9] = 0; // no local color table, not interlaced

    write_bytes(sink, &data)
}

fn write_image_data(
    sink: &mut dyn ByteSink,
    source: &dyn PixelSource,
    color_table: &ColorTable,
    potential_16bit: bool,
    interrupt: &mut dyn Interrupt,
) -> Result<(usize, bool, CompressorStats), GIFError> {
    let start_bits = start_bits(color_table.colors.len());
    write_bytes(sink, &[start_bits - 1])?;

    let width = source.width();
    let height = source.height();

    let mut rows_written = 0;
    let mut interrupted = false;

    let stats = {
        let packer = BitPacker::new(PacketFramer::new(sink, PIXEL_PACKET_SIZE));
        let mut compressor = Compressor::start(packer, start_bits)?;

        for y in 0..height {
            compress_row(&mut compressor, source, width, y)?;
            if potential_16bit {
                compress_row(&mut compressor, source, width, y + height)?;
            }
            rows_written += 1;

            if rows_written < height && interrupt.requested(rows_written) {
                interrupted = true;
                break;
            }
        }

        let (packer, stats) = compressor.finish()?;
        packer.into_framer().finish()?;

        stats
    };

    Ok((rows_written, interrupted, stats))
}

fn compress_row(
    compressor: &mut Compressor<BitPacker>,
    source: &dyn PixelSource,
    width: usize,
    y: usize,
) -> Result<(), GIFError> {
    for x in 0..width {
        let pixel = source.read_pixel(x, y).map_err(|err| GIFError::FailedToRead {
            description: format!("failed to read pixel ({}, {}): {}", x, y, err),
        })?;

        compressor.push(pixel).map_err(|err| match err {
            GIFError::InvalidImage { description } => GIFError::InvalidImage {
                description: format!("pixel ({}, {}): {}", x, y, description),
            },
            other => other,
        })?;
    }

    Ok(())
}
