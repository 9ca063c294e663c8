use byteorder::{ByteOrder, LittleEndian};
use fractal_core::models::{ByteSource, Color, IndexedImage, PixelSink};

use crate::{
    bits::BitUnpacker,
    common::{
        ColorTable, EXTENSION_INTRODUCER, FLAG_GLOBAL_COLOR_TABLE, FLAG_INTERLACED, FLAG_LOCAL_COLOR_TABLE,
        HEADER_SIZE, IMAGE_DESCRIPTOR_SIZE, IMAGE_SEPARATOR, SIGNATURE_GIF87A, SIGNATURE_GIF89A, TRAILER,
    },
    errors::GIFError,
    extensions::read_extensions,
    info::FractalMetadata,
    lzw::Decompressor,
    packet::SubBlockReader,
};

// see https://www.fileformat.info/format/gif/egff.htm

// some early writers left the recorded ratio at zero
const MIN_RECORDED_ASPECT_RATIO: f64 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct GIFHeader {
    pub legacy: bool,

    pub screen_width: u16,
    pub screen_height: u16,
    pub color_table: ColorTable,
    pub background_color: u8,
    pub aspect_byte: u8,

    pub image_width: u16,
    pub image_height: u16,
    pub min_code_size: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodeReport {
    pub header: GIFHeader,
    pub metadata: FractalMetadata,
    pub skipped_ids: Vec<u16>,
    pub rows_decoded: usize,
    pub bad_code_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedGIF {
    pub header: GIFHeader,
    pub image: IndexedImage,
    pub metadata: FractalMetadata,
    pub skipped_ids: Vec<u16>,
    pub rows_decoded: usize,
    pub bad_code_count: usize,
}

impl DecodedGIF {

    pub fn is_complete(&self) -> bool {
        self.rows_decoded == self.header.image_height as usize
    }

    /// Height to width ratio of the rendered area, 0 when the file does not say.
    /// The value recorded in block 1 wins over the screen descriptor's aspect byte.
    pub fn aspect_ratio(&self) -> f64 {
        let recorded = self.metadata.info.as_ref()
            .map(|info| info.final_aspect_ratio() as f64)
            .unwrap_or(0.0);

        if recorded >= MIN_RECORDED_ASPECT_RATIO {
            return recorded;
        }

        aspect_ratio(self.header.aspect_byte, self.image.width, self.image.height)
    }
}

pub struct GIFReader {
}

impl GIFReader {

    pub fn new() -> Self {
        GIFReader {}
    }

    /// Everything up to and including the initial code size of the image data.
    pub fn read_preamble(&self, source: &mut dyn ByteSource) -> Result<GIFHeader, GIFError> {
        let mut header = read_header(source)?;

        skip_to_image_descriptor(source)?;
        read_image_descriptor(source, &mut header)?;

        Ok(header)
    }

    /// Streams the image rows into `sink` and collects the metadata that follows them.
    pub fn decode(&self, source: &mut dyn ByteSource, sink: &mut dyn PixelSink) -> Result<DecodeReport, GIFError> {
        let header = self.read_preamble(source)?;
        self.decode_body(source, header, sink)
    }

    /// Decodes a whole file. Images saved with 16 bit potential come back at
    /// their logical width with the low-order bytes in `image.potential`.
    pub fn read(&self, data: &[u8]) -> Result<DecodedGIF, GIFError> {
        let mut source: &[u8] = data;

        let header = self.read_preamble(&mut source)?;
        let mut image = IndexedImage::new(header.image_width as usize, header.image_height as usize);
        let report = self.decode_body(&mut source, header, &mut image)?;

        let potential_16bit = report.metadata.info.as_ref()
            .map(|info| info.pot16bit() != 0)
            .unwrap_or(false);

        if potential_16bit && image.width % 2 == 0 {
            image = image.split_potential();
        }

        Ok(DecodedGIF {
            header: report.header,
            image,
            metadata: report.metadata,
            skipped_ids: report.skipped_ids,
            rows_decoded: report.rows_decoded,
            bad_code_count: report.bad_code_count,
        })
    }

    fn decode_body(&self, source: &mut dyn ByteSource, header: GIFHeader, sink: &mut dyn PixelSink) -> Result<DecodeReport, GIFError> {
        let (rows_decoded, bad_code_count) = read_image_data(source, &header, sink)?;
        if rows_decoded < header.image_height as usize {
            warn!("image data covers {} of {} rows", rows_decoded, header.image_height);
        }
        if bad_code_count > 0 {
            warn!("{} out of range codes in image data", bad_code_count);
        }

        let extensions = read_extensions(source)?;

        Ok(DecodeReport {
            header,
            metadata: extensions.metadata,
            skipped_ids: extensions.skipped_ids,
            rows_decoded,
            bad_code_count,
        })
    }
}

/// Groups decoded pixel runs into rows for a `PixelSink`.
struct LineAssembler<'a> {
    sink: &'a mut dyn PixelSink,
    width: usize,
    height: usize,
    line: Vec<u8>,
    row: usize,
    overflow: usize,
}

impl<'a> LineAssembler<'a> {

    fn new(sink: &'a mut dyn PixelSink, width: usize, height: usize) -> Self {
        LineAssembler {
            sink,
            width,
            height,
            line: Vec::with_capacity(width),
            row: 0,
            overflow: 0,
        }
    }

    fn push(&mut self, values: &[u8]) -> Result<(), GIFError> {
        for value in values {
            if self.row >= self.height || self.width == 0 {
                self.overflow += 1;
                continue;
            }

            self.line.push(*value);

            if self.line.len() == self.width {
                self.sink.write_line(self.row, &self.line).map_err(|err| GIFError::FailedToWrite {
                    description: format!("failed to store row {}: {}", self.row, err),
                })?;
                self.line.clear();
                self.row += 1;
            }
        }

        Ok(())
    }
}

fn read_header(source: &mut dyn ByteSource) -> Result<GIFHeader, GIFError> {
    let data = read_bytes(source, HEADER_SIZE, "header")?;

    if &data[0..3] != b"GIF" {
        return Err(GIFError::InvalidHeader {
            description: format!("Unexpected signature for GIF: {:x?}", &data[0..3]),
        });
    }

    let legacy = match &data[0..6] {
        v if v == SIGNATURE_GIF87A => true,
        v if v == SIGNATURE_GIF89A => false,
        _ => return Err(GIFError::NotImplemented {
            description: format!("Support for GIF version {:x?} not implemented", &data[3..6]),
        }),
    };

    let screen_width = LittleEndian::read_u16(&data[6..8]);
    let screen_height = LittleEndian::read_u16(&data[8..10]);

    let packed: u8 = data[10];

    let size_of_global_color_table = packed & 0b111;
    let color_table_sort_flag = (packed & 0b1000) >> 3;
    let color_resolution = ((packed & 0b1110000) >> 4) + 1;
    let global_color_table = packed & FLAG_GLOBAL_COLOR_TABLE != 0;
    let number_of_global_color_table_entries = 1usize << (size_of_global_color_table + 1);

    trace!("signature: {}", if legacy { "GIF87a" } else { "GIF89a" });
    trace!("screen: {}x{}", screen_width, screen_height);
    trace!("packed is {:?}", packed);
    trace!("size of global color table: {}", size_of_global_color_table);
    trace!("color table sort flag: {}", color_table_sort_flag);
    trace!("color resolution: {}", color_resolution);
    trace!("global color table: {}", global_color_table);
    trace!("number of global color table entries: {}", number_of_global_color_table_entries);

    if !global_color_table {
        return Err(GIFError::NotImplemented {
            description: "this gif does not use global color table".to_string(),
        });
    }

    let background_color = data[11];
    trace!("background color: {}", background_color);

    let aspect_byte = data[12];
    trace!("aspect ratio: {}", aspect_byte);

    let color_table = read_global_color_table(source, number_of_global_color_table_entries)?;

    Ok(GIFHeader {
        legacy,
        screen_width,
        screen_height,
        color_table,
        background_color,
        aspect_byte,
        image_width: 0,
        image_height: 0,
        min_code_size: 0,
    })
}

fn read_global_color_table(source: &mut dyn ByteSource, number_of_entries: usize) -> Result<ColorTable, GIFError> {
    let data = read_bytes(source, number_of_entries * 3, "global color table")?;

    let colors = data.chunks(3)
        .map(|v| Color::from_rgb(v[0], v[1], v[2]))
        .collect();

    Ok(ColorTable::new(colors))
}

/// Extensions in front of the image (comments, animation control, ...) carry
/// nothing we need.
fn skip_to_image_descriptor(source: &mut dyn ByteSource) -> Result<(), GIFError> {
    loop {
        match read_bytes(source, 1, "block introducer")?[0] {
            IMAGE_SEPARATOR => return Ok(()),
            EXTENSION_INTRODUCER => {
                let label = read_bytes(source, 1, "extension label")?[0];
                let skipped = SubBlockReader::new(source).drain()?;
                debug!("skipped extension {:#04x} of {} bytes in front of the image", label, skipped);
            },
            TRAILER => return Err(GIFError::InvalidBlock {
                description: "file ends before any image".to_string(),
            }),
            other => return Err(GIFError::InvalidBlock {
                description: format!("invalid identifier for local image descriptor block: {:#04x}", other),
            }),
        }
    }
}

fn read_image_descriptor(source: &mut dyn ByteSource, header: &mut GIFHeader) -> Result<(), GIFError> {
    // the separator was consumed while looking for it
    let data = read_bytes(source, IMAGE_DESCRIPTOR_SIZE - 1, "image descriptor")?;

    let left = LittleEndian::read_u16(&data[0..2]);
    let top = LittleEndian::read_u16(&data[2..4]);
    header.image_width = LittleEndian::read_u16(&data[4..6]);
    header.image_height = LittleEndian::read_u16(&data[6..8]);

    let packed = data[8];

    trace!("image position: {}x{}", left, top);
    trace!("image size: {}x{}", header.image_width, header.image_height);
    trace!("image packed: {:#010b}", packed);

    if packed & FLAG_LOCAL_COLOR_TABLE != 0 {
        return Err(GIFError::NotImplemented {
            description: "Local color tables are not supported".to_string(),
        });
    }

    if packed & FLAG_INTERLACED != 0 {
        return Err(GIFError::NotImplemented {
            description: "Interlaced images are not supported".to_string(),
        });
    }

    header.min_code_size = read_bytes(source, 1, "initial code size")?[0];
    trace!("initial code size: {}", header.min_code_size);

    Ok(())
}

fn read_image_data(source: &mut dyn ByteSource, header: &GIFHeader, sink: &mut dyn PixelSink) -> Result<(usize, usize), GIFError> {
    let mut decompressor = Decompressor::new(header.min_code_size)?;
    let mut assembler = LineAssembler::new(sink, header.image_width as usize, header.image_height as usize);

    let mut unpacker = BitUnpacker::new(SubBlockReader::new(source));
    let pixels = decompressor.decode(&mut unpacker, |values| assembler.push(values))?;
    let trailing = unpacker.drain()?;

    trace!("decoded {} pixels, {} bytes after the end code", pixels, trailing);

    if assembler.overflow > 0 {
        warn!("{} pixels beyond the image bounds were dropped", assembler.overflow);
    }

    Ok((assembler.row, decompressor.bad_code_count()))
}

fn read_bytes(source: &mut dyn ByteSource, len: usize, what: &str) -> Result<Vec<u8>, GIFError> {
    source.read_exact_bytes(len).map_err(|err| GIFError::FailedToRead {
        description: format!("failed to read {}: {}", what, err),
    })
}

fn aspect_ratio(aspect_byte: u8, width: usize, height: usize) -> f64 {
    if aspect_byte == 0 || width == 0 {
        return 0.0;
    }

    64.0 / (aspect_byte as f64 + 15.0) * height as f64 / width as f64
}
