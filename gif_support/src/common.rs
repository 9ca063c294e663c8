use fractal_core::models::Color;

// see https://www.w3.org/Graphics/GIF/spec-gif89a.txt

pub const SIGNATURE_GIF87A: &[u8; 6] = b"GIF87a";
pub const SIGNATURE_GIF89A: &[u8; 6] = b"GIF89a";

pub const EXTENSION_INTRODUCER: u8 = 0x21;
pub const APPLICATION_EXTENSION_LABEL: u8 = 0xFF;
pub const IMAGE_SEPARATOR: u8 = 0x2C;
pub const BLOCK_TERMINATOR: u8 = 0x00;
pub const TRAILER: u8 = 0x3B;

pub const HEADER_SIZE: usize = 13;
pub const IMAGE_DESCRIPTOR_SIZE: usize = 10;

pub const FLAG_GLOBAL_COLOR_TABLE: u8 = 0b1000_0000;
pub const FLAG_LOCAL_COLOR_TABLE: u8 = 0b1000_0000;
pub const FLAG_INTERLACED: u8 = 0b0100_0000;
pub const COLOR_RESOLUTION_BITS: u8 = 6;

/// Pixel payload sub-blocks are flushed at this many bytes.
pub const PIXEL_PACKET_SIZE: usize = 254;
/// Extension payloads use full-size sub-blocks.
pub const EXTENSION_PACKET_SIZE: usize = 255;

pub const MAX_CODE_BITS: u8 = 12;
pub const MAX_CODES: u16 = 1 << MAX_CODE_BITS;

#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {

    pub colors: Vec<Color>,
}

impl ColorTable {

    pub fn new(colors: Vec<Color>) -> Self {
        ColorTable {
            colors,
        }
    }

    pub fn black_and_white() -> Self {
        Self::new(vec![Color::black(), Color::white()])
    }

    /// Number of bits needed to address every entry, at least 1.
    pub fn bits_per_pixel(&self) -> u8 {
        bits_per_pixel(self.colors.len())
    }

    /// Table as stored in the file: `2^bits` entries, black padded.
    pub fn padded(&self) -> Vec<Color> {
        let size = 1usize << self.bits_per_pixel();
        let mut colors: Vec<Color> = self.colors.iter().take(size).cloned().collect();

        while colors.len() < size {
            colors.push(Color::black());
        }

        colors
    }
}

pub fn bits_per_pixel(colors: usize) -> u8 {
    let mut bits = 1;
    while bits < 8 && (1usize << bits) < colors {
        bits += 1;
    }
    bits
}

/// Initial LZW code width for a palette of `colors` entries. GIF does not
/// allow a minimum code size below 2, hence the bump for 2-color images.
pub fn start_bits(colors: usize) -> u8 {
    let bits = bits_per_pixel(colors) + 1;
    if bits < 3 {
        3
    } else {
        bits
    }
}

pub fn max_code(n_bits: u8) -> u16 {
    ((1u32 << n_bits) - 1) as u16
}
