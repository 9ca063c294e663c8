use crate::errors::GIFError;
use crate::packet::{PacketFramer, SubBlockReader};

/// Destination of variable-width LZW codes.
pub trait CodeSink {

    fn put_code(&mut self, code: u16, width: u8) -> Result<(), GIFError>;

    /// Called once after the end code; flushes whatever is still buffered.
    fn finish(&mut self) -> Result<(), GIFError>;
}

/// Packs codes least significant bit first into bytes and hands them to a
/// packet framer.
pub struct BitPacker<'a> {
    framer: PacketFramer<'a>,
    accumulator: u32,
    bits: u8,
}

impl<'a> BitPacker<'a> {

    pub fn new(framer: PacketFramer<'a>) -> Self {
        BitPacker {
            framer,
            accumulator: 0,
            bits: 0,
        }
    }

    pub fn into_framer(self) -> PacketFramer<'a> {
        self.framer
    }
}

impl<'a> CodeSink for BitPacker<'a> {

    fn put_code(&mut self, code: u16, width: u8) -> Result<(), GIFError> {
        debug_assert!(width <= 16);

        let mask = (1u32 << width) - 1;
        self.accumulator |= (code as u32 & mask) << self.bits;
        self.bits += width;

        while self.bits >= 8 {
            self.framer.push((self.accumulator & 0xFF) as u8)?;
            self.accumulator >>= 8;
            self.bits -= 8;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), GIFError> {
        if self.bits > 0 {
            self.framer.push((self.accumulator & 0xFF) as u8)?;
            self.accumulator = 0;
            self.bits = 0;
        }

        self.framer.flush()
    }
}

/// Reads variable-width codes back out of a sub-block chain. The caller
/// tracks the code width; nothing in the bit stream encodes it.
pub struct BitUnpacker<'a> {
    reader: SubBlockReader<'a>,
    accumulator: u32,
    bits: u8,
}

impl<'a> BitUnpacker<'a> {

    pub fn new(reader: SubBlockReader<'a>) -> Self {
        BitUnpacker {
            reader,
            accumulator: 0,
            bits: 0,
        }
    }

    /// Next `width`-bit code, or `None` when the payload ends first.
    pub fn read_code(&mut self, width: u8) -> Result<Option<u16>, GIFError> {
        while self.bits < width {
            match self.reader.next_byte()? {
                Some(v) => {
                    self.accumulator |= (v as u32) << self.bits;
                    self.bits += 8;
                },
                None => return Ok(None),
            }
        }

        let code = (self.accumulator & ((1u32 << width) - 1)) as u16;
        self.accumulator >>= width;
        self.bits -= width;

        Ok(Some(code))
    }

    /// Consumes the rest of the payload including its zero-length sub-block.
    pub fn drain(&mut self) -> Result<usize, GIFError> {
        self.bits = 0;
        self.accumulator = 0;
        self.reader.drain()
    }
}
