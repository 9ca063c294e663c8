use crate::bits::{BitUnpacker, CodeSink};
use crate::common::{max_code, MAX_CODES, MAX_CODE_BITS};
use crate::errors::GIFError;
use crate::hash_table::{CodeTable, Probe};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressorStats {
    pub codes_emitted: usize,
    pub entries_added: usize,
    pub width_increases: usize,
    pub clears: usize,
}

/// Streaming LZW encoder producing variable-width codes, 12 bits at most.
pub struct Compressor<S: CodeSink> {
    sink: S,
    table: CodeTable,

    start_bits: u8,
    n_bits: u8,
    max_code: u16,

    clear_code: u16,
    eof_code: u16,
    free_ent: u16,
    clear_flag: bool,

    ent: Option<u16>,
    stats: CompressorStats,
}

impl<S: CodeSink> Compressor<S> {

    /// Emits the initial clear code. `start_bits` is the palette bit depth
    /// plus one, 3 at least.
    pub fn start(sink: S, start_bits: u8) -> Result<Self, GIFError> {
        if start_bits < 3 || start_bits > 9 {
            return Err(GIFError::InvalidImage {
                description: format!("unsupported initial code width: {}", start_bits),
            });
        }

        let clear_code = 1u16 << (start_bits - 1);

        let mut compressor = Compressor {
            sink,
            table: CodeTable::new(),
            start_bits,
            n_bits: start_bits,
            max_code: max_code(start_bits),
            clear_code,
            eof_code: clear_code + 1,
            free_ent: clear_code + 2,
            clear_flag: false,
            ent: None,
            stats: CompressorStats::default(),
        };

        compressor.output(clear_code)?;

        Ok(compressor)
    }

    pub fn push(&mut self, pixel: u8) -> Result<(), GIFError> {
        if pixel as u16 >= self.clear_code {
            return Err(GIFError::InvalidImage {
                description: format!("pixel value {} does not fit a {} bit palette", pixel, self.start_bits - 1),
            });
        }

        let ent = match self.ent {
            Some(v) => v,
            None => {
                self.ent = Some(pixel as u16);
                return Ok(());
            }
        };

        match self.table.find(pixel, ent) {
            Probe::Found(code) => {
                self.ent = Some(code);
            },
            Probe::Vacant(slot) => {
                self.output(ent)?;
                self.ent = Some(pixel as u16);

                if self.free_ent < MAX_CODES {
                    self.table.insert(slot, pixel, ent, self.free_ent);
                    self.free_ent += 1;
                    self.stats.entries_added += 1;
                } else {
                    self.clear()?;
                }
            }
        }

        Ok(())
    }

    /// Emits the pending code and the end code, flushes the sink and hands it back.
    pub fn finish(mut self) -> Result<(S, CompressorStats), GIFError> {
        if let Some(ent) = self.ent.take() {
            self.output(ent)?;
        }

        let eof_code = self.eof_code;
        self.output(eof_code)?;
        self.sink.finish()?;

        debug!("lzw: {:?}", self.stats);

        Ok((self.sink, self.stats))
    }

    fn clear(&mut self) -> Result<(), GIFError> {
        self.table.clear();
        self.free_ent = self.clear_code + 2;
        self.clear_flag = true;
        self.stats.clears += 1;

        let clear_code = self.clear_code;
        self.output(clear_code)
    }

    fn output(&mut self, code: u16) -> Result<(), GIFError> {
        self.sink.put_code(code, self.n_bits)?;
        self.stats.codes_emitted += 1;

        if self.clear_flag {
            self.n_bits = self.start_bits;
            self.max_code = max_code(self.n_bits);
            self.clear_flag = false;
        } else if self.free_ent > self.max_code {
            self.n_bits += 1;
            self.stats.width_increases += 1;

            // at full width the last code stays unused, the table is cleared instead
            self.max_code = if self.n_bits == MAX_CODE_BITS {
                MAX_CODES
            } else {
                max_code(self.n_bits)
            };
        }

        Ok(())
    }
}

/// LZW decoder matching `Compressor`, also accepting streams from other
/// encoders that follow the usual GIF code growth rules.
pub struct Decompressor {
    min_code_size: u8,
    clear_code: u16,
    eof_code: u16,

    code_size: u8,
    next_free: u16,

    prefix: Vec<u16>,
    suffix: Vec<u8>,
    stack: Vec<u8>,

    bad_code_count: usize,
}

impl Decompressor {

    /// `min_code_size` is the value stored in front of the image data.
    pub fn new(min_code_size: u8) -> Result<Self, GIFError> {
        if min_code_size < 2 || min_code_size > 8 {
            return Err(GIFError::InvalidBlock {
                description: format!("invalid initial code size: {}", min_code_size),
            });
        }

        let clear_code = 1u16 << min_code_size;

        Ok(Decompressor {
            min_code_size,
            clear_code,
            eof_code: clear_code + 1,
            code_size: min_code_size + 1,
            next_free: clear_code + 2,
            prefix: vec![0; MAX_CODES as usize],
            suffix: vec![0; MAX_CODES as usize],
            stack: Vec::with_capacity(MAX_CODES as usize),
            bad_code_count: 0,
        })
    }

    pub fn bad_code_count(&self) -> usize {
        self.bad_code_count
    }

    /// Decodes until the end code, passing every expanded string to `output`.
    /// Returns the number of pixels produced.
    pub fn decode<F>(&mut self, unpacker: &mut BitUnpacker, mut output: F) -> Result<usize, GIFError>
        where F: FnMut(&[u8]) -> Result<(), GIFError> {

        let mut produced = 0;
        let mut prev: Option<u16> = None;
        let mut first: u8 = 0;

        loop {
            let mut code = match unpacker.read_code(self.code_size)? {
                Some(v) => v,
                None => return Err(GIFError::InvalidBlock {
                    description: format!("image data ended before end code after {} pixels", produced),
                }),
            };

            if code == self.clear_code {
                self.reset();
                prev = None;
                continue;
            }

            if code == self.eof_code {
                break;
            }

            let prev_code = match prev {
                Some(v) => v,
                None => {
                    if code >= self.clear_code {
                        warn!("code {} found where a literal was expected", code);
                        self.bad_code_count += 1;
                        code = 0;
                    }

                    first = code as u8;
                    output(&[first])?;
                    produced += 1;
                    prev = Some(code);
                    continue;
                }
            };

            if code > self.next_free {
                warn!("code {} is ahead of dictionary size {}", code, self.next_free);
                self.bad_code_count += 1;
                code = self.next_free;
            }

            let mut current = code;
            if code == self.next_free {
                self.stack.push(first);
                current = prev_code;
            }

            while current > self.eof_code {
                self.stack.push(self.suffix[current as usize]);
                current = self.prefix[current as usize];
            }

            first = current as u8;
            self.stack.push(first);

            self.stack.reverse();
            output(&self.stack)?;
            produced += self.stack.len();
            self.stack.clear();

            if self.next_free < MAX_CODES {
                self.prefix[self.next_free as usize] = prev_code;
                self.suffix[self.next_free as usize] = first;
                self.next_free += 1;

                if self.next_free == 1 << self.code_size && self.code_size < MAX_CODE_BITS {
                    self.code_size += 1;
                }
            }

            prev = Some(code);
        }

        Ok(produced)
    }

    fn reset(&mut self) {
        self.code_size = self.min_code_size + 1;
        self.next_free = self.clear_code + 2;
    }
}
