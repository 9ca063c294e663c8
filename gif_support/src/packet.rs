use fractal_core::models::{ByteSink, ByteSource};

use crate::common::BLOCK_TERMINATOR;
use crate::errors::GIFError;

/// Splits an outgoing byte run into length-prefixed data sub-blocks.
pub struct PacketFramer<'a> {
    sink: &'a mut dyn ByteSink,
    buffer: Vec<u8>,
    capacity: usize,
    blocks_written: usize,
}

impl<'a> PacketFramer<'a> {

    pub fn new(sink: &'a mut dyn ByteSink, capacity: usize) -> Self {
        let capacity = capacity.max(1).min(255);

        PacketFramer {
            sink,
            buffer: Vec::with_capacity(capacity),
            capacity,
            blocks_written: 0,
        }
    }

    pub fn push(&mut self, value: u8) -> Result<(), GIFError> {
        self.buffer.push(value);

        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }

        Ok(())
    }

    pub fn push_all(&mut self, values: &[u8]) -> Result<(), GIFError> {
        for value in values {
            self.push(*value)?;
        }

        Ok(())
    }

    /// Writes out the buffered bytes as one sub-block, if there are any.
    pub fn flush(&mut self) -> Result<(), GIFError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.sink.write_byte(self.buffer.len() as u8)
            .and_then(|_| self.sink.write_bytes(&self.buffer))
            .map_err(|err| GIFError::FailedToWrite {
                description: format!("failed to write data sub-block: {}", err),
            })?;

        self.buffer.clear();
        self.blocks_written += 1;

        Ok(())
    }

    /// Flushes and closes the payload with a zero-length sub-block.
    pub fn finish(&mut self) -> Result<(), GIFError> {
        self.flush()?;

        self.sink.write_byte(BLOCK_TERMINATOR).map_err(|err| GIFError::FailedToWrite {
            description: format!("failed to write block terminator: {}", err),
        })
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }
}

/// Reads the payload of a chain of data sub-blocks, byte by byte.
pub struct SubBlockReader<'a> {
    source: &'a mut dyn ByteSource,
    remaining: usize,
    finished: bool,
}

impl<'a> SubBlockReader<'a> {

    pub fn new(source: &'a mut dyn ByteSource) -> Self {
        SubBlockReader {
            source,
            remaining: 0,
            finished: false,
        }
    }

    /// Next payload byte, or `None` once the zero-length sub-block is reached.
    pub fn next_byte(&mut self) -> Result<Option<u8>, GIFError> {
        if self.finished {
            return Ok(None);
        }

        if self.remaining == 0 {
            let length = self.required_byte("sub-block length")?;
            if length == 0 {
                self.finished = true;
                return Ok(None);
            }
            self.remaining = length as usize;
        }

        self.remaining -= 1;
        self.required_byte("sub-block data").map(Some)
    }

    pub fn read_to_end(&mut self) -> Result<Vec<u8>, GIFError> {
        let mut payload = Vec::new();

        while let Some(value) = self.next_byte()? {
            payload.push(value);
        }

        Ok(payload)
    }

    /// Skips whatever is left of the payload, returning how many bytes were dropped.
    pub fn drain(&mut self) -> Result<usize, GIFError> {
        let mut skipped = 0;

        while self.next_byte()?.is_some() {
            skipped += 1;
        }

        Ok(skipped)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn required_byte(&mut self, what: &str) -> Result<u8, GIFError> {
        match self.source.read_byte() {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(GIFError::FailedToRead {
                description: format!("unexpected end of data while reading {}", what),
            }),
            Err(err) => Err(GIFError::FailedToRead {
                description: format!("failed to read {}: {}", what, err),
            }),
        }
    }
}
