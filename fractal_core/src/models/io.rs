use std::collections::HashMap;
use std::io::{self, Read, Write};

use custom_error::custom_error;

custom_error! {pub ImageIOError
    FailedToRead {description: String} = "Failed to read image: {description}",
    FailedToWrite {description: String} = "Failed to write image: {description}",
    InvalidOptions {description: String} = "Invalid options are set for this io operation: {description}",
}

/// Random access provider of palette indices.
pub trait PixelSource {

    fn width(&self) -> usize;
    fn height(&self) -> usize;

    fn read_pixel(&self, x: usize, y: usize) -> Result<u8, ImageIOError>;
}

/// Receives decoded rows, top to bottom.
pub trait PixelSink {

    fn write_line(&mut self, row: usize, line: &[u8]) -> Result<(), ImageIOError>;
}

/// Append-only destination of encoded bytes.
pub trait ByteSink {

    fn write_byte(&mut self, value: u8) -> Result<(), ImageIOError>;

    fn write_bytes(&mut self, values: &[u8]) -> Result<(), ImageIOError> {
        for value in values {
            self.write_byte(*value)?;
        }

        Ok(())
    }
}

/// Sequential source of encoded bytes. `read_byte` yields `None` once the
/// source is exhausted.
pub trait ByteSource {

    fn read_byte(&mut self) -> Result<Option<u8>, ImageIOError>;

    fn read_exact_bytes(&mut self, len: usize) -> Result<Vec<u8>, ImageIOError> {
        let mut data = Vec::with_capacity(len);

        while data.len() < len {
            match self.read_byte()? {
                Some(v) => data.push(v),
                None => return Err(ImageIOError::FailedToRead {
                    description: format!("unexpected end of data: expected {} bytes, got {}", len, data.len()),
                }),
            }
        }

        Ok(data)
    }
}

impl<W: Write> ByteSink for W {

    fn write_byte(&mut self, value: u8) -> Result<(), ImageIOError> {
        self.write_bytes(&[value])
    }

    fn write_bytes(&mut self, values: &[u8]) -> Result<(), ImageIOError> {
        self.write_all(values).map_err(|err| ImageIOError::FailedToWrite {
            description: err.to_string(),
        })
    }
}

impl<R: Read> ByteSource for R {

    fn read_byte(&mut self) -> Result<Option<u8>, ImageIOError> {
        let mut buffer = [0u8; 1];

        loop {
            return match self.read(&mut buffer) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(buffer[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => Err(ImageIOError::FailedToRead {
                    description: err.to_string(),
                }),
            };
        }
    }
}

/// Polled by the encoder after every row; returning true stops the save
/// early while still producing a well-formed file.
pub trait Interrupt {

    fn requested(&mut self, rows_written: usize) -> bool;
}

pub struct NeverInterrupt;

impl Interrupt for NeverInterrupt {

    fn requested(&mut self, _rows_written: usize) -> bool {
        false
    }
}

impl<F: FnMut(usize) -> bool> Interrupt for F {

    fn requested(&mut self, rows_written: usize) -> bool {
        self(rows_written)
    }
}

#[derive(Clone, Debug)]
pub struct ImageWriterOptions {

    options: HashMap<String, String>,
}

impl ImageWriterOptions {

    pub fn default() -> Self {
        Self {
            options: HashMap::new(),
        }
    }

    pub fn with_option(&self, key: &str, value: &str) -> Self {
        let mut options = self.options.clone();
        options.insert(key.to_string(), value.to_string());

        Self {
            options,
        }
    }

    pub fn with_option_u32(&self, key: &str, value: u32) -> Self {
        self.with_option(&key, &value.to_string())
    }

    pub fn with_option_f64(&self, key: &str, value: f64) -> Self {
        self.with_option(&key, &value.to_string())
    }

    pub fn with_option_bool(&self, key: &str, value: bool) -> Self {
        self.with_option(&key, if value {
            "true"
        } else {
            "false"
        })
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ImageIOError> {
        let value = match self.options.get(key) {
            Some(v) => v,
            None => return Ok(default),
        };

        match value.to_lowercase().trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => return Err(ImageIOError::InvalidOptions {
                description: format!("failed to parse option value as a bool: {}", other),
            })
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> Result<u32, ImageIOError> {
        match self.options.get(key) {
            Some(v) => v.trim().parse().map_err(|err| ImageIOError::InvalidOptions {
                description: format!("failed to parse option as u32: {}", err),
            }),
            None => Ok(default),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ImageIOError> {
        match self.options.get(key) {
            Some(v) => v.trim().parse().map(Some).map_err(|err| ImageIOError::InvalidOptions {
                description: format!("failed to parse option as f64: {}", err),
            }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_parsed_with_defaults() {
        let options = ImageWriterOptions::default()
            .with_option_bool("legacy", true)
            .with_option_u32("colors", 16)
            .with_option_f64("aspect", 0.75);

        assert_eq!(options.get_bool("legacy", false).unwrap(), true);
        assert_eq!(options.get_bool("missing", true).unwrap(), true);
        assert_eq!(options.get_u32("colors", 256).unwrap(), 16);
        assert_eq!(options.get_f64("aspect").unwrap(), Some(0.75));
        assert_eq!(options.get_f64("missing").unwrap(), None);
    }

    #[test]
    fn invalid_option_values_are_reported() {
        let options = ImageWriterOptions::default()
            .with_option("legacy", "maybe")
            .with_option("aspect", "wide");

        assert!(options.get_bool("legacy", false).is_err());
        assert!(options.get_f64("aspect").is_err());
    }

    #[test]
    fn byte_source_reports_end_of_data() {
        let data: &[u8] = &[1, 2];
        let mut source = data;

        assert_eq!(source.read_byte().unwrap(), Some(1));
        assert!(source.read_exact_bytes(2).is_err());
        assert_eq!(source.read_byte().unwrap(), None);
    }

    #[test]
    fn vec_is_a_byte_sink() {
        let mut sink: Vec<u8> = Vec::new();
        sink.write_byte(7).unwrap();
        sink.write_bytes(&[8, 9]).unwrap();

        assert_eq!(sink, vec![7, 8, 9]);
    }

    #[test]
    fn closures_can_interrupt() {
        let mut interrupt = |rows: usize| rows >= 3;

        assert!(!interrupt.requested(2));
        assert!(interrupt.requested(3));
        assert!(!NeverInterrupt.requested(1000));
    }
}
