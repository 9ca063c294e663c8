use super::io::{ImageIOError, PixelSink, PixelSource};

/// Palette-indexed raster, optionally carrying the low-order byte of 16-bit
/// continuous potential values next to each color index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>, // starting at top left pixel of the image, pos = y * width + x
    pub potential: Option<Vec<u8>>, // low-order bytes, same layout as pixels
}

impl IndexedImage {

    pub fn new(width: usize, height: usize) -> Self {
        IndexedImage {
            width,
            height,
            pixels: vec![0; width * height],
            potential: None,
        }
    }

    pub fn with_potential(width: usize, height: usize) -> Self {
        IndexedImage {
            potential: Some(vec![0; width * height]),
            ..Self::new(width, height)
        }
    }

    pub fn test_image() -> Self {
        let mut image = Self::new(4, 4);

        image.fill(1);
        image.set_pixel(1, 1, 2);
        image.set_pixel(2, 1, 2);
        image.set_pixel(1, 2, 2);
        image.set_pixel(2, 2, 3);

        image
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, index: u8) {
        self.pixels[y * self.width + x] = index;
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    pub fn set_potential(&mut self, x: usize, y: usize, value: u16) {
        let width = self.width;
        self.pixels[y * width + x] = (value >> 8) as u8;
        if let Some(potential) = self.potential.as_mut() {
            potential[y * width + x] = (value & 0xFF) as u8;
        }
    }

    pub fn get_potential(&self, x: usize, y: usize) -> u16 {
        let high = self.get_pixel(x, y) as u16;
        let low = self.potential.as_ref().map(|v| v[y * self.width + x]).unwrap_or(0) as u16;
        (high << 8) | low
    }

    pub fn fill(&mut self, index: u8) {
        for pixel in self.pixels.iter_mut() {
            *pixel = index;
        }
    }

    /// Splits an image stored with double-width rows (color indices on the
    /// left half, low-order bytes on the right half) into a half-width image
    /// with a potential plane.
    pub fn split_potential(&self) -> Self {
        let width = self.width / 2;
        let mut image = Self::with_potential(width, self.height);

        for y in 0..self.height {
            let row = &self.pixels[y * self.width..(y + 1) * self.width];
            image.pixels[y * width..(y + 1) * width].copy_from_slice(&row[..width]);
            if let Some(potential) = image.potential.as_mut() {
                potential[y * width..(y + 1) * width].copy_from_slice(&row[width..width * 2]);
            }
        }

        image
    }
}

impl PixelSource for IndexedImage {

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    // rows at height..2*height address the potential plane
    fn read_pixel(&self, x: usize, y: usize) -> Result<u8, ImageIOError> {
        if x >= self.width || y >= self.height * 2 {
            return Err(ImageIOError::FailedToRead {
                description: format!("pixel ({}, {}) is outside of {}x{} image", x, y, self.width, self.height),
            });
        }

        if y < self.height {
            return Ok(self.get_pixel(x, y));
        }

        match &self.potential {
            Some(potential) => Ok(potential[(y - self.height) * self.width + x]),
            None => Err(ImageIOError::FailedToRead {
                description: "image does not carry potential data".to_string(),
            }),
        }
    }
}

impl PixelSink for IndexedImage {

    fn write_line(&mut self, row: usize, line: &[u8]) -> Result<(), ImageIOError> {
        if row >= self.height || line.len() > self.width {
            return Err(ImageIOError::FailedToWrite {
                description: format!("line {} of length {} does not fit {}x{} image", row, line.len(), self.width, self.height),
            });
        }

        let offset = row * self.width;
        self.pixels[offset..offset + line.len()].copy_from_slice(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn potential_rows_follow_color_rows() {
        let mut image = IndexedImage::with_potential(2, 2);
        image.set_potential(1, 1, 0x1234);

        assert_eq!(image.read_pixel(1, 1).unwrap(), 0x12);
        assert_eq!(image.read_pixel(1, 3).unwrap(), 0x34);
        assert_eq!(image.get_potential(1, 1), 0x1234);
        assert!(image.read_pixel(0, 4).is_err());
    }

    #[test]
    fn split_potential_separates_halves() {
        let mut wide = IndexedImage::new(4, 2);
        wide.pixels = vec![1, 2, 10, 20, 3, 4, 30, 40];

        let image = wide.split_potential();

        assert_eq!(image.width, 2);
        assert_eq!(image.pixels, vec![1, 2, 3, 4]);
        assert_eq!(image.potential, Some(vec![10, 20, 30, 40]));
    }

    #[test]
    fn write_line_rejects_rows_outside_image() {
        let mut image = IndexedImage::new(2, 1);

        image.write_line(0, &[5, 6]).unwrap();
        assert_eq!(image.pixels, vec![5, 6]);
        assert!(image.write_line(1, &[1, 1]).is_err());
    }
}
