/// One palette entry, full 8-bit intensity per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {

    pub fn white() -> Self {
        Self::from_rgb(255, 255, 255)
    }

    pub fn black() -> Self {
        Self::from_rgb(0, 0, 0)
    }

    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Color {
            red,
            green,
            blue,
        }
    }

    /// Smooth gradient palette used when no live palette is available.
    pub fn gradient(colors: usize) -> Vec<Color> {
        if colors <= 2 {
            return vec![Color::black(), Color::white()];
        }

        (0..colors)
            .map(|i| {
                let t = i as f64 / (colors - 1) as f64;
                Color::from_rgb(
                    (9.0 * (1.0 - t) * t * t * t * 255.0) as u8,
                    (15.0 * (1.0 - t) * (1.0 - t) * t * t * 255.0) as u8,
                    (8.5 * (1.0 - t) * (1.0 - t) * (1.0 - t) * t * 255.0) as u8,
                )
            })
            .collect()
    }
}
