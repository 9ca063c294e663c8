#[macro_use]
extern crate log;

use std::{env, fs};

use env_logger::Env;
use fractal_core::{
    models::{Color, ImageIOError, ImageWriterOptions, Interrupt, NeverInterrupt, PixelSource},
    utils::print_intro,
};
use gif_support::{
    writer::{OPTION_GIF87A, OPTION_POTENTIAL_16BIT, OPTION_FINAL_ASPECT_RATIO},
    CalcStatus, ColorTable, FractalInfo, FractalMetadata, GIFReader, GIFWriter,
};

const DEFAULT_LOGGING_LEVEL: &str = "info";

const DEFAULT_WIDTH: usize = 640;
const DEFAULT_HEIGHT: usize = 480;
const DEFAULT_COLORS: usize = 256;
const DEFAULT_ITERATIONS: u32 = 150;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_LOGGING_LEVEL)).init();
    let args: Vec<String> = env::args().collect();
    debug!("args are: {:?}", args);

    print_intro();

    let command = args.get(1).map(|v| v.as_str());
    match command {
        Some("render") => match argument_value(&args, "output") {
            Some(output) => render(&args, &output),
            None => error!("please specify where to save the image: converter render --output=mandel.gif"),
        },
        Some("info") => match argument_value(&args, "source") {
            Some(source) => describe(&source),
            None => error!("please specify file to inspect: converter info --source=mandel.gif"),
        },
        _ => error!("please specify command:\nconverter render --output=mandel.gif [--width=640] [--height=480] [--colors=256] [--iterations=150] [--gif87a] [--potential] [--stop-after=ROWS]\nconverter info --source=mandel.gif"),
    }
}

fn render(args: &[String], output: &str) {
    let width = numeric_argument(args, "width", DEFAULT_WIDTH);
    let height = numeric_argument(args, "height", DEFAULT_HEIGHT);
    let colors = numeric_argument(args, "colors", DEFAULT_COLORS);
    let iterations = numeric_argument(args, "iterations", DEFAULT_ITERATIONS);
    let stop_after = argument_value(args, "stop-after").and_then(|v| v.parse::<usize>().ok());

    let legacy = argument_present(args, "gif87a");
    let potential = argument_present(args, "potential");

    let (width, height, colors, iterations) = match (width, height, colors, iterations) {
        (Some(w), Some(h), Some(c), Some(i)) if w > 0 && h > 0 => (w, h, palette_size(c, potential), i.max(1)),
        _ => {
            error!("width, height, colors and iterations must be positive numbers");
            return;
        }
    };

    let source = MandelbrotSource::new(width, height, colors, iterations);
    info!("rendering {}x{} mandelbrot set with {} colors, {} iterations", width, height, colors, iterations);

    let metadata = FractalMetadata::with_info(source.fractal_info());
    let options = ImageWriterOptions::default()
        .with_option_bool(OPTION_GIF87A, legacy)
        .with_option_bool(OPTION_POTENTIAL_16BIT, potential)
        .with_option_f64(OPTION_FINAL_ASPECT_RATIO, source.aspect_ratio());

    let mut stop: Box<dyn Interrupt> = match stop_after {
        Some(rows) => Box::new(move |written: usize| written >= rows),
        None => Box::new(NeverInterrupt),
    };

    let mut data: Vec<u8> = Vec::new();
    let outcome = match GIFWriter::new().write(
        &source,
        &ColorTable::new(Color::gradient(colors)),
        &metadata,
        &mut data,
        &options,
        stop.as_mut(),
    ) {
        Ok(v) => v,
        Err(err) => {
            error!("failed to encode image: {}", err);
            return;
        }
    };

    info!(
        "encoded {} rows into {} bytes ({} codes, {} table resets)",
        outcome.rows_written, data.len(), outcome.stats.codes_emitted, outcome.stats.clears
    );

    match fs::write(output, &data) {
        Ok(_) => info!("Result saved to {}", output),
        Err(err) => error!("Failed to save result: {}", err),
    };
}

fn describe(source: &str) {
    let file = match fs::read(source) {
        Ok(v) => v,
        Err(err) => {
            error!("failed to read {}: {}", source, err);
            return;
        }
    };

    let gif = match GIFReader::new().read(&file) {
        Ok(v) => v,
        Err(err) => {
            error!("Failed to read image as gif: {}", err);
            return;
        }
    };

    let header = &gif.header;
    info!("format: {}", if header.legacy { "GIF87a" } else { "GIF89a" });
    info!("screen: {}x{}, image: {}x{}", header.screen_width, header.screen_height, header.image_width, header.image_height);
    info!("palette: {} colors, aspect ratio {:.4}", header.color_table.colors.len(), gif.aspect_ratio());
    info!("rows decoded: {} of {}", gif.rows_decoded, header.image_height);

    if gif.bad_code_count > 0 {
        warn!("{} damaged codes were repaired while decoding", gif.bad_code_count);
    }

    if gif.image.potential.is_some() {
        info!("16 bit continuous potential: {}x{}", gif.image.width, gif.image.height);
    }

    let metadata = &gif.metadata;
    if metadata.is_empty() {
        info!("no fractal metadata");
    }
    if let Some(info) = &metadata.info {
        info!("fractal info: {:?}", info);
        info!("calculation status: {:?}", info.calc_status());
    }
    if let Some(resume) = &metadata.resume {
        info!("resume data: {} bytes", resume.len());
    }
    if let Some(formula) = &metadata.formula {
        info!("formula: {:?}", formula);
    }
    if let Some(ranges) = &metadata.ranges {
        info!("iteration ranges: {:?}", ranges);
    }
    if let Some(bounds) = &metadata.extended_bounds {
        info!("extended precision corners: {} bytes", bounds.len());
    }
    if let Some(evolution) = &metadata.evolution {
        info!("evolution: {:?}", evolution);
    }
    if let Some(orbits) = &metadata.orbits {
        info!("orbits: {:?}", orbits);
    }
    for id in &gif.skipped_ids {
        warn!("unknown extension block {:03} was skipped", id);
    }
}

/// Escape time renderer producing palette indices on demand. Rows past the
/// image height return the low-order byte of the continuous potential.
struct MandelbrotSource {
    width: usize,
    height: usize,
    colors: usize,
    iterations: u32,

    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl MandelbrotSource {

    fn new(width: usize, height: usize, colors: usize, iterations: u32) -> Self {
        let y_extent = 1.5;
        let x_center = -0.5;
        let x_extent = y_extent * width as f64 / height as f64;

        MandelbrotSource {
            width,
            height,
            colors,
            iterations,
            x_min: x_center - x_extent,
            x_max: x_center + x_extent,
            y_min: -y_extent,
            y_max: y_extent,
        }
    }

    fn aspect_ratio(&self) -> f64 {
        (self.y_max - self.y_min) / (self.x_max - self.x_min)
    }

    fn fractal_info(&self) -> FractalInfo {
        let mut info = FractalInfo::default();

        info.set_fractal_type(0);
        info.set_x_min(self.x_min);
        info.set_x_max(self.x_max);
        info.set_y_min(self.y_min);
        info.set_y_max(self.y_max);
        info.set_x_3rd(self.x_min);
        info.set_y_3rd(self.y_min);
        info.set_x_dots(self.width as i16);
        info.set_y_dots(self.height as i16);
        info.set_colors(self.colors as i16);
        info.set_iterations_old(self.iterations.min(i16::MAX as u32) as i16);
        info.set_iterations(self.iterations as i32);
        info.set_bailout(4);
        info.set_std_calc_mode(b'1');
        info.set_final_aspect_ratio(self.aspect_ratio() as f32);
        info.set_calc_status(CalcStatus::Completed);

        info
    }

    /// Palette index scaled by 256 plus the fractional part of the smooth escape count.
    fn potential(&self, x: usize, y: usize) -> u16 {
        let c_re = self.x_min + (self.x_max - self.x_min) * x as f64 / self.width as f64;
        let c_im = self.y_max - (self.y_max - self.y_min) * y as f64 / self.height as f64;

        let (mut re, mut im) = (0.0f64, 0.0f64);
        for i in 0..self.iterations {
            let (re2, im2) = (re * re, im * im);
            if re2 + im2 > 256.0 {
                let smooth = i as f64 + 1.0 - ((re2 + im2).ln() / 2.0).log2().max(0.0);
                let cycle = (self.colors - 1) as f64;
                let value = 1.0 + (smooth.max(0.0) % cycle);
                return (value * 256.0).min(65535.0) as u16;
            }

            im = 2.0 * re * im + c_im;
            re = re2 - im2 + c_re;
        }

        0
    }
}

impl PixelSource for MandelbrotSource {

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_pixel(&self, x: usize, y: usize) -> Result<u8, ImageIOError> {
        if x >= self.width || y >= self.height * 2 {
            return Err(ImageIOError::FailedToRead {
                description: format!("pixel ({}, {}) is outside of the rendered area", x, y),
            });
        }

        Ok(if y < self.height {
            (self.potential(x, y) >> 8) as u8
        } else {
            (self.potential(x, y - self.height) & 0xFF) as u8
        })
    }
}

/// The low-order potential bytes cover 0..=255, so a 16 bit potential file
/// always needs the full palette.
fn palette_size(requested: usize, potential: bool) -> usize {
    let colors = requested.max(2).min(256);

    if potential && colors < 256 {
        warn!("16 bit potential needs 256 colors, {} requested", colors);
        return 256;
    }

    colors
}

fn numeric_argument<T: std::str::FromStr>(args: &[String], argument_name: &str, default: T) -> Option<T> {
    match argument_value(args, argument_name) {
        Some(v) => v.parse().ok(),
        None => Some(default),
    }
}

fn argument_value(args: &[String], argument_name: &str) -> Option<String> {
    let prefix = format!("--{}=", argument_name);

    args.iter()
        .find(|s| s.starts_with(&prefix))
        .map(|s| s[prefix.len()..].to_string())
}

fn argument_present(args: &[String], argument_name: &str) -> bool {
    let flag = format!("--{}", argument_name);
    args.iter().any(|s| *s == flag || s.starts_with(&format!("{}=", flag)))
}
