use fractal_core::models::{Color, ImageWriterOptions, IndexedImage, NeverInterrupt};
use gif_support::{
    common::{ColorTable, TRAILER},
    extensions::{extension_block_len, write_extension},
    info::{CalcStatus, EvolutionInfo, FormulaInfo, FractalInfo, FractalMetadata, OrbitsInfo},
    writer::{GIFWriter, OPTION_FINAL_ASPECT_RATIO, OPTION_GIF87A, OPTION_POTENTIAL_16BIT},
    GIFReader,
};
use rand::Rng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_image(width: usize, height: usize, colors: usize) -> IndexedImage {
    let mut rng = rand::thread_rng();
    let mut image = IndexedImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            image.set_pixel(x, y, rng.gen_range(0..colors) as u8);
        }
    }

    image
}

fn completed_info(image: &IndexedImage, colors: usize) -> FractalInfo {
    let mut info = FractalInfo::default();
    info.set_x_min(-2.5);
    info.set_x_max(1.5);
    info.set_y_min(-1.5);
    info.set_y_max(1.5);
    info.set_x_dots(image.width as i16);
    info.set_y_dots(image.height as i16);
    info.set_colors(colors as i16);
    info.set_iterations(150);
    info.set_calc_status(CalcStatus::Completed);
    info
}

// pixel payload sub-block lengths, starting right after the initial code size
fn payload_sub_blocks(data: &[u8], colors: usize) -> Vec<usize> {
    let bits = gif_support::common::bits_per_pixel(colors.max(2));
    let mut offset = 13 + 3 * (1 << bits) + 10 + 1;
    let mut lengths = Vec::new();

    loop {
        let length = data[offset] as usize;
        lengths.push(length);
        offset += length + 1;

        if length == 0 {
            return lengths;
        }
    }
}

#[test]
fn round_trip_for_common_palette_sizes() {
    init_logging();

    for colors in &[2usize, 4, 16, 256] {
        let image = random_image(211, 97, *colors);
        let color_table = ColorTable::new(Color::gradient(*colors));
        let metadata = FractalMetadata::with_info(completed_info(&image, *colors));

        let data = GIFWriter::new()
            .write_to_vec(&image, &color_table, &metadata, &ImageWriterOptions::default())
            .expect("failed to write image");

        let gif = GIFReader::new().read(&data).expect("failed to read image");

        assert_eq!(gif.image.pixels, image.pixels, "{} colors", colors);
        assert!(gif.is_complete());
        assert_eq!(gif.bad_code_count, 0);
        assert_eq!(gif.header.color_table.colors.len(), (*colors).max(2));

        let info = gif.metadata.info.expect("fractal info block is missing");
        assert_eq!(info.x_min(), -2.5);
        assert_eq!(info.colors(), *colors as i16);
        assert_eq!(info.calc_status(), Some(CalcStatus::Completed));
    }
}

#[test]
fn pixel_payload_uses_full_sub_blocks() {
    let image = random_image(300, 200, 256);
    let data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(256)), &FractalMetadata::default(), &ImageWriterOptions::default())
        .unwrap();

    let lengths = payload_sub_blocks(&data, 256);
    let (full, last) = lengths.split_at(lengths.len() - 2);

    assert!(full.len() > 10);
    assert!(full.iter().all(|v| *v == 254));
    assert!(last[0] >= 1 && last[0] <= 254);
    assert_eq!(last[1], 0);
}

#[test]
fn uniform_image_round_trips() {
    let mut image = IndexedImage::new(4, 4);
    image.fill(1);

    let data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(4)), &FractalMetadata::default(), &ImageWriterOptions::default())
        .unwrap();
    let gif = GIFReader::new().read(&data).unwrap();

    assert_eq!(gif.image.pixels, vec![1u8; 16]);
}

#[test]
fn interrupted_save_is_well_formed_and_short() {
    init_logging();

    let image = random_image(64, 20, 16);
    let mut info = completed_info(&image, 16);
    info.set_calc_status(CalcStatus::Resumable);

    let metadata = FractalMetadata {
        resume: Some(vec![0xAB; 300]),
        ..FractalMetadata::with_info(info)
    };

    let mut data: Vec<u8> = Vec::new();
    let mut interrupt = |rows: usize| rows == 10;
    let outcome = GIFWriter::new()
        .write(
            &image,
            &ColorTable::new(Color::gradient(16)),
            &metadata,
            &mut data,
            &ImageWriterOptions::default(),
            &mut interrupt,
        )
        .expect("interrupted save should still succeed");

    assert!(outcome.interrupted);
    assert_eq!(outcome.rows_written, 10);
    assert_eq!(data[data.len() - 1], TRAILER);

    let gif = GIFReader::new().read(&data).expect("interrupted file should be readable");

    assert_eq!(gif.rows_decoded, 10);
    assert!(!gif.is_complete());
    assert_eq!(&gif.image.pixels[..64 * 10], &image.pixels[..64 * 10]);
    assert!(gif.metadata.resume.is_none());

    let info = gif.metadata.info.unwrap();
    assert_eq!(info.calc_status(), Some(CalcStatus::ParamsChanged));
    assert_eq!(info.tot_extend_len() as usize, extension_block_len(504));
}

#[test]
fn resumable_save_keeps_resume_block() {
    let image = random_image(32, 8, 4);
    let mut info = completed_info(&image, 4);
    info.set_calc_status(CalcStatus::Resumable);

    let resume = (0..700).map(|v| (v % 251) as u8).collect::<Vec<u8>>();
    let metadata = FractalMetadata {
        resume: Some(resume.clone()),
        ..FractalMetadata::with_info(info)
    };

    let data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(4)), &metadata, &ImageWriterOptions::default())
        .unwrap();
    let gif = GIFReader::new().read(&data).unwrap();

    assert_eq!(gif.metadata.resume, Some(resume));
    assert_eq!(gif.metadata.info.unwrap().calc_status(), Some(CalcStatus::Resumable));
}

#[test]
fn all_metadata_records_survive() {
    let image = random_image(40, 30, 16);

    let mut evolution = EvolutionInfo::default();
    evolution.evolving = 1;
    evolution.grid_size = 9;
    evolution.mutate[3] = 2;

    let mut info = completed_info(&image, 16);
    info.set_bf_math(1);
    info.set_bf_length(10);

    let metadata = FractalMetadata {
        info: Some(info),
        resume: None,
        formula: Some(FormulaInfo::new("Mandel3")),
        ranges: Some(vec![0, 10, 20, -1, 5]),
        extended_bounds: Some(vec![0x55; 22 * 12]),
        evolution: Some(evolution),
        orbits: Some(OrbitsInfo {
            x_min: -1.0,
            x_max: 1.0,
            draw_mode: b'l',
            ..OrbitsInfo::default()
        }),
    };

    let mut data: Vec<u8> = Vec::new();
    let outcome = GIFWriter::new()
        .write(
            &image,
            &ColorTable::new(Color::gradient(16)),
            &metadata,
            &mut data,
            &ImageWriterOptions::default(),
            &mut NeverInterrupt,
        )
        .unwrap();

    let gif = GIFReader::new().read(&data).unwrap();
    let read = gif.metadata;

    assert_eq!(read.formula, metadata.formula);
    assert_eq!(read.ranges, metadata.ranges);
    assert_eq!(read.extended_bounds, metadata.extended_bounds);
    assert_eq!(read.evolution, metadata.evolution);
    assert_eq!(read.orbits, metadata.orbits);

    let info = read.info.unwrap();
    assert_eq!(info.tot_extend_len() as usize, outcome.extension_bytes);
    assert_eq!(info.pot16bit(), 0);
}

#[test]
fn unknown_extension_ids_are_skipped() {
    let image = random_image(16, 16, 4);
    let mut data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(4)), &FractalMetadata::default(), &ImageWriterOptions::default())
        .unwrap();

    assert_eq!(data.pop(), Some(TRAILER));
    write_extension(&mut data, 99, &[1, 2, 3]).unwrap();
    write_extension(&mut data, 3, &FormulaInfo::new("late").to_bytes()).unwrap();
    data.push(TRAILER);

    let gif = GIFReader::new().read(&data).unwrap();

    assert_eq!(gif.image.pixels, image.pixels);
    assert_eq!(gif.skipped_ids, vec![99]);
    assert_eq!(gif.metadata.formula.unwrap().name, "late");
    assert!(gif.metadata.info.is_some());
}

#[test]
fn potential_16bit_round_trip() {
    init_logging();

    let mut rng = rand::thread_rng();
    let mut image = IndexedImage::with_potential(50, 40);
    for y in 0..40 {
        for x in 0..50 {
            image.set_potential(x, y, rng.gen_range(0..256 * 256) as u16);
        }
    }

    let options = ImageWriterOptions::default().with_option_bool(OPTION_POTENTIAL_16BIT, true);
    let data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(256)), &FractalMetadata::default(), &options)
        .unwrap();

    let gif = GIFReader::new().read(&data).unwrap();

    assert_eq!(gif.header.image_width, 100);
    assert_eq!(gif.header.image_height, 40);
    assert_eq!(gif.metadata.info.as_ref().map(|v| v.pot16bit()), Some(1));
    assert_eq!(gif.image.width, 50);
    assert_eq!(gif.image.pixels, image.pixels);
    assert_eq!(gif.image.potential, image.potential);
    assert_eq!(gif.image.get_potential(7, 9), image.get_potential(7, 9));
}

#[test]
fn legacy_mode_writes_plain_gif87a() {
    let image = random_image(20, 10, 16);
    let metadata = FractalMetadata::with_info(completed_info(&image, 16));
    let options = ImageWriterOptions::default()
        .with_option_bool(OPTION_GIF87A, true)
        .with_option_f64(OPTION_FINAL_ASPECT_RATIO, 0.75);

    let data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(16)), &metadata, &options)
        .unwrap();

    assert_eq!(&data[0..6], b"GIF87a");
    assert_eq!(data[12], 0);
    assert!(!data.windows(8).any(|w| w == b"fractint"));

    let gif = GIFReader::new().read(&data).unwrap();

    assert!(gif.header.legacy);
    assert!(gif.metadata.is_empty());
    assert_eq!(gif.image.pixels, image.pixels);
}

#[test]
fn aspect_ratio_survives_the_header() {
    let image = random_image(640, 4, 4);
    let options = ImageWriterOptions::default().with_option_f64(OPTION_FINAL_ASPECT_RATIO, 0.75);

    let data = GIFWriter::new()
        .write_to_vec(&image, &ColorTable::new(Color::gradient(4)), &FractalMetadata::default(), &options)
        .unwrap();
    let gif = GIFReader::new().read(&data).unwrap();

    let expected: f64 = (4.0 / 640.0) / 0.75 * 64.0 - 14.5;
    assert_eq!(gif.header.aspect_byte, expected.round().max(1.0) as u8);
    assert!(gif.aspect_ratio() > 0.0);
}
