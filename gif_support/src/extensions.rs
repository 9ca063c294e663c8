use fractal_core::models::{ByteSink, ByteSource};

use crate::common::{APPLICATION_EXTENSION_LABEL, EXTENSION_INTRODUCER, EXTENSION_PACKET_SIZE, TRAILER};
use crate::errors::GIFError;
use crate::info::{
    ranges_from_bytes, ranges_to_bytes, CalcStatus, EvolutionInfo, FormulaInfo, FractalInfo,
    FractalMetadata, OrbitsInfo, FRACTAL_INFO_SIZE,
};
use crate::packet::{PacketFramer, SubBlockReader};

pub const EXTENSION_MARKER_SIZE: usize = 14;
const APPLICATION_ID: &[u8; 8] = b"fractint";
const APPLICATION_BLOCK_SIZE: u8 = 11;

pub const BLOCK_FRACTAL_INFO: u16 = 1;
pub const BLOCK_RESUME: u16 = 2;
pub const BLOCK_FORMULA: u16 = 3;
pub const BLOCK_RANGES: u16 = 4;
pub const BLOCK_EXTENDED_BOUNDS: u16 = 5;
pub const BLOCK_EVOLUTION: u16 = 6;
pub const BLOCK_ORBITS: u16 = 7;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtensionsRead {
    pub metadata: FractalMetadata,
    pub skipped_ids: Vec<u16>,
}

/// `!`, application label, block size 11, then `fractint` and the id as three digits.
pub fn extension_marker(id: u16) -> Vec<u8> {
    let mut marker = vec![EXTENSION_INTRODUCER, APPLICATION_EXTENSION_LABEL, APPLICATION_BLOCK_SIZE];
    marker.extend_from_slice(APPLICATION_ID);
    marker.extend_from_slice(format!("{:03}", id % 1000).as_bytes());
    marker
}

/// Bytes taken by one block in the file: payload, one length byte per 255
/// byte chunk, the marker and the zero-length terminator.
pub fn extension_block_len(payload_len: usize) -> usize {
    payload_len + (payload_len + EXTENSION_PACKET_SIZE - 1) / EXTENSION_PACKET_SIZE + EXTENSION_MARKER_SIZE + 1
}

pub fn write_extension(sink: &mut dyn ByteSink, id: u16, payload: &[u8]) -> Result<usize, GIFError> {
    sink.write_bytes(&extension_marker(id)).map_err(|err| GIFError::FailedToWrite {
        description: format!("failed to write marker of extension block {}: {}", id, err),
    })?;

    let mut framer = PacketFramer::new(sink, EXTENSION_PACKET_SIZE);
    framer.push_all(payload)?;
    framer.finish()?;

    trace!("extension block {:03}: {} bytes of payload", id, payload.len());

    Ok(extension_block_len(payload.len()))
}

/// Writes every present record, block 1 last with the total length of all
/// blocks patched in. Returns that total.
pub fn write_extensions(
    sink: &mut dyn ByteSink,
    metadata: &FractalMetadata,
    interrupted: bool,
    potential_16bit: bool,
) -> Result<usize, GIFError> {
    let mut info = metadata.info.clone().unwrap_or_default();

    if interrupted {
        info.set_calc_status(CalcStatus::ParamsChanged);
    }
    info.set_pot16bit(if potential_16bit { 1 } else { 0 });

    let mut total = 0;

    if let Some(resume) = &metadata.resume {
        if info.calc_status() == Some(CalcStatus::Resumable) {
            total += write_extension(sink, BLOCK_RESUME, resume)?;
        } else {
            debug!("resume data dropped, calculation status is {}", info.calc_status_raw());
        }
    }

    if let Some(formula) = &metadata.formula {
        total += write_extension(sink, BLOCK_FORMULA, &formula.to_bytes())?;
    }

    if let Some(ranges) = &metadata.ranges {
        if !ranges.is_empty() {
            total += write_extension(sink, BLOCK_RANGES, &ranges_to_bytes(ranges))?;
        }
    }

    if let Some(bounds) = &metadata.extended_bounds {
        if info.bf_math() != 0 {
            let expected = info.extended_bounds_len();
            if bounds.len() != expected {
                return Err(GIFError::InvalidImage {
                    description: format!(
                        "extended precision corners take {} bytes, bf_length {} needs {}",
                        bounds.len(), info.bf_length(), expected,
                    ),
                });
            }

            total += write_extension(sink, BLOCK_EXTENDED_BOUNDS, bounds)?;
        } else {
            debug!("extended precision corners dropped, bf_math is off");
        }
    }

    if let Some(evolution) = &metadata.evolution {
        total += write_extension(sink, BLOCK_EVOLUTION, &evolution.to_bytes())?;
    }

    if let Some(orbits) = &metadata.orbits {
        total += write_extension(sink, BLOCK_ORBITS, &orbits.to_bytes())?;
    }

    total += extension_block_len(FRACTAL_INFO_SIZE);
    info.set_tot_extend_len(total as i32);
    write_extension(sink, BLOCK_FRACTAL_INFO, &info.to_bytes())?;

    debug!("extension blocks written: {} bytes", total);

    Ok(total)
}

/// Parses blocks until the trailer, anything that is not one of our blocks,
/// or the end of the source.
pub fn read_extensions(source: &mut dyn ByteSource) -> Result<ExtensionsRead, GIFError> {
    let mut result = ExtensionsRead::default();

    loop {
        let id = match read_marker(source)? {
            Some(v) => v,
            None => break,
        };

        let payload = SubBlockReader::new(source).read_to_end()?;
        trace!("extension block {:03}: {} bytes of payload", id, payload.len());

        let metadata = &mut result.metadata;
        match id {
            BLOCK_FRACTAL_INFO => metadata.info = Some(FractalInfo::from_bytes(&payload)),
            BLOCK_RESUME => metadata.resume = Some(payload),
            BLOCK_FORMULA => metadata.formula = Some(FormulaInfo::from_bytes(&payload)),
            BLOCK_RANGES => metadata.ranges = Some(ranges_from_bytes(&payload)),
            BLOCK_EXTENDED_BOUNDS => metadata.extended_bounds = Some(payload),
            BLOCK_EVOLUTION => metadata.evolution = Some(EvolutionInfo::from_bytes(&payload)),
            BLOCK_ORBITS => metadata.orbits = Some(OrbitsInfo::from_bytes(&payload)),
            other => {
                warn!("skipping unknown extension block {:03}", other);
                result.skipped_ids.push(other);
            }
        }
    }

    Ok(result)
}

fn read_marker(source: &mut dyn ByteSource) -> Result<Option<u16>, GIFError> {
    let mut marker = Vec::with_capacity(EXTENSION_MARKER_SIZE);

    while marker.len() < EXTENSION_MARKER_SIZE {
        match read_byte(source)? {
            Some(v) => marker.push(v),
            None => {
                if marker.is_empty() {
                    warn!("no trailer after extension blocks, file may be truncated");
                } else {
                    warn!("extension block marker cut short after {} bytes", marker.len());
                }
                return Ok(None);
            }
        }

        if marker.len() == 1 && marker[0] == TRAILER {
            return Ok(None);
        }
    }

    let expected = extension_marker(0);
    if marker[..11] != expected[..11] {
        debug!("extension parsing stopped at foreign block {:x?}", &marker[..3]);
        return Ok(None);
    }

    let digits = &marker[11..];
    if !digits.iter().all(|v| v.is_ascii_digit()) {
        debug!("extension parsing stopped at malformed block id {:x?}", digits);
        return Ok(None);
    }

    Ok(Some(digits.iter().fold(0u16, |id, v| id * 10 + (v - b'0') as u16)))
}

fn read_byte(source: &mut dyn ByteSource) -> Result<Option<u8>, GIFError> {
    source.read_byte().map_err(|err| GIFError::FailedToRead {
        description: format!("failed to read extension block: {}", err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_fourteen_bytes() {
        let marker = extension_marker(7);

        assert_eq!(marker.len(), EXTENSION_MARKER_SIZE);
        assert_eq!(&marker[..], b"!\xFF\x0Bfractint007");
    }

    #[test]
    fn block_len_matches_bytes_written() {
        for len in &[0usize, 1, 254, 255, 256, 504, 1000] {
            let mut data: Vec<u8> = Vec::new();
            let reported = write_extension(&mut data, 4, &vec![9u8; *len]).unwrap();

            assert_eq!(reported, data.len());
            assert_eq!(reported, extension_block_len(*len));
        }
    }

    #[test]
    fn block_len_of_fractal_info() {
        assert_eq!(extension_block_len(504), 504 + 2 + 15);
    }

    #[test]
    fn blocks_are_written_in_order_with_info_last() {
        let mut info = FractalInfo::default();
        info.set_calc_status(CalcStatus::Resumable);

        let metadata = FractalMetadata {
            info: Some(info),
            resume: Some(vec![1, 2, 3]),
            formula: Some(FormulaInfo::new("frm")),
            ranges: Some(vec![0, 5, 10]),
            extended_bounds: None,
            evolution: Some(EvolutionInfo::default()),
            orbits: Some(OrbitsInfo::default()),
        };

        let mut data: Vec<u8> = Vec::new();
        let total = write_extensions(&mut data, &metadata, false, false).unwrap();
        assert_eq!(total, data.len());

        let ids: Vec<&[u8]> = data.windows(EXTENSION_MARKER_SIZE)
            .filter(|w| &w[3..11] == b"fractint")
            .map(|w| &w[11..14])
            .collect();
        let expected = vec![&b"002"[..], &b"003"[..], &b"004"[..], &b"006"[..], &b"007"[..], &b"001"[..]];
        assert_eq!(ids, expected);

        data.push(TRAILER);
        let mut source: &[u8] = &data;
        let read = read_extensions(&mut source).unwrap();

        let info = read.metadata.info.clone().unwrap();
        assert_eq!(info.tot_extend_len() as usize, total);
        assert_eq!(read.metadata.resume, metadata.resume);
        assert_eq!(read.metadata.formula, metadata.formula);
        assert_eq!(read.metadata.ranges, metadata.ranges);
        assert!(read.skipped_ids.is_empty());
    }

    #[test]
    fn interruption_drops_resume_block() {
        let mut info = FractalInfo::default();
        info.set_calc_status(CalcStatus::Resumable);

        let metadata = FractalMetadata {
            info: Some(info),
            resume: Some(vec![1, 2, 3]),
            ..FractalMetadata::default()
        };

        let mut data: Vec<u8> = Vec::new();
        let total = write_extensions(&mut data, &metadata, true, false).unwrap();
        assert_eq!(total, extension_block_len(504));

        let mut source: &[u8] = &data;
        let read = read_extensions(&mut source).unwrap();

        assert_eq!(read.metadata.resume, None);
        assert_eq!(read.metadata.info.unwrap().calc_status(), Some(CalcStatus::ParamsChanged));
    }

    fn with_bounds(bf_math: i16, bf_length: i16, bounds: Vec<u8>) -> FractalMetadata {
        let mut info = FractalInfo::default();
        info.set_bf_math(bf_math);
        info.set_bf_length(bf_length);

        FractalMetadata {
            info: Some(info),
            extended_bounds: Some(bounds),
            ..FractalMetadata::default()
        }
    }

    #[test]
    fn extended_bounds_need_bf_math() {
        let mut data: Vec<u8> = Vec::new();
        let total = write_extensions(&mut data, &with_bounds(0, 0, vec![1; 7]), false, false).unwrap();

        assert_eq!(total, extension_block_len(504));
        assert!(!data.windows(11).any(|w| w == b"fractint005"));

        let mut source: &[u8] = &data;
        assert_eq!(read_extensions(&mut source).unwrap().metadata.extended_bounds, None);
    }

    #[test]
    fn extended_bounds_are_written_with_matching_length() {
        let bounds = vec![3u8; 22 * (4 + 2)];

        let mut data: Vec<u8> = Vec::new();
        let total = write_extensions(&mut data, &with_bounds(1, 4, bounds.clone()), false, false).unwrap();

        assert_eq!(total, extension_block_len(bounds.len()) + extension_block_len(504));

        let mut source: &[u8] = &data;
        assert_eq!(read_extensions(&mut source).unwrap().metadata.extended_bounds, Some(bounds));
    }

    #[test]
    fn extended_bounds_of_wrong_length_are_rejected() {
        let mut data: Vec<u8> = Vec::new();
        let result = write_extensions(&mut data, &with_bounds(1, 4, vec![1; 7]), false, false);

        assert!(matches!(result, Err(GIFError::InvalidImage { .. })));
    }

    #[test]
    fn missing_info_is_written_with_defaults() {
        let mut data: Vec<u8> = Vec::new();
        write_extensions(&mut data, &FractalMetadata::default(), false, true).unwrap();

        let mut source: &[u8] = &data;
        let info = read_extensions(&mut source).unwrap().metadata.info.unwrap();

        assert!(info.has_valid_id());
        assert_eq!(info.pot16bit(), 1);
    }

    #[test]
    fn unknown_blocks_are_skipped() {
        let mut data: Vec<u8> = Vec::new();
        write_extension(&mut data, 42, &[1, 2, 3, 4]).unwrap();
        write_extension(&mut data, 3, &FormulaInfo::new("after").to_bytes()).unwrap();
        data.push(TRAILER);

        let mut source: &[u8] = &data;
        let read = read_extensions(&mut source).unwrap();

        assert_eq!(read.skipped_ids, vec![42]);
        assert_eq!(read.metadata.formula.unwrap().name, "after");
    }

    #[test]
    fn parsing_stops_at_foreign_block() {
        let mut data: Vec<u8> = Vec::new();
        write_extension(&mut data, 3, &FormulaInfo::new("first").to_bytes()).unwrap();
        data.extend_from_slice(b"!\xFF\x0BNETSCAPE2.0");
        data.extend_from_slice(&[3, 1, 0, 0, 0]);
        write_extension(&mut data, 7, &OrbitsInfo::default().to_bytes()).unwrap();

        let mut source: &[u8] = &data;
        let read = read_extensions(&mut source).unwrap();

        assert!(read.metadata.formula.is_some());
        assert!(read.metadata.orbits.is_none());
    }

    #[test]
    fn truncated_file_ends_parsing_quietly() {
        let mut data: Vec<u8> = Vec::new();
        write_extension(&mut data, 3, &FormulaInfo::new("x").to_bytes()).unwrap();
        data.extend_from_slice(b"!\xFF\x0Bfrac");

        let mut source: &[u8] = &data;
        let read = read_extensions(&mut source).unwrap();

        assert!(read.metadata.formula.is_some());
        assert!(read.metadata.info.is_none());
    }
}
