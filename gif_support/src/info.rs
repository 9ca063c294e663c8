use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

pub const FRACTAL_INFO_SIZE: usize = 504;
pub const FORMULA_INFO_SIZE: usize = 66;
pub const EVOLUTION_INFO_SIZE: usize = 200;
pub const ORBITS_INFO_SIZE: usize = 200;

pub const INFO_ID: &[u8; 8] = b"Fractal\0";
pub const INFO_VERSION: i16 = 18;

pub const NUM_GENES: usize = 21;

const FORMULA_NAME_SIZE: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalcStatus {
    NoFractal,
    ParamsChanged,
    InProgress,
    Resumable,
    NonResumable,
    Completed,
}

impl CalcStatus {

    pub fn from_i16(value: i16) -> Option<Self> {
        Some(match value {
            -1 => CalcStatus::NoFractal,
            0 => CalcStatus::ParamsChanged,
            1 => CalcStatus::InProgress,
            2 => CalcStatus::Resumable,
            3 => CalcStatus::NonResumable,
            4 => CalcStatus::Completed,
            _ => return None,
        })
    }

    pub fn to_i16(&self) -> i16 {
        match self {
            CalcStatus::NoFractal => -1,
            CalcStatus::ParamsChanged => 0,
            CalcStatus::InProgress => 1,
            CalcStatus::Resumable => 2,
            CalcStatus::NonResumable => 3,
            CalcStatus::Completed => 4,
        }
    }
}

macro_rules! accessors {
    ($($get:ident, $set:ident: $ty:ident @ $offset:expr;)*) => {
        $(accessors!(@one $get, $set, $ty, $offset);)*
    };
    (@one $get:ident, $set:ident, u8, $offset:expr) => {
        pub fn $get(&self) -> u8 {
            self.data[$offset]
        }

        pub fn $set(&mut self, value: u8) {
            self.data[$offset] = value;
        }
    };
    (@one $get:ident, $set:ident, i16, $offset:expr) => {
        pub fn $get(&self) -> i16 {
            LittleEndian::read_i16(&self.data[$offset..$offset + 2])
        }

        pub fn $set(&mut self, value: i16) {
            LittleEndian::write_i16(&mut self.data[$offset..$offset + 2], value);
        }
    };
    (@one $get:ident, $set:ident, i32, $offset:expr) => {
        pub fn $get(&self) -> i32 {
            LittleEndian::read_i32(&self.data[$offset..$offset + 4])
        }

        pub fn $set(&mut self, value: i32) {
            LittleEndian::write_i32(&mut self.data[$offset..$offset + 4], value);
        }
    };
    (@one $get:ident, $set:ident, f32, $offset:expr) => {
        pub fn $get(&self) -> f32 {
            LittleEndian::read_f32(&self.data[$offset..$offset + 4])
        }

        pub fn $set(&mut self, value: f32) {
            LittleEndian::write_f32(&mut self.data[$offset..$offset + 4], value);
        }
    };
    (@one $get:ident, $set:ident, f64, $offset:expr) => {
        pub fn $get(&self) -> f64 {
            LittleEndian::read_f64(&self.data[$offset..$offset + 8])
        }

        pub fn $set(&mut self, value: f64) {
            LittleEndian::write_f64(&mut self.data[$offset..$offset + 8], value);
        }
    };
}

/// Main parameter record (extension block 1). Kept as the packed 504 byte
/// image so fields this crate does not interpret survive a load/save cycle.
#[derive(Clone, PartialEq)]
pub struct FractalInfo {
    data: Vec<u8>,
}

impl FractalInfo {

    pub fn from_bytes(payload: &[u8]) -> Self {
        let mut data = vec![0u8; FRACTAL_INFO_SIZE];
        let len = payload.len().min(FRACTAL_INFO_SIZE);
        data[..len].copy_from_slice(&payload[..len]);

        FractalInfo {
            data,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn has_valid_id(&self) -> bool {
        &self.data[0..8] == &INFO_ID[..]
    }

    accessors! {
        iterations_old, set_iterations_old: i16 @ 8;
        fractal_type, set_fractal_type: i16 @ 10;
        x_min, set_x_min: f64 @ 12;
        x_max, set_x_max: f64 @ 20;
        y_min, set_y_min: f64 @ 28;
        y_max, set_y_max: f64 @ 36;
        c_real, set_c_real: f64 @ 44;
        c_imag, set_c_imag: f64 @ 52;
        dot_mode, set_dot_mode: i16 @ 68;
        x_dots, set_x_dots: i16 @ 70;
        y_dots, set_y_dots: i16 @ 72;
        colors, set_colors: i16 @ 74;
        info_version, set_info_version: i16 @ 76;
        param3, set_param3: f32 @ 78;
        param4, set_param4: f32 @ 82;
        random_seed, set_random_seed: i16 @ 98;
        random_flag, set_random_flag: i16 @ 100;
        biomorph, set_biomorph: i16 @ 102;
        inside, set_inside: i16 @ 104;
        symmetry, set_symmetry: i16 @ 124;
        outside, set_outside: i16 @ 182;
        x_3rd, set_x_3rd: f64 @ 184;
        y_3rd, set_y_3rd: f64 @ 192;
        std_calc_mode, set_std_calc_mode: u8 @ 200;
        use_init_orbit, set_use_init_orbit: u8 @ 201;
        calc_status_raw, set_calc_status_raw: i16 @ 202;
        tot_extend_len, set_tot_extend_len: i32 @ 204;
        float_flag, set_float_flag: i16 @ 210;
        calc_time, set_calc_time: i32 @ 214;
        periodicity, set_periodicity: i16 @ 240;
        pot16bit, set_pot16bit: i16 @ 242;
        final_aspect_ratio, set_final_aspect_ratio: f32 @ 244;
        release, set_release: i16 @ 250;
        d_param3, set_d_param3: f64 @ 270;
        d_param4, set_d_param4: f64 @ 278;
        fill_color, set_fill_color: i16 @ 286;
        bailout, set_bailout: i32 @ 402;
        bailout_test, set_bailout_test: i16 @ 406;
        iterations, set_iterations: i32 @ 408;
        bf_math, set_bf_math: i16 @ 412;
        bf_length, set_bf_length: i16 @ 414;
        version_major, set_version_major: u8 @ 490;
        version_minor, set_version_minor: u8 @ 491;
        version_patch, set_version_patch: u8 @ 492;
        version_tweak, set_version_tweak: u8 @ 493;
    }

    pub fn calc_status(&self) -> Option<CalcStatus> {
        CalcStatus::from_i16(self.calc_status_raw())
    }

    pub fn set_calc_status(&mut self, status: CalcStatus) {
        self.set_calc_status_raw(status.to_i16());
    }

    /// Size of the extended precision corner block (extension 5) implied by
    /// `bf_length`, or 0 when extended precision is not in use.
    pub fn extended_bounds_len(&self) -> usize {
        if self.bf_math() == 0 || self.bf_length() < 0 {
            return 0;
        }

        22 * (self.bf_length() as usize + 2)
    }
}

impl Default for FractalInfo {

    fn default() -> Self {
        let mut info = FractalInfo {
            data: vec![0u8; FRACTAL_INFO_SIZE],
        };

        info.data[0..8].copy_from_slice(INFO_ID);
        info.set_info_version(INFO_VERSION);
        info.set_calc_status(CalcStatus::NoFractal);
        info.set_final_aspect_ratio(0.75);

        info
    }
}

impl fmt::Debug for FractalInfo {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FractalInfo")
            .field("fractal_type", &self.fractal_type())
            .field("x_min", &self.x_min())
            .field("x_max", &self.x_max())
            .field("y_min", &self.y_min())
            .field("y_max", &self.y_max())
            .field("x_dots", &self.x_dots())
            .field("y_dots", &self.y_dots())
            .field("colors", &self.colors())
            .field("iterations", &self.iterations())
            .field("info_version", &self.info_version())
            .field("calc_status", &self.calc_status_raw())
            .field("tot_extend_len", &self.tot_extend_len())
            .field("pot16bit", &self.pot16bit())
            .field("final_aspect_ratio", &self.final_aspect_ratio())
            .finish()
    }
}

/// Formula selection record (extension block 3).
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaInfo {
    pub name: String,
    pub uses_p1: i16,
    pub uses_p2: i16,
    pub uses_p3: i16,
    pub uses_ismand: i16,
    pub ismand: i16,
    pub uses_p4: i16,
    pub uses_p5: i16,
}

impl FormulaInfo {

    pub fn new(name: &str) -> Self {
        FormulaInfo {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; FORMULA_INFO_SIZE];

        let name = self.name.as_bytes();
        let len = name.len().min(FORMULA_NAME_SIZE - 1);
        data[..len].copy_from_slice(&name[..len]);

        let flags = [
            self.uses_p1, self.uses_p2, self.uses_p3,
            self.uses_ismand, self.ismand, self.uses_p4, self.uses_p5,
        ];
        for (i, flag) in flags.iter().enumerate() {
            let offset = FORMULA_NAME_SIZE + i * 2;
            LittleEndian::write_i16(&mut data[offset..offset + 2], *flag);
        }

        data
    }

    /// Files written before the flags existed only carry the name; those get
    /// the defaults old formulas implied.
    pub fn from_bytes(payload: &[u8]) -> Self {
        let name_len = payload.len().min(FORMULA_NAME_SIZE);
        let name = &payload[..name_len];
        let name = match name.iter().position(|v| *v == 0) {
            Some(end) => &name[..end],
            None => name,
        };

        let mut info = FormulaInfo {
            name: String::from_utf8_lossy(name).to_string(),
            ..Self::default()
        };

        if payload.len() < FORMULA_INFO_SIZE {
            return info;
        }

        let flag = |i: usize| {
            let offset = FORMULA_NAME_SIZE + i * 2;
            LittleEndian::read_i16(&payload[offset..offset + 2])
        };

        info.uses_p1 = flag(0);
        info.uses_p2 = flag(1);
        info.uses_p3 = flag(2);
        info.uses_ismand = flag(3);
        info.ismand = flag(4);
        info.uses_p4 = flag(5);
        info.uses_p5 = flag(6);

        info
    }
}

impl Default for FormulaInfo {

    fn default() -> Self {
        FormulaInfo {
            name: String::new(),
            uses_p1: 1,
            uses_p2: 1,
            uses_p3: 1,
            uses_ismand: 0,
            ismand: 1,
            uses_p4: 0,
            uses_p5: 0,
        }
    }
}

/// Parameter evolution state (extension block 6).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvolutionInfo {
    pub evolving: i16,
    pub grid_size: i16,
    pub this_generation_random_seed: u16,
    pub max_random_mutation: f64,
    pub x_parameter_range: f64,
    pub y_parameter_range: f64,
    pub x_parameter_offset: f64,
    pub y_parameter_offset: f64,
    pub discrete_x_parameter_offset: i16,
    pub discrete_y_parameter_offset: i16,
    pub px: i16,
    pub py: i16,
    pub screen_x_offset: i16,
    pub screen_y_offset: i16,
    pub x_dots: i16,
    pub y_dots: i16,
    pub mutate: [i16; NUM_GENES],
    pub ecount: i16,
}

impl EvolutionInfo {

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; EVOLUTION_INFO_SIZE];

        LittleEndian::write_i16(&mut data[0..2], self.evolving);
        LittleEndian::write_i16(&mut data[2..4], self.grid_size);
        LittleEndian::write_u16(&mut data[4..6], self.this_generation_random_seed);
        LittleEndian::write_f64(&mut data[6..14], self.max_random_mutation);
        LittleEndian::write_f64(&mut data[14..22], self.x_parameter_range);
        LittleEndian::write_f64(&mut data[22..30], self.y_parameter_range);
        LittleEndian::write_f64(&mut data[30..38], self.x_parameter_offset);
        LittleEndian::write_f64(&mut data[38..46], self.y_parameter_offset);
        LittleEndian::write_i16(&mut data[46..48], self.discrete_x_parameter_offset);
        LittleEndian::write_i16(&mut data[48..50], self.discrete_y_parameter_offset);
        LittleEndian::write_i16(&mut data[50..52], self.px);
        LittleEndian::write_i16(&mut data[52..54], self.py);
        LittleEndian::write_i16(&mut data[54..56], self.screen_x_offset);
        LittleEndian::write_i16(&mut data[56..58], self.screen_y_offset);
        LittleEndian::write_i16(&mut data[58..60], self.x_dots);
        LittleEndian::write_i16(&mut data[60..62], self.y_dots);
        LittleEndian::write_i16_into(&self.mutate, &mut data[62..104]);
        LittleEndian::write_i16(&mut data[104..106], self.ecount);

        data
    }

    pub fn from_bytes(payload: &[u8]) -> Self {
        let data = padded(payload, EVOLUTION_INFO_SIZE);

        let mut mutate = [0i16; NUM_GENES];
        LittleEndian::read_i16_into(&data[62..104], &mut mutate);

        EvolutionInfo {
            evolving: LittleEndian::read_i16(&data[0..2]),
            grid_size: LittleEndian::read_i16(&data[2..4]),
            this_generation_random_seed: LittleEndian::read_u16(&data[4..6]),
            max_random_mutation: LittleEndian::read_f64(&data[6..14]),
            x_parameter_range: LittleEndian::read_f64(&data[14..22]),
            y_parameter_range: LittleEndian::read_f64(&data[22..30]),
            x_parameter_offset: LittleEndian::read_f64(&data[30..38]),
            y_parameter_offset: LittleEndian::read_f64(&data[38..46]),
            discrete_x_parameter_offset: LittleEndian::read_i16(&data[46..48]),
            discrete_y_parameter_offset: LittleEndian::read_i16(&data[48..50]),
            px: LittleEndian::read_i16(&data[50..52]),
            py: LittleEndian::read_i16(&data[52..54]),
            screen_x_offset: LittleEndian::read_i16(&data[54..56]),
            screen_y_offset: LittleEndian::read_i16(&data[56..58]),
            x_dots: LittleEndian::read_i16(&data[58..60]),
            y_dots: LittleEndian::read_i16(&data[60..62]),
            mutate,
            ecount: LittleEndian::read_i16(&data[104..106]),
        }
    }
}

/// Orbit window (extension block 7).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrbitsInfo {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub x_3rd: f64,
    pub y_3rd: f64,
    pub keep_screen_coords: i16,
    pub draw_mode: u8,
}

impl OrbitsInfo {

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; ORBITS_INFO_SIZE];

        LittleEndian::write_f64_into(
            &[self.x_min, self.x_max, self.y_min, self.y_max, self.x_3rd, self.y_3rd],
            &mut data[0..48],
        );
        LittleEndian::write_i16(&mut data[48..50], self.keep_screen_coords);
        data[50] = self.draw_mode;

        data
    }

    pub fn from_bytes(payload: &[u8]) -> Self {
        let data = padded(payload, ORBITS_INFO_SIZE);

        let mut corners = [0f64; 6];
        LittleEndian::read_f64_into(&data[0..48], &mut corners);

        OrbitsInfo {
            x_min: corners[0],
            x_max: corners[1],
            y_min: corners[2],
            y_max: corners[3],
            x_3rd: corners[4],
            y_3rd: corners[5],
            keep_screen_coords: LittleEndian::read_i16(&data[48..50]),
            draw_mode: data[50],
        }
    }
}

/// Everything the private extension blocks can carry. Absent records are
/// neither written nor reported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FractalMetadata {
    pub info: Option<FractalInfo>,
    pub resume: Option<Vec<u8>>,
    pub formula: Option<FormulaInfo>,
    pub ranges: Option<Vec<i16>>,
    pub extended_bounds: Option<Vec<u8>>,
    pub evolution: Option<EvolutionInfo>,
    pub orbits: Option<OrbitsInfo>,
}

impl FractalMetadata {

    pub fn with_info(info: FractalInfo) -> Self {
        FractalMetadata {
            info: Some(info),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn ranges_to_bytes(ranges: &[i16]) -> Vec<u8> {
    let mut data = vec![0u8; ranges.len() * 2];
    LittleEndian::write_i16_into(ranges, &mut data);
    data
}

/// A trailing odd byte cannot hold a value and is dropped.
pub fn ranges_from_bytes(payload: &[u8]) -> Vec<i16> {
    let mut ranges = vec![0i16; payload.len() / 2];
    LittleEndian::read_i16_into(&payload[..ranges.len() * 2], &mut ranges);
    ranges
}

fn padded(payload: &[u8], size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    let len = payload.len().min(size);
    data[..len].copy_from_slice(&payload[..len]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractal_info_fields_sit_at_fixed_offsets() {
        let mut info = FractalInfo::default();
        info.set_x_min(-2.5);
        info.set_x_dots(640);
        info.set_calc_status(CalcStatus::Resumable);
        info.set_tot_extend_len(0x01020304);
        info.set_iterations(150_000);

        let data = info.to_bytes();

        assert_eq!(data.len(), FRACTAL_INFO_SIZE);
        assert_eq!(&data[0..8], b"Fractal\0");
        assert_eq!(LittleEndian::read_i16(&data[76..78]), 18);
        assert_eq!(LittleEndian::read_f64(&data[12..20]), -2.5);
        assert_eq!(&data[70..72], &[0x80, 0x02]);
        assert_eq!(LittleEndian::read_i16(&data[202..204]), 2);
        assert_eq!(&data[204..208], &[4, 3, 2, 1]);
        assert_eq!(LittleEndian::read_i32(&data[408..412]), 150_000);
    }

    #[test]
    fn short_fractal_info_is_zero_extended() {
        let mut old = FractalInfo::default().to_bytes();
        old.truncate(102);

        let info = FractalInfo::from_bytes(&old);

        assert!(info.has_valid_id());
        assert_eq!(info.info_version(), INFO_VERSION);
        assert_eq!(info.iterations(), 0);
        assert_eq!(info.to_bytes().len(), FRACTAL_INFO_SIZE);

        let long = vec![1u8; 600];
        assert_eq!(FractalInfo::from_bytes(&long).to_bytes(), vec![1u8; FRACTAL_INFO_SIZE]);
    }

    #[test]
    fn unknown_calc_status_is_not_mapped() {
        let mut info = FractalInfo::default();
        info.set_calc_status_raw(42);

        assert_eq!(info.calc_status(), None);
        assert_eq!(FractalInfo::default().calc_status(), Some(CalcStatus::NoFractal));
    }

    #[test]
    fn formula_info_keeps_name_and_flags() {
        let mut formula = FormulaInfo::new("Mandel3");
        formula.uses_p2 = 0;
        formula.uses_ismand = 1;

        let data = formula.to_bytes();
        assert_eq!(data.len(), FORMULA_INFO_SIZE);
        assert_eq!(&data[0..8], b"Mandel3\0");

        assert_eq!(FormulaInfo::from_bytes(&data), formula);
    }

    #[test]
    fn old_formula_info_gets_default_flags() {
        let mut data = vec![0u8; FORMULA_NAME_SIZE];
        data[..4].copy_from_slice(b"frm1");

        let formula = FormulaInfo::from_bytes(&data);

        assert_eq!(formula.name, "frm1");
        assert_eq!((formula.uses_p1, formula.uses_p2, formula.uses_p3), (1, 1, 1));
        assert_eq!((formula.uses_ismand, formula.ismand), (0, 1));
        assert_eq!((formula.uses_p4, formula.uses_p5), (0, 0));
    }

    #[test]
    fn evolution_info_layout() {
        let mut evolution = EvolutionInfo::default();
        evolution.grid_size = 9;
        evolution.this_generation_random_seed = 0xBEEF;
        evolution.y_parameter_offset = 0.25;
        evolution.y_dots = 480;
        evolution.mutate[NUM_GENES - 1] = 3;
        evolution.ecount = 81;

        let data = evolution.to_bytes();

        assert_eq!(data.len(), EVOLUTION_INFO_SIZE);
        assert_eq!(LittleEndian::read_u16(&data[4..6]), 0xBEEF);
        assert_eq!(LittleEndian::read_f64(&data[38..46]), 0.25);
        assert_eq!(LittleEndian::read_i16(&data[102..104]), 3);
        assert_eq!(LittleEndian::read_i16(&data[104..106]), 81);
        assert_eq!(EvolutionInfo::from_bytes(&data), evolution);
    }

    #[test]
    fn orbits_info_layout() {
        let orbits = OrbitsInfo {
            x_min: -1.0,
            x_max: 1.0,
            y_min: -0.75,
            y_max: 0.75,
            x_3rd: -1.0,
            y_3rd: -0.75,
            keep_screen_coords: 1,
            draw_mode: b'r',
        };

        let data = orbits.to_bytes();

        assert_eq!(data.len(), ORBITS_INFO_SIZE);
        assert_eq!(data[50], b'r');
        assert_eq!(OrbitsInfo::from_bytes(&data), orbits);
    }

    #[test]
    fn ranges_ignore_trailing_byte() {
        let data = ranges_to_bytes(&[10, -1, 300]);

        assert_eq!(data, vec![10, 0, 0xFF, 0xFF, 0x2C, 0x01]);
        assert_eq!(ranges_from_bytes(&data[..5]), vec![10, -1]);
    }
}
