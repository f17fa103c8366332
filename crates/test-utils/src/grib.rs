//! Synthetic GRIB2 generator.
//!
//! Creates minimal GRIB2 messages on a regular latitude/longitude grid
//! (template 3.0) with simple packing (template 5.0). Several messages
//! concatenated form a multi-step file, like the provider's 15-minute
//! precipitation steps within one forecast hour.

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition
    ni: u32,  // columns
    nj: u32,  // rows
    la1: i32, // first lat (microdegrees)
    lo1: i32, // first lon (microdegrees)
    di: u32,  // lon increment (microdegrees)
    dj: u32,  // lat increment (microdegrees)
    // Product definition
    param_category: u8,
    param_number: u8,
    forecast_minutes: u32,
    // Data
    data_values: Vec<f32>,
}

impl Grib2Builder {
    /// Total precipitation on a small ICON-D2 style grid (0.02° spacing,
    /// south-to-north rows, west-to-east columns).
    pub fn new_precipitation() -> Self {
        let ni = 6;
        let nj = 4;
        Self {
            center: 78, // DWD Offenbach
            year: 2024,
            month: 3,
            day: 1,
            hour: 0,
            ni,
            nj,
            la1: 47_000_000, // 47.0°N
            lo1: 6_000_000,  // 6.0°E
            di: 20_000,      // 0.02°
            dj: 20_000,      // 0.02°
            param_category: 1,
            param_number: 52, // total precipitation
            forecast_minutes: 0,
            data_values: vec![0.0; (ni * nj) as usize],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![0.0; (ni * nj) as usize];
        self
    }

    /// Grid origin (south-west corner) in microdegrees.
    pub fn with_origin(mut self, la1: i32, lo1: i32) -> Self {
        self.la1 = la1;
        self.lo1 = lo1;
        self
    }

    pub fn with_forecast_minutes(mut self, minutes: u32) -> Self {
        self.forecast_minutes = minutes;
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Latitude of row `j` in degrees.
    pub fn latitude(&self, j: u32) -> f64 {
        (self.la1 as f64 + (j * self.dj) as f64) / 1_000_000.0
    }

    /// Longitude of column `i` in degrees.
    pub fn longitude(&self, i: u32) -> f64 {
        (self.lo1 as f64 + (i * self.di) as f64) / 1_000_000.0
    }

    /// Build a file holding one message per step, 15 minutes apart.
    pub fn build_steps(&self, steps: &[Vec<f32>]) -> Vec<u8> {
        steps
            .iter()
            .enumerate()
            .flat_map(|(i, values)| {
                self.clone()
                    .with_forecast_minutes(self.forecast_minutes + 15 * i as u32)
                    .with_data(values.clone())
                    .build()
            })
            .collect()
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let mut message = Vec::new();

        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let section5 = self.build_section5();
        let section6 = self.build_section6();
        let section7 = self.build_section7();

        let message_length = 16 // Section 0
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4; // Section 8 (end)

        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(0); // Discipline: meteorological
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        message.extend_from_slice(&section1);
        message.extend_from_slice(&section3);
        message.extend_from_slice(&section4);
        message.extend_from_slice(&section5);
        message.extend_from_slice(&section6);
        message.extend_from_slice(&section7);

        // Section 8: End
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let section_length: u32 = 21;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&255u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 3.0: Latitude/Longitude
        let template_data_len = 58;
        let section_length: u32 = 14 + template_data_len;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(3);

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth (spherical, radius 6371229m)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFFFFFFu32.to_be_bytes()); // Subdivisions

        let la2 = self.la1 + ((self.nj - 1) * self.dj) as i32;
        let lo2 = self.lo1 + ((self.ni - 1) * self.di) as i32;

        section.extend_from_slice(&grib_i32(self.la1));
        section.extend_from_slice(&grib_i32(self.lo1));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&grib_i32(la2));
        section.extend_from_slice(&grib_i32(lo2));
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(0b0100_0000); // Scanning mode: +i, +j, i consecutive

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 4.0: Analysis or forecast at horizontal level
        let section_length: u32 = 34;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(4);

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Type of generating process (forecast)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(0); // Time range unit (minutes)
        section.extend_from_slice(&self.forecast_minutes.to_be_bytes());

        section.push(1); // Ground or water surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.push(255); // Type of second fixed surface (none)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    fn build_section5(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 5.0: Simple packing
        let (min_val, max_val) = self.value_range();
        let range = max_val - min_val;
        let bits_per_value: u8 = if range == 0.0 { 0 } else { 16 };

        let section_length: u32 = 21;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(5);

        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0

        section.extend_from_slice(&min_val.to_be_bytes()); // Reference value
        section.extend_from_slice(&grib_i16(self.binary_scale_factor()));
        section.extend_from_slice(&grib_i16(0)); // Decimal scale factor
        section.push(bits_per_value);
        section.push(0); // Original field type (floating point)

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let section_length: u32 = 6;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(6);
        section.push(255); // No bitmap, all data present

        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let packed_data = self.pack_simple();
        let section_length: u32 = 5 + packed_data.len() as u32;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed_data);

        section
    }

    fn value_range(&self) -> (f32, f32) {
        self.data_values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        )
    }

    // E = ceil(log2(range / 65535)), so the largest packed value fits in 16 bits.
    fn binary_scale_factor(&self) -> i16 {
        let (min_val, max_val) = self.value_range();
        let range = max_val - min_val;
        if range == 0.0 {
            0
        } else {
            (range / 65535.0).log2().ceil() as i16
        }
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (min_val, max_val) = self.value_range();
        if max_val - min_val == 0.0 {
            return Vec::new();
        }

        let binary_scale = 2.0_f32.powi(self.binary_scale_factor() as i32);

        let mut packed = Vec::with_capacity(self.data_values.len() * 2);
        for &val in &self.data_values {
            let packed_value = ((val - min_val) / binary_scale).round() as u16;
            packed.extend_from_slice(&packed_value.to_be_bytes());
        }
        packed
    }
}

/// GRIB2 signed integers are sign-magnitude, not two's complement.
fn grib_i32(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

fn grib_i16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_structure() {
        let builder = Grib2Builder::new_precipitation().with_data((0..24).map(|v| v as f32).collect());
        let bytes = builder.build();

        assert_eq!(&bytes[0..4], b"GRIB");
        assert_eq!(bytes[7], 2);
        let msg_len = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(msg_len as usize, bytes.len());
        assert_eq!(&bytes[bytes.len() - 4..], b"7777");
    }

    #[test]
    fn test_build_steps_concatenates_messages() {
        let builder = Grib2Builder::new_precipitation();
        let one = builder.build().len();
        let file = builder.build_steps(&[vec![0.0; 24], vec![0.0; 24], vec![0.0; 24]]);
        assert_eq!(file.len(), 3 * one);
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(grib_i32(-1), [0x80, 0, 0, 1]);
        assert_eq!(grib_i32(5), [0, 0, 0, 5]);
        assert_eq!(grib_i16(-12), [0x80, 12]);
    }

    #[test]
    fn test_axis_helpers() {
        let builder = Grib2Builder::new_precipitation();
        assert!((builder.latitude(1) - 47.02).abs() < 1e-9);
        assert!((builder.longitude(5) - 6.1).abs() < 1e-9);
    }
}
