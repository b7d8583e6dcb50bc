//! Synthetic GRIB2 message builder for decoder tests.
//!
//! Produces structurally valid single-message buffers shaped like the
//! grib-filter subset output: template 3.0 grid, template 4.0 product,
//! simple packing at 16 bits (or 0 bits for constant fields).

/// Builder for one synthetic GRIB2 message.
pub struct MessageBuilder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    ni: u32,
    nj: u32,
    /// First grid point, microdegrees. Defaults put the corner at
    /// 49.5N 268.0E, the northwest corner of a 0-360 subset window.
    la1: i32,
    lo1: i32,
    di: u32,
    dj: u32,
    scanning_mode: u8,
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    packing_template: u16,
    data_values: Vec<f32>,
    /// Present flags, one per grid point, when a bitmap is wanted.
    bitmap: Option<Vec<bool>>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        let ni = 10;
        let nj = 10;
        Self {
            discipline: 0,
            center: 7, // NCEP
            year: 2024,
            month: 3,
            day: 1,
            hour: 12,
            ni,
            nj,
            la1: 49_500_000,
            lo1: 268_000_000,
            di: 250_000, // 0.25 degrees
            dj: 250_000,
            scanning_mode: 0, // +i, -j: west to east, north to south
            param_category: 0,
            param_number: 0, // TMP
            level_type: 1,   // surface
            level_value: 0,
            forecast_hour: 0,
            packing_template: 0,
            data_values: vec![288.15; (ni * nj) as usize],
            bitmap: None,
        }
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
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

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    pub fn with_scanning_mode(mut self, mode: u8) -> Self {
        self.scanning_mode = mode;
        self
    }

    /// First grid point (La1/Lo1), in degrees. Which corner this is
    /// depends on the scanning mode.
    pub fn with_first_corner(mut self, lat: f64, lon: f64) -> Self {
        self.la1 = (lat * 1e6).round() as i32;
        self.lo1 = (lon * 1e6).round() as i32;
        self
    }

    pub fn with_packing_template(mut self, template: u16) -> Self {
        self.packing_template = template;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_gradient(mut self, min_val: f32, max_val: f32) -> Self {
        let n = (self.ni * self.nj) as usize;
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f32 / n as f32))
            .collect();
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    pub fn with_bitmap(mut self, present: Vec<bool>) -> Self {
        self.bitmap = Some(present);
        self
    }

    /// Assemble the complete message.
    pub fn build(&self) -> Vec<u8> {
        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let section5 = self.build_section5();
        let section6 = self.build_section6();
        let section7 = self.build_section7();

        let message_length = 16
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4;

        let mut message = Vec::with_capacity(message_length);

        // Section 0: indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // reserved
        message.push(self.discipline);
        message.push(2); // edition
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        message.extend_from_slice(&section1);
        message.extend_from_slice(&section3);
        message.extend_from_slice(&section4);
        message.extend_from_slice(&section5);
        message.extend_from_slice(&section6);
        message.extend_from_slice(&section7);

        // Section 8: end marker
        message.extend_from_slice(b"7777");

        message
    }

    /// Values that actually land in the packed stream: all of them, or
    /// the bitmap-present subset.
    fn present_values(&self) -> Vec<f32> {
        match &self.bitmap {
            Some(flags) => self
                .data_values
                .iter()
                .zip(flags)
                .filter(|(_, &p)| p)
                .map(|(&v, _)| v)
                .collect(),
            None => self.data_values.clone(),
        }
    }

    fn packing_params(&self) -> (f32, i16, u8) {
        let present = self.present_values();
        let (min_val, max_val) = present
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });

        if present.is_empty() || max_val - min_val == 0.0 {
            let reference = if present.is_empty() { 0.0 } else { min_val };
            return (reference, 0, 0);
        }

        // 16-bit packing: E = ceil(log2(range / 65535))
        let range = max_val - min_val;
        let binary_scale_factor = (range / 65535.0).log2().ceil() as i16;
        (min_val, binary_scale_factor, 16)
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();

        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // sub-center
        section.push(2); // master table version
        section.push(1); // local table version
        section.push(1); // significance: start of forecast

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // minute
        section.push(0); // second

        section.push(0); // production status
        section.push(1); // type of data: forecast

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();

        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3);

        section.push(0); // source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // octets for optional list
        section.push(0); // interpretation
        section.extend_from_slice(&0u16.to_be_bytes()); // template 3.0

        // Template 3.0 body (58 bytes)
        section.push(6); // shape of Earth
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // subdivisions

        let lo_step = i64::from(self.di) * if self.scanning_mode & 0x80 != 0 { -1 } else { 1 };
        let la_step = i64::from(self.dj) * if self.scanning_mode & 0x40 != 0 { 1 } else { -1 };
        let la2 = (i64::from(self.la1) + la_step * i64::from(self.nj - 1)) as i32;
        let lo2 = (i64::from(self.lo1) + lo_step * i64::from(self.ni - 1)) as i32;

        section.extend_from_slice(&self.la1.to_be_bytes());
        section.extend_from_slice(&self.lo1.to_be_bytes());
        section.push(48); // resolution and component flags
        section.extend_from_slice(&la2.to_be_bytes());
        section.extend_from_slice(&lo2.to_be_bytes());
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4);

        section.extend_from_slice(&0u16.to_be_bytes()); // coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // generating process: forecast
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes()); // cutoff hours
        section.push(0); // cutoff minutes
        section.push(1); // time unit: hours
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());

        section.push(self.level_type);
        section.push(0); // scale factor
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // no second fixed surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_params();
        let num_points = self.present_values().len() as u32;

        let mut section = Vec::new();

        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);

        section.extend_from_slice(&num_points.to_be_bytes());
        section.extend_from_slice(&self.packing_template.to_be_bytes());

        section.extend_from_slice(&reference_value.to_be_bytes());
        section.extend_from_slice(&binary_scale_factor.to_be_bytes());
        section.extend_from_slice(&0i16.to_be_bytes()); // decimal scale factor
        section.push(bits_per_value);
        section.push(0); // original field type: floating point

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();

        match &self.bitmap {
            Some(flags) => {
                let mut packed = vec![0u8; flags.len().div_ceil(8)];
                for (i, &present) in flags.iter().enumerate() {
                    if present {
                        packed[i / 8] |= 1 << (7 - i % 8);
                    }
                }
                section.extend_from_slice(&(6 + packed.len() as u32).to_be_bytes());
                section.push(6);
                section.push(0); // bitmap attached
                section.extend_from_slice(&packed);
            }
            None => {
                section.extend_from_slice(&6u32.to_be_bytes());
                section.push(6);
                section.push(255); // no bitmap, all points present
            }
        }

        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let packed = self.pack_simple();

        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed);

        section
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_params();
        if bits_per_value == 0 {
            return Vec::new();
        }

        let binary_scale = 2.0_f32.powi(i32::from(binary_scale_factor));

        let mut packed = Vec::new();
        for val in self.present_values() {
            let packed_value = ((val - reference_value) / binary_scale).round() as u16;
            packed.extend_from_slice(&packed_value.to_be_bytes());
        }

        packed
    }
}
