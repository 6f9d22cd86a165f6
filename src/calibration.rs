// src/calibration.rs
// ADC code <-> millivolt conversion for the ps6000 input ranges

use std::fmt;

/// Digitizer code corresponding to full scale on every range.
pub const MAX_ADC_CODE: i16 = 32512;

/// Full-scale voltage (mV) for each range selector.
pub const FULL_SCALE_MV: [f64; 12] = [
    10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0,
];

/// Voltage range selector as stored in the capture header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VoltageRange(u8);

impl VoltageRange {
    /// Range used by the trigger threshold circuit, independent of the channel settings.
    pub const TRIGGER: VoltageRange = VoltageRange(6);

    pub fn new(selector: u8) -> Option<Self> {
        ((selector as usize) < FULL_SCALE_MV.len()).then_some(VoltageRange(selector))
    }

    pub fn selector(self) -> u8 {
        self.0
    }

    pub fn full_scale_mv(self) -> f64 {
        FULL_SCALE_MV[self.0 as usize]
    }
}

impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "±{} mV", self.full_scale_mv())
    }
}

/// Convert a raw digitizer code to millivolts.
pub fn adc_to_mv(code: i16, range: VoltageRange) -> f64 {
    f64::from(code) / f64::from(MAX_ADC_CODE) * range.full_scale_mv()
}

/// Inverse of [`adc_to_mv`], saturating at the representable code range.
pub fn mv_to_adc(mv: f64, range: VoltageRange) -> i16 {
    let code = (mv / range.full_scale_mv() * f64::from(MAX_ADC_CODE)).round();
    code.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_full_scale_code() {
        for selector in 0..12 {
            let range = VoltageRange::new(selector).unwrap();
            assert_approx_eq!(adc_to_mv(MAX_ADC_CODE, range), range.full_scale_mv());
        }
    }

    #[test]
    fn test_half_scale_on_smallest_range() {
        let range = VoltageRange::new(0).unwrap();
        assert_approx_eq!(adc_to_mv(16256, range), 5.0);
        assert_approx_eq!(adc_to_mv(-16256, range), -5.0);
    }

    #[test]
    fn test_linear_and_monotonic() {
        let range = VoltageRange::new(4).unwrap();
        let codes = [-32512i16, -1000, -1, 0, 1, 1000, 32512];
        let volts: Vec<f64> = codes.iter().map(|&c| adc_to_mv(c, range)).collect();
        assert!(volts.windows(2).all(|w| w[0] < w[1]));
        assert_approx_eq!(adc_to_mv(1000, range), 1000.0 * adc_to_mv(1, range));
        assert_eq!(adc_to_mv(0, range), 0.0);
    }

    #[test]
    fn test_invalid_selector() {
        assert!(VoltageRange::new(11).is_some());
        assert!(VoltageRange::new(12).is_none());
        assert!(VoltageRange::new(15).is_none());
    }

    #[test]
    fn test_mv_to_adc_inverts() {
        for code in [-32512i16, -200, 0, 77, 32512] {
            let mv = adc_to_mv(code, VoltageRange::TRIGGER);
            assert_eq!(mv_to_adc(mv, VoltageRange::TRIGGER), code);
        }
        assert_eq!(mv_to_adc(1e9, VoltageRange::TRIGGER), i16::MAX);
    }
}
