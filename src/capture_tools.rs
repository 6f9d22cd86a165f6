// Capture file reader/writer
// Rapid-block captures written by the ps6000 DAQ front end

use crate::calibration::{adc_to_mv, mv_to_adc, VoltageRange};
use ndarray::{Array2, ArrayView1};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::string::FromUtf8Error;
use thiserror::Error;
use tracing::{debug, warn};

/// Bytes preceding the model and serial strings.
pub const FIXED_HEADER_LEN: usize = 32;

/// Upper bound on a NUL-terminated header string, terminator included.
pub const MAX_STRING_LEN: usize = 256;

pub const NUM_CHANNELS: usize = 4;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated file: {field} needs {expected} bytes, got {got}")]
    Truncated {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unterminated string field {field} (no NUL within {cap} bytes)")]
    MalformedString { field: &'static str, cap: usize },

    #[error("String field {field} is not valid UTF-8: {source}")]
    InvalidText {
        field: &'static str,
        source: FromUtf8Error,
    },

    #[error("String field {field} contains an embedded NUL")]
    EmbeddedNul { field: &'static str },

    #[error("Invalid voltage range selector {selector} for channel {channel}")]
    InvalidVoltageRange { channel: Channel, selector: u8 },

    #[error("Body too short: header declares {expected} bytes, file holds {available}")]
    BodyLength { expected: u64, available: u64 },

    #[error("Channel data does not match header: {0}")]
    LayoutMismatch(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Scope input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    A,
    B,
    C,
    D,
}

impl Channel {
    pub const ALL: [Channel; NUM_CHANNELS] = [Channel::A, Channel::B, Channel::C, Channel::D];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Active-channel nibble. Channel A is the most significant bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelMask(u8);

impl ChannelMask {
    pub fn from_bits(bits: u8) -> Self {
        ChannelMask(bits & 0x0f)
    }

    pub fn from_channels(channels: &[Channel]) -> Self {
        ChannelMask(
            channels
                .iter()
                .fold(0, |bits, ch| bits | (0b1000 >> ch.index())),
        )
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_active(self, channel: Channel) -> bool {
        self.0 & (0b1000 >> channel.index()) != 0
    }

    /// Active channels in ascending order.
    pub fn active(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |&ch| self.is_active(ch))
    }
}

/// Armed triggers: channels A..D on bits 4..1, auxiliary input on bit 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerMask(u8);

impl TriggerMask {
    pub fn from_bits(bits: u8) -> Self {
        TriggerMask(bits & 0x1f)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_armed(self, channel: Channel) -> bool {
        self.0 & (0b1_0000 >> channel.index()) != 0
    }

    pub fn aux_armed(self) -> bool {
        self.0 & 1 != 0
    }
}

/// Decoded capture header.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct CaptureHeader {
    pub timebase: u8,
    pub active_channels: ChannelMask,
    pub active_triggers: TriggerMask,
    pub aux_trigger_threshold_mv: f64,
    pub trigger_threshold_mv: [f64; NUM_CHANNELS],
    /// Raw 4-bit range nibbles. Only those of active channels must name a range.
    pub range_selectors: [u8; NUM_CHANNELS],
    pub samples: [u16; NUM_CHANNELS],
    pub pre_trigger_samples: u16,
    pub num_waveforms: u32,
    pub timestamp: i32,
    pub model: String,
    pub serial: String,
}

impl CaptureHeader {
    /// Decode the header from a stream positioned at offset 0.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let fixed = read_block(reader, FIXED_HEADER_LEN, "fixed header")?;
        let mut header = Self::parse_fixed(&fixed)?;
        header.model = read_terminated(reader, "model")?;
        header.serial = read_terminated(reader, "serial")?;
        debug!(
            model = %header.model,
            serial = %header.serial,
            timebase = header.timebase,
            active = %format!("{:04b}", header.active_channels.bits()),
            waveforms = header.num_waveforms,
            "Decoded capture header"
        );
        Ok(header)
    }

    fn parse_fixed(fixed: &[u8]) -> Result<Self> {
        if fixed.len() != FIXED_HEADER_LEN {
            return Err(CaptureError::Truncated {
                field: "fixed header",
                expected: FIXED_HEADER_LEN,
                got: fixed.len(),
            });
        }

        let mut header = CaptureHeader {
            timebase: fixed[0] >> 4,
            active_channels: ChannelMask::from_bits(fixed[0]),
            active_triggers: TriggerMask::from_bits(fixed[1]),
            aux_trigger_threshold_mv: threshold_mv(&fixed[2..4]),
            ..Default::default()
        };

        let ranges = read_uint(&fixed[12..14]) as u16;
        for ch in Channel::ALL {
            let i = ch.index();
            header.trigger_threshold_mv[i] = threshold_mv(&fixed[4 + 2 * i..6 + 2 * i]);

            header.range_selectors[i] = ((ranges >> (12 - 4 * i)) & 0x0f) as u8;

            header.samples[i] = read_uint(&fixed[14 + 2 * i..16 + 2 * i]) as u16;
        }

        header.pre_trigger_samples = read_uint(&fixed[22..24]) as u16;
        header.num_waveforms = read_uint(&fixed[24..28]) as u32;
        header.timestamp = read_twos(&fixed[28..32]) as i32;
        Ok(header)
    }

    /// Serialize in the on-disk layout, the inverse of [`CaptureHeader::read_from`].
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (field, text) in [("model", &self.model), ("serial", &self.serial)] {
            if text.as_bytes().contains(&0) {
                return Err(CaptureError::EmbeddedNul { field });
            }
        }

        let ranges = self
            .range_selectors
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, &sel)| acc | (u16::from(sel & 0x0f) << (12 - 4 * i)));

        let mut fixed = Vec::with_capacity(FIXED_HEADER_LEN);
        fixed.push(((self.timebase & 0x0f) << 4) | self.active_channels.bits());
        fixed.push(self.active_triggers.bits());
        fixed.extend_from_slice(
            &mv_to_adc(self.aux_trigger_threshold_mv, VoltageRange::TRIGGER).to_be_bytes(),
        );
        for mv in self.trigger_threshold_mv {
            fixed.extend_from_slice(&mv_to_adc(mv, VoltageRange::TRIGGER).to_be_bytes());
        }
        fixed.extend_from_slice(&ranges.to_be_bytes());
        for samples in self.samples {
            fixed.extend_from_slice(&samples.to_be_bytes());
        }
        fixed.extend_from_slice(&self.pre_trigger_samples.to_be_bytes());
        fixed.extend_from_slice(&self.num_waveforms.to_be_bytes());
        fixed.extend_from_slice(&self.timestamp.to_be_bytes());

        writer.write_all(&fixed)?;
        for text in [&self.model, &self.serial] {
            writer.write_all(text.as_bytes())?;
            writer.write_all(&[0])?;
        }
        Ok(())
    }

    /// Length of the encoded header in bytes.
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + self.model.len() + 1 + self.serial.len() + 1
    }

    pub fn samples_for(&self, channel: Channel) -> usize {
        self.samples[channel.index()] as usize
    }

    pub fn voltage_range(&self, channel: Channel) -> Result<VoltageRange> {
        let selector = self.range_selectors[channel.index()];
        VoltageRange::new(selector).ok_or(CaptureError::InvalidVoltageRange { channel, selector })
    }

    /// Body bytes contributed by one channel; zero when the channel is inactive.
    pub fn channel_block_len(&self, channel: Channel) -> u64 {
        if self.active_channels.is_active(channel) {
            u64::from(self.num_waveforms) * self.samples_for(channel) as u64 * 2
        } else {
            0
        }
    }

    pub fn body_len(&self) -> u64 {
        Channel::ALL
            .into_iter()
            .map(|ch| self.channel_block_len(ch))
            .sum()
    }
}

/// Trigger thresholds are stored as codes on the trigger circuit's own range.
fn threshold_mv(bytes: &[u8]) -> f64 {
    adc_to_mv(read_twos(bytes) as i16, VoltageRange::TRIGGER)
}

/// Unsigned big-endian integer of up to 8 bytes.
fn read_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Signed two's-complement big-endian integer of up to 8 bytes.
fn read_twos(bytes: &[u8]) -> i64 {
    let bits = 8 * bytes.len() as u32;
    let value = read_uint(bytes);
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    if value & (1 << (bits - 1)) != 0 {
        value as i64 - (1i64 << bits)
    } else {
        value as i64
    }
}

fn read_block<R: Read>(reader: &mut R, len: usize, field: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(CaptureError::Truncated {
            field,
            expected: len,
            got: buf.len(),
        });
    }
    Ok(buf)
}

fn read_terminated<R: Read>(reader: &mut R, field: &'static str) -> Result<String> {
    let mut text = Vec::new();
    for byte in reader.by_ref().bytes().take(MAX_STRING_LEN) {
        match byte? {
            0 => {
                return String::from_utf8(text)
                    .map_err(|source| CaptureError::InvalidText { field, source })
            }
            b => text.push(b),
        }
    }
    Err(CaptureError::MalformedString {
        field,
        cap: MAX_STRING_LEN,
    })
}

/// One channel's raw codes, shaped (waveform, sample).
#[derive(Clone, Debug, PartialEq)]
pub struct RawWaveformMatrix {
    pub channel: Channel,
    pub codes: Array2<i16>,
}

impl RawWaveformMatrix {
    /// Read the next channel block from the body.
    pub fn read_from<R: Read>(
        reader: &mut R,
        header: &CaptureHeader,
        channel: Channel,
    ) -> Result<Self> {
        let num_waveforms = header.num_waveforms as usize;
        let samples = header.samples_for(channel);
        let len = usize::try_from(header.channel_block_len(channel)).map_err(|_| {
            CaptureError::LayoutMismatch(format!("channel {channel} block exceeds address space"))
        })?;

        let bytes = read_block(reader, len, "channel data")?;
        let codes: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(RawWaveformMatrix {
            channel,
            codes: Array2::from_shape_vec((num_waveforms, samples), codes)?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes: Vec<u8> = self.codes.iter().flat_map(|c| c.to_be_bytes()).collect();
        writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn calibrate(&self, range: VoltageRange) -> CalibratedWaveform {
        CalibratedWaveform {
            channel: self.channel,
            range,
            data: self.codes.mapv(|code| adc_to_mv(code, range)),
        }
    }
}

/// One channel's waveforms in millivolts, shaped (waveform, sample).
#[derive(Clone, Debug, PartialEq)]
pub struct CalibratedWaveform {
    pub channel: Channel,
    pub range: VoltageRange,
    pub data: Array2<f64>,
}

impl CalibratedWaveform {
    pub fn num_waveforms(&self) -> usize {
        self.data.nrows()
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get voltage data for a specific waveform
    pub fn waveform(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.num_waveforms()).then(|| self.data.row(index))
    }
}

/// Streaming decoder: header on construction, then one active channel per `next()`.
pub struct CaptureReader<R> {
    header: CaptureHeader,
    reader: R,
    pending: std::vec::IntoIter<Channel>,
}

impl<R: Read> CaptureReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let header = CaptureHeader::read_from(&mut reader)?;
        let pending: Vec<Channel> = header.active_channels.active().collect();
        Ok(CaptureReader {
            header,
            reader,
            pending: pending.into_iter(),
        })
    }

    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    /// Decode every remaining active channel.
    pub fn load_all(self) -> Result<Vec<CalibratedWaveform>> {
        self.collect()
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<CalibratedWaveform>;

    fn next(&mut self) -> Option<Self::Item> {
        let channel = self.pending.next()?;
        let result = self.header.voltage_range(channel).and_then(|range| {
            RawWaveformMatrix::read_from(&mut self.reader, &self.header, channel)
                .map(|raw| raw.calibrate(range))
        });
        if result.is_err() {
            self.pending = Vec::new().into_iter();
        }
        Some(result)
    }
}

/// Open a capture file, checking the declared body length against the file size.
pub fn open_capture<P: AsRef<Path>>(path: P) -> Result<CaptureReader<BufReader<File>>> {
    let file = File::open(&path)?;
    let file_len = file.metadata()?.len();
    let reader = CaptureReader::new(BufReader::new(file))?;
    for channel in reader.header().active_channels.active() {
        reader.header().voltage_range(channel)?;
    }

    let expected = reader.header().body_len();
    let available = file_len.saturating_sub(reader.header().encoded_len() as u64);
    if available < expected {
        return Err(CaptureError::BodyLength {
            expected,
            available,
        });
    }
    if available > expected {
        warn!(
            "{} trailing bytes after capture body in {}",
            available - expected,
            path.as_ref().display()
        );
    }
    Ok(reader)
}

/// Write a header followed by the body of every active channel, in channel order.
pub fn write_capture<W: Write>(
    writer: &mut W,
    header: &CaptureHeader,
    channels: &[RawWaveformMatrix],
) -> Result<()> {
    let active: Vec<Channel> = header.active_channels.active().collect();
    let given: Vec<Channel> = channels.iter().map(|m| m.channel).collect();
    if active != given {
        return Err(CaptureError::LayoutMismatch(format!(
            "active channels {active:?}, matrices for {given:?}"
        )));
    }
    for matrix in channels {
        let expected = (
            header.num_waveforms as usize,
            header.samples_for(matrix.channel),
        );
        if matrix.codes.dim() != expected {
            return Err(CaptureError::LayoutMismatch(format!(
                "channel {} has shape {:?}, header declares {:?}",
                matrix.channel,
                matrix.codes.dim(),
                expected
            )));
        }
    }

    header.write_to(writer)?;
    for matrix in channels {
        matrix.write_to(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// A fully decoded capture file
#[derive(Debug)]
pub struct CaptureFile {
    pub file_path: String,
    pub header: CaptureHeader,
    pub channels: Vec<CalibratedWaveform>,
}

impl CaptureFile {
    /// Load and calibrate every active channel of the given file
    pub fn load<P: AsRef<Path>>(input_file: P) -> Result<Self> {
        let reader = open_capture(&input_file)?;
        let header = reader.header().clone();
        Ok(CaptureFile {
            file_path: input_file.as_ref().to_string_lossy().to_string(),
            header,
            channels: reader.load_all()?,
        })
    }

    pub fn channel(&self, channel: Channel) -> Option<&CalibratedWaveform> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;

    fn create_test_header() -> Vec<u8> {
        let mut header = vec![0u8; FIXED_HEADER_LEN];

        // timebase 3, channels A and C
        header[0] = 0x3a;
        // triggers on A and aux
        header[1] = 0b1_0001;
        header[2..4].copy_from_slice(&(-16256i16).to_be_bytes());
        header[4..6].copy_from_slice(&3251i16.to_be_bytes());
        header[6..8].copy_from_slice(&(-1i16).to_be_bytes());
        // ranges A=0, B=2, C=5, D=11
        header[12..14].copy_from_slice(&0x025bu16.to_be_bytes());
        header[14..16].copy_from_slice(&4u16.to_be_bytes());
        header[16..18].copy_from_slice(&400u16.to_be_bytes());
        header[18..20].copy_from_slice(&2u16.to_be_bytes());
        header[20..22].copy_from_slice(&65535u16.to_be_bytes());
        header[22..24].copy_from_slice(&100u16.to_be_bytes());
        header[24..28].copy_from_slice(&3u32.to_be_bytes());
        header[28..32].copy_from_slice(&(-42i32).to_be_bytes());

        header.extend_from_slice(b"6404D\0IW098/0028\0");
        header
    }

    #[test]
    fn test_header_parsing() {
        let bytes = create_test_header();
        let header = CaptureHeader::read_from(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(header.timebase, 3);
        assert_eq!(header.active_channels.bits(), 0b1010);
        assert_eq!(
            header.active_channels.active().collect::<Vec<_>>(),
            vec![Channel::A, Channel::C]
        );
        assert!(header.active_triggers.is_armed(Channel::A));
        assert!(!header.active_triggers.is_armed(Channel::B));
        assert!(header.active_triggers.aux_armed());
        assert_approx_eq!(header.aux_trigger_threshold_mv, -500.0);
        assert_approx_eq!(header.trigger_threshold_mv[0], 3251.0 / 32512.0 * 1000.0);
        assert!(header.trigger_threshold_mv[1] < 0.0);
        assert_eq!(header.range_selectors, [0, 2, 5, 11]);
        assert_eq!(header.voltage_range(Channel::C).unwrap().full_scale_mv(), 500.0);
        assert_eq!(header.samples, [4, 400, 2, 65535]);
        assert_eq!(header.pre_trigger_samples, 100);
        assert_eq!(header.num_waveforms, 3);
        assert_eq!(header.timestamp, -42);
        assert_eq!(header.model, "6404D");
        assert_eq!(header.serial, "IW098/0028");
        assert_eq!(header.encoded_len(), bytes.len());
    }

    #[test]
    fn test_twos_complement() {
        assert_eq!(read_twos(&[0x7f, 0xff]), 32767);
        assert_eq!(read_twos(&[0x80, 0x00]), -32768);
        assert_eq!(read_twos(&[0xff, 0xff, 0xff, 0xfe]), -2);
        assert_eq!(read_uint(&[0xff, 0xff]), 65535);
    }

    #[test]
    fn test_truncated_fixed_header() {
        let bytes = create_test_header();
        let result = CaptureHeader::read_from(&mut Cursor::new(&bytes[..20]));
        assert!(matches!(
            result,
            Err(CaptureError::Truncated {
                expected: FIXED_HEADER_LEN,
                got: 20,
                ..
            })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        let mut bytes = create_test_header();
        bytes.truncate(bytes.len() - 1);
        let result = CaptureHeader::read_from(&mut Cursor::new(&bytes));
        assert!(matches!(
            result,
            Err(CaptureError::MalformedString {
                field: "serial",
                ..
            })
        ));
    }

    #[test]
    fn test_string_cap() {
        let mut bytes = create_test_header();
        bytes.truncate(FIXED_HEADER_LEN);
        bytes.extend(std::iter::repeat(b'x').take(MAX_STRING_LEN + 10));
        bytes.push(0);
        let result = CaptureHeader::read_from(&mut Cursor::new(&bytes));
        assert!(matches!(
            result,
            Err(CaptureError::MalformedString { field: "model", .. })
        ));
    }

    #[test]
    fn test_invalid_range_selector() {
        let mut bytes = create_test_header();
        bytes[12] = 0xc2;
        bytes.extend(std::iter::repeat(0u8).take(24 + 12));

        // the header itself decodes; the active channel fails at calibration
        let mut reader = CaptureReader::new(Cursor::new(&bytes)).unwrap();
        assert_eq!(reader.header().range_selectors[0], 12);
        assert!(matches!(
            reader.next(),
            Some(Err(CaptureError::InvalidVoltageRange {
                channel: Channel::A,
                selector: 12
            }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_inactive_channel_range_ignored() {
        let mut bytes = create_test_header();
        // only A active, D nibble out of table
        bytes[0] = 0x38;
        bytes[13] = 0x0f;
        let codes: Vec<i16> = (0..12).map(|i| i as i16 * 100).collect();
        for code in &codes {
            bytes.extend_from_slice(&code.to_be_bytes());
        }

        let reader = CaptureReader::new(Cursor::new(&bytes)).unwrap();
        assert_eq!(reader.header().range_selectors[3], 15);
        assert!(reader.header().voltage_range(Channel::D).is_err());

        let channels = reader.load_all().unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel, Channel::A);
        assert_approx_eq!(channels[0].data[[2, 3]], 1100.0 / 32512.0 * 10.0);
    }

    #[test]
    fn test_header_round_trip() {
        let bytes = create_test_header();
        let header = CaptureHeader::read_from(&mut Cursor::new(&bytes)).unwrap();
        let mut encoded = Vec::new();
        header.write_to(&mut encoded).unwrap();
        assert_eq!(encoded, bytes);
    }

    #[test]
    fn test_channel_body_decoding() {
        let mut bytes = create_test_header();
        let codes_a: Vec<i16> = (0..12).map(|i| (i as i16 - 6) * 1000).collect();
        let codes_c: Vec<i16> = vec![32512, -32512, 16256, -16256, 0, 1];
        for code in codes_a.iter().chain(codes_c.iter()) {
            bytes.extend_from_slice(&code.to_be_bytes());
        }

        let channels = CaptureReader::new(Cursor::new(&bytes))
            .unwrap()
            .load_all()
            .unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].channel, Channel::A);
        assert_eq!(channels[0].data.dim(), (3, 4));
        assert_eq!(channels[1].channel, Channel::C);
        assert_eq!(channels[1].data.dim(), (3, 2));

        // range 0 is ±10 mV, range 5 is ±500 mV
        assert_approx_eq!(channels[0].data[[0, 0]], -6000.0 / 32512.0 * 10.0);
        assert_approx_eq!(channels[1].data[[0, 0]], 500.0);
        assert_approx_eq!(channels[1].data[[1, 0]], 250.0);
        assert_approx_eq!(channels[1].data[[0, 1]], -500.0);
        assert_eq!(channels[1].waveform(2).unwrap().len(), 2);
        assert!(channels[1].waveform(3).is_none());
    }

    #[test]
    fn test_truncated_channel_body() {
        let mut bytes = create_test_header();
        bytes.extend(std::iter::repeat(0u8).take(24 + 5));

        let mut reader = CaptureReader::new(Cursor::new(&bytes)).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next(),
            Some(Err(CaptureError::Truncated {
                expected: 12,
                got: 5,
                ..
            }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_write_capture_rejects_wrong_channels() {
        let bytes = create_test_header();
        let header = CaptureHeader::read_from(&mut Cursor::new(&bytes)).unwrap();
        let only_a = RawWaveformMatrix {
            channel: Channel::A,
            codes: Array2::zeros((3, 4)),
        };
        let result = write_capture(&mut Vec::new(), &header, &[only_a]);
        assert!(matches!(result, Err(CaptureError::LayoutMismatch(_))));
    }

    #[test]
    fn test_embedded_nul_rejected() {
        let header = CaptureHeader {
            model: "64\004D".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            header.write_to(&mut Vec::new()),
            Err(CaptureError::EmbeddedNul { field: "model" })
        ));
    }
}
