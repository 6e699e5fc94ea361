//! Mode S frame model and classification
//!
//! A sliced frame is 7 or 14 bytes; the top 5 bits of the first byte are
//! the downlink format, the last 24 bits are parity. Classification
//! recovers the transmitter's ICAO address: parity/interrogator downlinks
//! carry it explicitly and prove it with the CRC, address/parity downlinks
//! XOR it into the CRC so the syndrome itself is the candidate address.

use std::fmt;

use crate::crc;

pub const SHORT_FRAME_BITS: usize = 56;
pub const LONG_FRAME_BITS: usize = 112;
pub const SHORT_FRAME_BYTES: usize = SHORT_FRAME_BITS / 8;
pub const LONG_FRAME_BYTES: usize = LONG_FRAME_BITS / 8;

/// Low 7 bits of a DF11 syndrome encode the interrogator identifier, not
/// parity.
const ALL_CALL_SYNDROME_MASK: u32 = 0xFF_FF80;

/// Downlink formats understood by the pipeline. Any other 5-bit value is
/// invalid; classification yields `None` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownlinkFormat {
    /// DF 0: short air-air surveillance (ACAS)
    ShortAirAir,
    /// DF 4: surveillance, altitude reply
    SurveillanceAltitude,
    /// DF 5: surveillance, identity reply
    SurveillanceIdentity,
    /// DF 11: all-call reply
    AllCall,
    /// DF 16: long air-air surveillance (ACAS)
    LongAirAir,
    /// DF 17: extended squitter
    ExtendedSquitter,
    /// DF 18: extended squitter from non-transponder devices
    ExtendedSquitterNt,
    /// DF 20: Comm-B altitude reply
    CommBAltitude,
    /// DF 21: Comm-B identity reply
    CommBIdentity,
    /// DF 24: Comm-D extended length message
    CommD,
}

impl DownlinkFormat {
    /// Extract the downlink format from a frame's first byte (top 5 bits).
    ///
    /// Only the exact value 24 maps to [`DownlinkFormat::CommD`]; 25-31 are
    /// treated as invalid.
    pub fn from_frame_byte(byte: u8) -> Option<Self> {
        match (byte >> 3) & 0x1F {
            0 => Some(Self::ShortAirAir),
            4 => Some(Self::SurveillanceAltitude),
            5 => Some(Self::SurveillanceIdentity),
            11 => Some(Self::AllCall),
            16 => Some(Self::LongAirAir),
            17 => Some(Self::ExtendedSquitter),
            18 => Some(Self::ExtendedSquitterNt),
            20 => Some(Self::CommBAltitude),
            21 => Some(Self::CommBIdentity),
            24 => Some(Self::CommD),
            _ => None,
        }
    }

    /// The DF number as transmitted.
    pub fn number(self) -> u8 {
        match self {
            Self::ShortAirAir => 0,
            Self::SurveillanceAltitude => 4,
            Self::SurveillanceIdentity => 5,
            Self::AllCall => 11,
            Self::LongAirAir => 16,
            Self::ExtendedSquitter => 17,
            Self::ExtendedSquitterNt => 18,
            Self::CommBAltitude => 20,
            Self::CommBIdentity => 21,
            Self::CommD => 24,
        }
    }

    /// Frame length in bits for this format.
    pub fn bit_length(self) -> usize {
        match self {
            Self::ShortAirAir
            | Self::SurveillanceAltitude
            | Self::SurveillanceIdentity
            | Self::AllCall => SHORT_FRAME_BITS,
            _ => LONG_FRAME_BITS,
        }
    }

    /// Whether the trailing 24 bits are parity/interrogator, i.e. the ICAO
    /// address is carried explicitly in bytes 1..4 and proven by the CRC.
    pub fn has_explicit_address(self) -> bool {
        matches!(
            self,
            Self::AllCall | Self::ExtendedSquitter | Self::ExtendedSquitterNt
        )
    }
}

/// How a frame's trailing 24 bits carry the transmitter's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// DF11/17/18: parity only (or parity plus interrogator ID). The CRC
    /// proves the explicit address.
    ParityInterrogator,
    /// DF0/4/5/16/20/21/24: address XORed into the parity. Any bit pattern
    /// yields a plausible address; trust is decided downstream.
    AddressParity,
}

/// A validated Mode S downlink frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; LONG_FRAME_BYTES],
    len: usize,
    df: DownlinkFormat,
    icao: u32,
    error_bit: Option<usize>,
}

impl Frame {
    /// The frame payload (7 or 14 bytes).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn downlink_format(&self) -> DownlinkFormat {
        self.df
    }

    /// The recovered 24-bit ICAO address.
    pub fn icao(&self) -> u32 {
        self.icao
    }

    /// Bit position repaired during validation, if any.
    pub fn corrected_bit(&self) -> Option<usize> {
        self.error_bit
    }

    /// Canonical raw form: `*` + lowercase hex + `;`.
    pub fn to_raw_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*")?;
        for byte in self.bytes() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ";")
    }
}

/// Classify a sliced frame and recover its ICAO address.
///
/// Parity/interrogator frames must carry a clean (or single-bit-repairable)
/// syndrome; the repaired bytes are what the returned frame holds.
/// Address/parity frames surface the raw syndrome as the candidate address.
/// Returns `None` for frames that cannot yield a usable address.
pub fn classify(raw: &[u8]) -> Option<(Frame, AddressClass)> {
    let len = raw.len();
    if len != SHORT_FRAME_BYTES && len != LONG_FRAME_BYTES {
        return None;
    }
    let df = DownlinkFormat::from_frame_byte(raw[0])?;
    if df.bit_length() / 8 != len {
        return None;
    }

    let mut bytes = [0u8; LONG_FRAME_BYTES];
    bytes[..len].copy_from_slice(raw);
    let syndrome = crc::syndrome(&bytes[..len]);

    if df.has_explicit_address() {
        // DF18 reuses the address bytes for other content unless CF is 0.
        if df == DownlinkFormat::ExtendedSquitterNt && bytes[0] & 0x07 != 0 {
            return None;
        }
        let syndrome = if df == DownlinkFormat::AllCall {
            syndrome & ALL_CALL_SYNDROME_MASK
        } else {
            syndrome
        };
        let error_bit = if syndrome == 0 {
            None
        } else {
            let bit = crc::error_bit(len, syndrome)?;
            bytes[bit / 8] ^= 1u8 << (7 - bit % 8);
            Some(bit)
        };
        let icao = explicit_address(&bytes);
        Some((
            Frame {
                bytes,
                len,
                df,
                icao,
                error_bit,
            },
            AddressClass::ParityInterrogator,
        ))
    } else {
        Some((
            Frame {
                bytes,
                len,
                df,
                icao: syndrome,
                error_bit: None,
            },
            AddressClass::AddressParity,
        ))
    }
}

fn explicit_address(bytes: &[u8]) -> u32 {
    (u32::from(bytes[1]) << 16) | (u32::from(bytes[2]) << 8) | u32::from(bytes[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::checksum;

    const DF17_FRAME: [u8; 14] = [
        0x8D, 0x48, 0x40, 0xD6, 0x20, 0x2C, 0xC3, 0x71, 0xC3, 0x2C, 0xE0, 0x57, 0x60, 0x98,
    ];

    fn with_parity(mut frame: [u8; 7], parity: u32) -> [u8; 7] {
        frame[4] = (parity >> 16) as u8;
        frame[5] = (parity >> 8) as u8;
        frame[6] = parity as u8;
        frame
    }

    fn df11_frame(icao: u32) -> [u8; 7] {
        let frame = [
            0x5D,
            (icao >> 16) as u8,
            (icao >> 8) as u8,
            icao as u8,
            0,
            0,
            0,
        ];
        let crc = checksum(&frame);
        with_parity(frame, crc)
    }

    fn df4_frame(icao: u32) -> [u8; 7] {
        let frame = [0x20, 0x05, 0x30, 0x2A, 0, 0, 0];
        let crc = checksum(&frame);
        with_parity(frame, crc ^ icao)
    }

    #[test]
    fn test_downlink_format_extraction() {
        assert_eq!(
            DownlinkFormat::from_frame_byte(0x8D),
            Some(DownlinkFormat::ExtendedSquitter)
        );
        assert_eq!(
            DownlinkFormat::from_frame_byte(0x5D),
            Some(DownlinkFormat::AllCall)
        );
        assert_eq!(
            DownlinkFormat::from_frame_byte(0x20),
            Some(DownlinkFormat::SurveillanceAltitude)
        );
        assert_eq!(
            DownlinkFormat::from_frame_byte(24 << 3),
            Some(DownlinkFormat::CommD)
        );
        // DF1-3 and the 25-31 tail are invalid.
        assert_eq!(DownlinkFormat::from_frame_byte(1 << 3), None);
        assert_eq!(DownlinkFormat::from_frame_byte(25 << 3), None);
        assert_eq!(DownlinkFormat::from_frame_byte(31 << 3), None);
    }

    #[test]
    fn test_bit_lengths() {
        assert_eq!(DownlinkFormat::ShortAirAir.bit_length(), 56);
        assert_eq!(DownlinkFormat::AllCall.bit_length(), 56);
        assert_eq!(DownlinkFormat::ExtendedSquitter.bit_length(), 112);
        assert_eq!(DownlinkFormat::CommD.bit_length(), 112);
    }

    #[test]
    fn test_classify_clean_df17() {
        let (frame, class) = classify(&DF17_FRAME).unwrap();
        assert_eq!(class, AddressClass::ParityInterrogator);
        assert_eq!(frame.downlink_format().number(), 17);
        assert_eq!(frame.icao(), 0x4840D6);
        assert_eq!(frame.corrected_bit(), None);
        assert_eq!(frame.bytes(), &DF17_FRAME);
    }

    #[test]
    fn test_classify_repairs_single_bit() {
        let mut corrupted = DF17_FRAME;
        corrupted[5] ^= 0x80; // bit 40

        let (frame, _) = classify(&corrupted).unwrap();
        assert_eq!(frame.corrected_bit(), Some(40));
        assert_eq!(frame.bytes(), &DF17_FRAME);
        assert_eq!(frame.icao(), 0x4840D6);
    }

    #[test]
    fn test_classify_drops_two_bit_errors() {
        let mut corrupted = DF17_FRAME;
        corrupted[5] ^= 0x80;
        corrupted[7] ^= 0x10;
        assert!(classify(&corrupted).is_none());
    }

    #[test]
    fn test_classify_df11_ignores_interrogator_id() {
        // A replying transponder overlays the interrogator code on the low
        // parity bits; the masked syndrome still reads clean.
        let mut frame = df11_frame(0xABCDEF);
        frame[6] ^= 0x05;

        let (frame, class) = classify(&frame).unwrap();
        assert_eq!(class, AddressClass::ParityInterrogator);
        assert_eq!(frame.icao(), 0xABCDEF);
        assert_eq!(frame.corrected_bit(), None);
    }

    #[test]
    fn test_classify_df11_repairs_upper_parity_bit() {
        let mut corrupted = df11_frame(0xABCDEF);
        corrupted[5] ^= 0x80; // bit 40, above the interrogator mask

        let (frame, _) = classify(&corrupted).unwrap();
        assert_eq!(frame.corrected_bit(), Some(40));
        assert_eq!(frame.icao(), 0xABCDEF);
    }

    #[test]
    fn test_classify_df18_control_field() {
        let mut frame = [0u8; 14];
        frame[0] = 18 << 3;
        frame[1] = 0x48;
        frame[2] = 0x40;
        frame[3] = 0xD6;
        let crc = checksum(&frame);
        frame[11] = (crc >> 16) as u8;
        frame[12] = (crc >> 8) as u8;
        frame[13] = crc as u8;

        let (parsed, class) = classify(&frame).unwrap();
        assert_eq!(class, AddressClass::ParityInterrogator);
        assert_eq!(parsed.icao(), 0x4840D6);

        // CF != 0 carries no address.
        frame[0] = (18 << 3) | 1;
        assert!(classify(&frame).is_none());
    }

    #[test]
    fn test_classify_address_parity_surfaces_syndrome() {
        let (frame, class) = classify(&df4_frame(0x4840D6)).unwrap();
        assert_eq!(class, AddressClass::AddressParity);
        assert_eq!(frame.downlink_format(), DownlinkFormat::SurveillanceAltitude);
        assert_eq!(frame.icao(), 0x4840D6);
    }

    #[test]
    fn test_classify_rejects_length_mismatch() {
        // DF17 header on a short frame.
        assert!(classify(&DF17_FRAME[..7]).is_none());
        assert!(classify(&df11_frame(0x123456)[..4]).is_none());
        // Unknown DF.
        let mut frame = df11_frame(0x123456);
        frame[0] = 1 << 3;
        assert!(classify(&frame).is_none());
    }

    #[test]
    fn test_raw_string_is_lowercase() {
        let (frame, _) = classify(&DF17_FRAME).unwrap();
        assert_eq!(frame.to_raw_string(), "*8d4840d6202cc371c32ce0576098;");
        assert_eq!(format!("{}", frame), "*8d4840d6202cc371c32ce0576098;");
    }
}
