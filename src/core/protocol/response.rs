//! Transaction outcomes and response decoding
//!
//! A [`Response`] owns the bytes of one exchange. Field extraction goes through
//! a [`DecodeCursor`], which starts after the address, function code and byte
//! count and never consumes the CRC trailer.
//!
//! Devices disagree on how multi-register values are laid out, so the cursor
//! offers one accessor per convention seen in the field. The plain accessors
//! return zero when the field is missing; the `try_` variants report it.

use super::checksum::{self, CRC_LEN};
use super::modbus::{parse_coils, ExceptionCode, FunctionCode, EXCEPTION_FLAG};
use crate::core::transport::TransportError;
use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Offset of the first data byte in a read response
pub const DATA_OFFSET: usize = 3;

/// Timing of one exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Wall-clock time just before the request was written
    pub begin: DateTime<Local>,
    /// Elapsed time until the last byte arrived
    pub to_last_byte: Duration,
    /// Elapsed time until the exchange completed
    pub total: Duration,
}

/// Result of one request/response exchange
#[derive(Debug)]
pub enum Outcome {
    /// A frame of at least four bytes was assembled
    Success(Response),
    /// No port was open; nothing was written
    PortNotOpen,
    /// The request went out but no complete frame came back in time
    Timeout {
        /// Bytes that did arrive, if any
        partial: Vec<u8>,
    },
    /// The transport failed mid-exchange
    Fault(TransportError),
}

impl Outcome {
    /// Frame received and its CRC checks out
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(response) if response.crc_valid())
    }

    /// True for `Timeout`
    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Timeout { .. })
    }

    /// The received frame, regardless of its CRC
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Success(response) => Some(response),
            _ => None,
        }
    }

    /// Consume the outcome, keeping the received frame
    pub fn into_response(self) -> Option<Response> {
        match self {
            Outcome::Success(response) => Some(response),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(response) => write!(f, "{response}"),
            Outcome::PortNotOpen => write!(f, "Port not open"),
            Outcome::Timeout { partial } if partial.is_empty() => write!(f, "Timeout"),
            Outcome::Timeout { partial } => {
                write!(f, "Timeout (partial: {})", super::hex_spaced(partial))
            }
            Outcome::Fault(err) => write!(f, "Transport fault: {err}"),
        }
    }
}

/// Decoding error for the fallible accessors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The requested field lies past the data area
    #[error("field of {width} bytes at offset {offset} exceeds data limit {limit}")]
    FieldMissing {
        /// Offset the read started at
        offset: usize,
        /// Field width in bytes
        width: usize,
        /// First offset that is not readable (the CRC trailer)
        limit: usize,
    },
}

/// A received frame together with the request that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    request: Vec<u8>,
    data: Vec<u8>,
    timing: Timing,
}

impl Response {
    /// Bundle an exchange
    pub fn new(request: Vec<u8>, data: Vec<u8>, timing: Timing) -> Self {
        Self {
            request,
            data,
            timing,
        }
    }

    /// Request bytes as written
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// Response bytes exactly as received
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Exchange timing
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Address the request was sent to
    pub fn address_in(&self) -> u8 {
        self.request.first().copied().unwrap_or(0)
    }

    /// Address the response came from
    pub fn address_out(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    /// Function code of the request
    pub fn function_in(&self) -> u8 {
        self.request.get(1).copied().unwrap_or(0)
    }

    /// Function code of the response
    pub fn function_out(&self) -> u8 {
        self.data.get(1).copied().unwrap_or(0)
    }

    /// Known function code of the response, exception flag cleared
    pub fn function(&self) -> Option<FunctionCode> {
        FunctionCode::from_u8(self.function_out() & !EXCEPTION_FLAG)
    }

    /// Response carries a byte count and read data
    pub fn is_read_data(&self) -> bool {
        !self.is_exception() && self.function().is_some_and(FunctionCode::is_read)
    }

    /// CRC carried by the request
    pub fn crc_in(&self) -> u16 {
        checksum::trailing_crc(&self.request)
    }

    /// CRC carried by the response
    pub fn crc_out(&self) -> u16 {
        checksum::trailing_crc(&self.data)
    }

    /// CRC recomputed over the response, trailer excluded
    pub fn calc_crc(&self) -> u16 {
        checksum::body_crc(&self.data)
    }

    /// Response is longer than its trailer and the trailer matches
    pub fn crc_valid(&self) -> bool {
        checksum::verify_crc(&self.data)
    }

    /// Device answered with an exception frame
    pub fn is_exception(&self) -> bool {
        self.function_out() & EXCEPTION_FLAG != 0
    }

    /// Exception code of an exception frame
    pub fn exception(&self) -> Option<ExceptionCode> {
        if self.is_exception() {
            self.data.get(2).copied().and_then(ExceptionCode::from_u8)
        } else {
            None
        }
    }

    /// Cursor positioned at the first data byte
    pub fn cursor(&self) -> DecodeCursor<'_> {
        DecodeCursor::new(&self.data)
    }

    /// Register values of a 0x03/0x04 response, bounded by the byte count
    pub fn registers(&self) -> Vec<u16> {
        let declared = self.data.get(2).copied().unwrap_or(0) as usize / 2;
        let mut cursor = self.cursor();
        let available = cursor.remaining() / 2;
        (0..declared.min(available))
            .map(|_| cursor.read_u16_be())
            .collect()
    }

    /// Bit values of a 0x01/0x02 response
    pub fn bits(&self, count: usize) -> Vec<bool> {
        let declared = self.data.get(2).copied().unwrap_or(0) as usize;
        let limit = self.data.len().saturating_sub(CRC_LEN);
        let end = (DATA_OFFSET + declared).min(limit);
        if end <= DATA_OFFSET {
            return Vec::new();
        }
        parse_coils(&self.data[DATA_OFFSET..end], count)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.timing.begin.format("%Y-%m-%d %H:%M:%S%.3f"))?;
        writeln!(
            f,
            "Send : {} ,CRC = {:04X}",
            super::hex_spaced(&self.request),
            self.crc_in()
        )?;
        writeln!(
            f,
            "Recv : {} ,CRC = {:04X}",
            super::hex_spaced(&self.data),
            self.crc_out()
        )?;
        write!(
            f,
            "Time : {:.1}ms, Total : {:.1}ms",
            self.timing.to_last_byte.as_secs_f64() * 1000.0,
            self.timing.total.as_secs_f64() * 1000.0
        )
    }
}

/// Read position over a response's data area.
///
/// Reads never reach into the last two bytes. A read that does not fit leaves
/// the position where it was.
#[derive(Debug, Clone)]
pub struct DecodeCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DecodeCursor<'a> {
    /// Cursor over a raw frame, starting at offset 3
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: DATA_OFFSET,
        }
    }

    /// Current read offset into the frame
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the read offset
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advance without reading
    pub fn skip(&mut self, count: usize) {
        self.pos = self.pos.saturating_add(count);
    }

    /// Bytes left before the CRC trailer
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.pos)
    }

    fn limit(&self) -> usize {
        self.data.len().saturating_sub(CRC_LEN)
    }

    fn field_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        let limit = self.limit();
        match offset.checked_add(N) {
            Some(end) if end <= limit => {
                let mut out = [0u8; N];
                out.copy_from_slice(&self.data[offset..end]);
                Ok(out)
            }
            _ => Err(DecodeError::FieldMissing {
                offset,
                width: N,
                limit,
            }),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.field_at::<N>(self.pos)?;
        self.pos += N;
        Ok(bytes)
    }

    /// One byte
    pub fn try_read_u8(&mut self) -> Result<u8, DecodeError> {
        self.take::<1>().map(|[b]| b)
    }

    /// Big-endian register
    pub fn try_read_u16_be(&mut self) -> Result<u16, DecodeError> {
        self.take().map(u16::from_be_bytes)
    }

    /// Big-endian signed register
    pub fn try_read_i16_be(&mut self) -> Result<i16, DecodeError> {
        self.take().map(i16::from_be_bytes)
    }

    /// Big-endian 32-bit integer
    pub fn try_read_i32_be(&mut self) -> Result<i32, DecodeError> {
        self.take::<4>()
            .map(|bytes| bytes.iter().fold(0i32, |acc, &b| (acc << 8) | i32::from(b)))
    }

    /// Big-endian 64-bit integer
    pub fn try_read_i64_be(&mut self) -> Result<i64, DecodeError> {
        self.take().map(i64::from_be_bytes)
    }

    /// Double with all eight bytes in big-endian order
    pub fn try_read_f64_full_swap(&mut self) -> Result<f64, DecodeError> {
        self.take().map(f64::from_be_bytes)
    }

    /// Double with each register byte-swapped and register order kept.
    ///
    /// Wire `01 02 03 04 05 06 07 08` decodes as little-endian `02 01 04 03 06 05 08 07`.
    pub fn try_read_f64_word_swap(&mut self) -> Result<f64, DecodeError> {
        self.take::<8>().map(|b| {
            f64::from_le_bytes([b[1], b[0], b[3], b[2], b[5], b[4], b[7], b[6]])
        })
    }

    /// Float with each register byte-swapped and register order kept
    pub fn try_read_f32_word_swap(&mut self) -> Result<f32, DecodeError> {
        self.take::<4>()
            .map(|b| f32::from_le_bytes([b[1], b[0], b[3], b[2]]))
    }

    /// Big-endian float at the cursor
    pub fn try_read_f32_be(&mut self) -> Result<f32, DecodeError> {
        self.take().map(f32::from_be_bytes)
    }

    /// Big-endian float at offset 3, ignoring and not moving the cursor.
    ///
    /// Kept for devices whose integrations were written against the first data
    /// word only; prefer [`Self::try_read_f32_be`].
    pub fn try_read_f32_fixed(&self) -> Result<f32, DecodeError> {
        self.field_at(DATA_OFFSET).map(f32::from_be_bytes)
    }

    /// One byte, 0 if missing
    pub fn read_u8(&mut self) -> u8 {
        self.try_read_u8().unwrap_or_default()
    }

    /// Big-endian register, 0 if missing
    pub fn read_u16_be(&mut self) -> u16 {
        self.try_read_u16_be().unwrap_or_default()
    }

    /// Big-endian signed register, 0 if missing
    pub fn read_i16_be(&mut self) -> i16 {
        self.try_read_i16_be().unwrap_or_default()
    }

    /// Big-endian 32-bit integer, 0 if missing
    pub fn read_i32_be(&mut self) -> i32 {
        self.try_read_i32_be().unwrap_or_default()
    }

    /// Big-endian 64-bit integer, 0 if missing
    pub fn read_i64_be(&mut self) -> i64 {
        self.try_read_i64_be().unwrap_or_default()
    }

    /// See [`Self::try_read_f64_full_swap`]; 0.0 if missing
    pub fn read_f64_full_swap(&mut self) -> f64 {
        self.try_read_f64_full_swap().unwrap_or_default()
    }

    /// See [`Self::try_read_f64_word_swap`]; 0.0 if missing
    pub fn read_f64_word_swap(&mut self) -> f64 {
        self.try_read_f64_word_swap().unwrap_or_default()
    }

    /// See [`Self::try_read_f32_word_swap`]; 0.0 if missing
    pub fn read_f32_word_swap(&mut self) -> f32 {
        self.try_read_f32_word_swap().unwrap_or_default()
    }

    /// Big-endian float at the cursor, 0.0 if missing
    pub fn read_f32_be(&mut self) -> f32 {
        self.try_read_f32_be().unwrap_or_default()
    }

    /// See [`Self::try_read_f32_fixed`]; 0.0 if missing
    pub fn read_f32_fixed(&self) -> f32 {
        self.try_read_f32_fixed().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::checksum::append_crc;

    fn timing() -> Timing {
        Timing {
            begin: Local::now(),
            to_last_byte: Duration::from_millis(12),
            total: Duration::from_millis(15),
        }
    }

    fn with_crc(body: &[u8]) -> Vec<u8> {
        let mut data = body.to_vec();
        append_crc(&mut data);
        data
    }

    /// Frame `[01][03][byte count][payload][crc]`
    fn response_with(payload: &[u8]) -> Response {
        let mut data = vec![0x01, 0x03, payload.len() as u8];
        data.extend_from_slice(payload);
        append_crc(&mut data);
        let mut request = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02];
        append_crc(&mut request);
        Response::new(request, data, timing())
    }

    #[test]
    fn cursor_starts_after_header() {
        let response = response_with(&[0x12, 0x34]);
        let cursor = response.cursor();
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.remaining(), 2);
    }

    #[test]
    fn u16_is_big_endian() {
        let response = response_with(&[0x12, 0x34, 0xAB, 0xCD]);
        let mut cursor = response.cursor();
        assert_eq!(cursor.read_u16_be(), 0x1234);
        assert_eq!(cursor.read_u16_be(), 0xABCD);
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn i32_and_i64_are_big_endian() {
        let response = response_with(&[
            0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00,
        ]);
        let mut cursor = response.cursor();
        assert_eq!(cursor.read_i32_be(), 0x0102_0304);
        assert_eq!(cursor.read_i32_be(), -2);
        assert_eq!(cursor.read_i64_be(), 256);
    }

    #[test]
    fn i16_sign_extends() {
        let response = response_with(&[0xFF, 0x38]);
        assert_eq!(response.cursor().read_i16_be(), -200);
    }

    #[test]
    fn f64_full_swap_reverses_all_bytes() {
        let response = response_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let value = response.cursor().read_f64_full_swap();
        let expected = f64::from_le_bytes([8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(value.to_bits(), expected.to_bits());
    }

    #[test]
    fn f64_word_swap_reverses_each_register() {
        let response = response_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let value = response.cursor().read_f64_word_swap();
        let expected = f64::from_le_bytes([2, 1, 4, 3, 6, 5, 8, 7]);
        assert_eq!(value.to_bits(), expected.to_bits());
    }

    #[test]
    fn f64_conventions_on_real_values() {
        let wire = 1234.5678f64.to_be_bytes();
        let response = response_with(&wire);
        assert_eq!(response.cursor().read_f64_full_swap(), 1234.5678);

        let le = 1234.5678f64.to_le_bytes();
        let word_swapped = [le[1], le[0], le[3], le[2], le[5], le[4], le[7], le[6]];
        let response = response_with(&word_swapped);
        assert_eq!(response.cursor().read_f64_word_swap(), 1234.5678);
    }

    #[test]
    fn f32_word_swap_honors_cursor() {
        let le = 3.25f32.to_le_bytes();
        let response = response_with(&[0xAA, 0xBB, le[1], le[0], le[3], le[2]]);
        let mut cursor = response.cursor();
        cursor.skip(2);
        assert_eq!(cursor.read_f32_word_swap(), 3.25);
        assert_eq!(cursor.position(), 9);
    }

    #[test]
    fn f32_fixed_ignores_cursor() {
        let mut payload = 21.5f32.to_be_bytes().to_vec();
        payload.extend_from_slice(&99.0f32.to_be_bytes());
        let response = response_with(&payload);
        let mut cursor = response.cursor();
        cursor.skip(4);
        assert_eq!(cursor.read_f32_fixed(), 21.5);
        assert_eq!(cursor.position(), 7);
        assert_eq!(cursor.read_f32_be(), 99.0);
    }

    #[test]
    fn out_of_range_reads_return_zero() {
        let response = response_with(&[0x12, 0x34]);
        let mut cursor = response.cursor();
        let last = response.data().len() - 1;
        cursor.set_position(last);
        assert_eq!(cursor.read_u16_be(), 0);
        assert_eq!(cursor.read_u8(), 0);
        assert_eq!(cursor.read_f64_word_swap(), 0.0);
        assert_eq!(cursor.position(), last);
    }

    #[test]
    fn crc_trailer_is_not_data() {
        let response = response_with(&[0x12]);
        let mut cursor = response.cursor();
        assert_eq!(cursor.read_u8(), 0x12);
        assert_eq!(cursor.read_u16_be(), 0);
        assert_eq!(
            cursor.try_read_u16_be(),
            Err(DecodeError::FieldMissing {
                offset: 4,
                width: 2,
                limit: 4
            })
        );
    }

    #[test]
    fn huge_skip_does_not_overflow() {
        let response = response_with(&[0x12, 0x34]);
        let mut cursor = response.cursor();
        cursor.skip(usize::MAX);
        assert_eq!(cursor.read_u8(), 0);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn header_accessors() {
        let response = response_with(&[0x00, 0x2A, 0x00, 0x2B]);
        assert_eq!(response.address_in(), 0x01);
        assert_eq!(response.address_out(), 0x01);
        assert_eq!(response.function_in(), 0x03);
        assert_eq!(response.function_out(), 0x03);
        assert_eq!(response.crc_in(), 0x0BC4);
        assert_eq!(response.crc_out(), response.calc_crc());
        assert!(response.crc_valid());
        assert_eq!(response.registers(), vec![0x2A, 0x2B]);
    }

    #[test]
    fn crc_mismatch_is_not_success() {
        let mut response = response_with(&[0x00, 0x2A]);
        let last = response.data.len() - 1;
        response.data[last] ^= 0xFF;
        assert!(!response.crc_valid());
        let outcome = Outcome::Success(response);
        assert!(!outcome.is_success());
        assert!(outcome.response().is_some());
    }

    #[test]
    fn exception_frames() {
        let mut data = vec![0x01, 0x83, 0x02];
        append_crc(&mut data);
        let response = Response::new(vec![0x01, 0x03], data, timing());
        assert!(response.is_exception());
        assert_eq!(response.exception(), Some(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn function_clears_the_exception_flag() {
        let mut data = vec![0x01, 0x83, 0x02];
        append_crc(&mut data);
        let exception = Response::new(vec![0x01, 0x03], data, timing());
        assert_eq!(exception.function(), Some(FunctionCode::ReadHoldingRegisters));
        assert!(!exception.is_read_data());

        assert!(response_with(&[0x00, 0x01]).is_read_data());

        let echo = Response::new(vec![], with_crc(&[0x01, 0x06, 0x00, 0x01, 0x00, 0x03]), timing());
        assert_eq!(echo.function(), Some(FunctionCode::WriteSingleRegister));
        assert!(!echo.is_read_data());

        let unknown = Response::new(vec![], with_crc(&[0x01, 0x41, 0x00, 0x00]), timing());
        assert_eq!(unknown.function(), None);
        assert!(!unknown.is_read_data());
    }

    #[test]
    fn bits_unpack_lsb_first() {
        let mut data = vec![0x01, 0x01, 0x02, 0b0000_0101, 0b0000_0001];
        append_crc(&mut data);
        let response = Response::new(vec![], data, timing());
        assert_eq!(
            response.bits(10),
            vec![true, false, true, false, false, false, false, false, true, false]
        );
    }

    #[test]
    fn display_dumps_both_directions() {
        let response = response_with(&[0x00, 0x01]);
        let text = response.to_string();
        assert!(text.contains("Send : 01 03 00 00 00 02 C4 0B ,CRC = 0BC4"));
        assert!(text.contains("Recv : 01 03 02 00 01"));
        assert!(text.contains("Time : 12.0ms, Total : 15.0ms"));
    }

    #[test]
    fn timeout_display() {
        assert_eq!(Outcome::Timeout { partial: vec![] }.to_string(), "Timeout");
        assert_eq!(
            Outcome::Timeout {
                partial: vec![0x01, 0x03]
            }
            .to_string(),
            "Timeout (partial: 01 03)"
        );
    }
}
