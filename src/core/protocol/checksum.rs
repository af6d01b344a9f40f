//! Checksum calculation for Modbus RTU frames
//!
//! CRC-16/Modbus: polynomial 0xA001 (reflected 0x8005), init 0xFFFF,
//! transmitted low byte first.

/// Size of the CRC trailer on the wire
pub const CRC_LEN: usize = 2;

/// CRC-16/Modbus
/// Polynomial: 0x8005, Init: 0xFFFF, RefIn: true, RefOut: true, XorOut: 0x0000
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Append the CRC of everything already in `frame`, low byte first
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16_modbus(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Read the trailing CRC of a frame (low byte first).
///
/// Returns 0 when the frame is too short to carry one.
pub fn trailing_crc(frame: &[u8]) -> u16 {
    if frame.len() > CRC_LEN {
        let tail = &frame[frame.len() - CRC_LEN..];
        u16::from_le_bytes([tail[0], tail[1]])
    } else {
        0
    }
}

/// CRC over every byte except the trailer; 0 when the frame is too short
pub fn body_crc(frame: &[u8]) -> u16 {
    if frame.len() > CRC_LEN {
        crc16_modbus(&frame[..frame.len() - CRC_LEN])
    } else {
        0
    }
}

/// Verify that the trailing 2 bytes match the CRC of the rest of the frame
pub fn verify_crc(frame: &[u8]) -> bool {
    frame.len() > CRC_LEN && body_crc(frame) == trailing_crc(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_modbus() {
        // Test vector: "123456789" should give 0x4B37
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_crc16_known_frames() {
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02]), 0x63B6);
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]), 0x0BC4);
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn append_then_verify() {
        let inputs: [&[u8]; 4] = [
            &[0x11],
            &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02],
            &[0xFF; 32],
            b"arbitrary payload bytes",
        ];
        for input in inputs {
            let mut frame = input.to_vec();
            append_crc(&mut frame);
            assert_eq!(frame.len(), input.len() + CRC_LEN);
            assert!(verify_crc(&frame), "frame {frame:02X?}");
            assert_eq!(crc16_modbus(input), crc16_modbus(input));
        }
    }

    #[test]
    fn corrupted_frame_fails_verification() {
        let mut frame = vec![0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        append_crc(&mut frame);
        frame[3] ^= 0x01;
        assert!(!verify_crc(&frame));
    }

    #[test]
    fn short_frames() {
        assert_eq!(trailing_crc(&[0x01, 0x02]), 0);
        assert_eq!(body_crc(&[0x01]), 0);
        assert!(!verify_crc(&[0xFF, 0xFF]));
    }
}
