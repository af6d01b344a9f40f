//! ASCII links and the ADAM-4055 driver over a scripted line

mod common;

use common::{burst, Line};
use rtupoll_core::core::adam::{Adam4055, AdamError, IoStatus};
use rtupoll_core::core::ascii::{AsciiLink, AsciiOutcome};
use parking_lot::Mutex;
use rtupoll_core::core::transport::{SerialSettings, TransportError};
use std::sync::Arc;
use std::time::Duration;

const PORT: &str = "COM2";

/// A module at address 01 with the given output and input bytes
fn adam_line(outputs: u8, inputs: u8) -> (Line, Arc<Mutex<u8>>) {
    let state = Arc::new(Mutex::new(outputs));
    let shared = Arc::clone(&state);
    let line = Line::new(PORT, move |request| {
        let text = String::from_utf8_lossy(request);
        let reply = if text == "$016\r" {
            format!("!{:02X}{:02X}00\r", *shared.lock(), inputs)
        } else if let Some(value) = text.strip_prefix("#0100").and_then(|v| v.strip_suffix('\r')) {
            *shared.lock() = u8::from_str_radix(value, 16).unwrap();
            ">\r".to_string()
        } else {
            return Vec::new();
        };
        vec![burst(1, reply.as_bytes())]
    });
    (line, state)
}

fn adam(line: &Line, read_timeout_ms: u64) -> Adam4055 {
    Adam4055::with_connector(
        SerialSettings::new(PORT, 9600),
        1,
        Duration::from_millis(read_timeout_ms),
        line.connector(),
    )
}

#[test]
fn status_opens_the_port_and_caches_values() {
    let (line, _) = adam_line(0x0F, 0x30);
    let module = adam(&line, 500);

    let status = module.status().unwrap();
    assert_eq!(
        status,
        IoStatus {
            inputs: 0x30,
            outputs: 0x0F
        }
    );
    assert!(module.bus().is_open());
    assert!(module.input(4));
    assert!(module.input(5));
    assert!(!module.input(0));
    assert!(module.output(3));
    assert!(!module.output(4));
    assert!(module.last_read().is_some());
    assert!(module.last_write().is_none());
}

#[test]
fn set_output_reads_then_writes_the_mask() {
    let (line, outputs) = adam_line(0x0F, 0x00);
    let module = adam(&line, 500);

    module.set_output(4, true).unwrap();
    module.set_output(0, false).unwrap();

    assert_eq!(*outputs.lock(), 0x1E);
    assert_eq!(module.outputs(), 0x1E);
    assert_eq!(
        line.writes(),
        vec![
            b"$016\r".to_vec(),
            b"#01001F\r".to_vec(),
            b"$016\r".to_vec(),
            b"#01001E\r".to_vec(),
        ]
    );
    assert!(module.last_write().is_some());
}

#[test]
fn set_outputs_writes_all_eight() {
    let (line, outputs) = adam_line(0x00, 0x00);
    let module = adam(&line, 500);

    module.set_outputs(0xA5).unwrap();
    assert_eq!(*outputs.lock(), 0xA5);
    assert!(module.output(0));
    assert!(!module.output(1));
    assert!(!module.output(8));
}

#[test]
fn silent_module_times_out() {
    let line = Line::silent(PORT);
    let module = adam(&line, 50);
    assert!(matches!(module.status(), Err(AdamError::Timeout(1))));
}

#[test]
fn unopenable_port_is_reported() {
    let line = Line::silent(PORT);
    line.fail_open();
    let module = adam(&line, 50);
    assert!(matches!(
        module.status(),
        Err(AdamError::Transport(TransportError::PortNotFound(_)))
    ));
    assert!(line.writes().is_empty());
}

#[test]
fn ascii_link_round_trip() {
    let line = Line::new(PORT, |request| {
        assert_eq!(request, b"VER?\r\n");
        vec![burst(0, b"FW 1."), burst(4, b"2\r\n")]
    });
    let link = AsciiLink::with_connector(
        SerialSettings::new(PORT, 9600),
        Duration::from_millis(500),
        "\r\n",
        line.connector(),
    );

    assert!(matches!(link.send_and_receive("VER?"), AsciiOutcome::PortNotOpen));
    assert!(line.writes().is_empty());

    link.bus().open(false).unwrap();
    let outcome = link.send_and_receive("VER?");
    assert_eq!(outcome.reply(), Some("FW 1.2"));
}
