#![no_main]

use key_overlay::event::{Frame, Normalized, Normalizer, WireFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for format in [WireFormat::Transition, WireFormat::Snapshot, WireFormat::Auto] {
        let mut normalizer = Normalizer::new(format);
        let before = normalizer.last_snapshot().to_vec();
        let frame = match std::str::from_utf8(data) {
            Ok(text) => Frame::Text(text),
            Err(_) => Frame::Binary(data),
        };
        match normalizer.normalize(frame) {
            Ok(Normalized::Events(events)) => {
                if format == WireFormat::Transition {
                    assert_eq!(events.len(), 1);
                }
            }
            Ok(Normalized::Reset) => {}
            // A rejected frame never touches the remembered snapshot.
            Err(_) => assert_eq!(normalizer.last_snapshot(), before.as_slice()),
        }
    }
});
