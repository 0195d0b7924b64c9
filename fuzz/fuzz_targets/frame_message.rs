#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{decode_ack, decode_message, encode_message, peek_kind, Limits, MessageKind};

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    match peek_kind(data) {
        Ok(MessageKind::Frames) => {
            if let Ok(message) = decode_message(data, &limits) {
                // Anything that decodes must encode and decode to the same value.
                let bytes = encode_message(&message).expect("re-encode");
                let again = decode_message(&bytes, &Limits::unlimited()).expect("re-decode");
                assert_eq!(again.id, message.id);
                assert_eq!(again.frames.len(), message.frames.len());
                assert_eq!(again.state_count(), message.state_count());
            }
        }
        Ok(MessageKind::Ack) => {
            let _ = decode_ack(data, 0);
        }
        Err(_) => {}
    }
    let _ = tools::decode_message_json(data, &limits);
});
