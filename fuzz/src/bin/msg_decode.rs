#[macro_use]
extern crate afl;
use duet::{Message, MessageType};

fn main() {
    fuzz!(|data: &[u8]| {
        if let Ok(message) = Message::from_bytes(data) {
            assert_eq!(message.to_bytes(), data);
        }

        if let Ok(text) = std::str::from_utf8(data) {
            let _ = Message::from_parts(MessageType::PreKey, text);
            let _ = Message::from_parts(MessageType::Normal, text);
        }
    });
}
