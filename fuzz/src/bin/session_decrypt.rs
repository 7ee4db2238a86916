#[macro_use]
extern crate afl;
use duet::{Account, Message, Session};

fn get_session() -> Session {
    // The Victim
    let alice = Account::new(None).expect("Setup failed");

    // The Attacker context
    let mut bob = Account::new(None).expect("Setup failed");
    bob.generate_one_time_keys(1).expect("Setup failed");
    let one_time_key = *bob
        .one_time_keys()
        .keys()
        .expect("Setup failed")
        .values()
        .next()
        .expect("Setup failed");

    alice
        .create_outbound_session(bob.curve25519_key(), one_time_key)
        .expect("Setup failed")
}

fn main() {
    let mut session = get_session();

    fuzz!(|data: &[u8]| {
        if let Ok(message) = Message::from_bytes(data) {
            let _ = session.decrypt(&message);
        }
    });
}
