#[cfg(test)]
mod integration_tests {
    use duet::{
        Account, AccountConfig, Error, Message, MessageType, PreKeyMessage, Role, Session,
        X25519PublicKey,
    };
    use rand::{TryCryptoRng, TryRngCore};

    const PICKLE_KEY: &[u8] = b"It's a secret to everybody";

    /// Generates and publishes a single one-time key, returning its public part.
    fn publish_one_time_key(account: &mut Account) -> X25519PublicKey {
        account.generate_one_time_keys(1).unwrap();
        let keys = account.one_time_keys().keys().unwrap();
        account.mark_keys_as_published();
        *keys.values().next().unwrap()
    }

    /// Sends a message the way a transport would: type tag plus base64 text.
    fn transport(message: &Message) -> Message {
        Message::from_parts(message.message_type(), &message.to_base64()).unwrap()
    }

    fn pre_key(message: &Message) -> PreKeyMessage {
        let pre_key = if let Message::PreKey(message) = message {
            Some(message.clone())
        } else {
            None
        };
        pre_key.unwrap()
    }

    fn establish(alice: &Account, bob: &mut Account) -> (Session, Session) {
        let one_time_key = publish_one_time_key(bob);
        let mut alice_session = alice
            .create_outbound_session(bob.curve25519_key(), one_time_key)
            .unwrap();

        let first = alice_session.encrypt("first").unwrap();
        let mut bob_session = bob.create_inbound_session(&pre_key(&first)).unwrap();
        assert_eq!(bob_session.decrypt(&first).unwrap(), b"first");

        (alice_session, bob_session)
    }

    #[test]
    fn test_hello_and_one_time_key_reuse() {
        println!("Step 1: A generates and publishes a single one-time key...");
        let mut account_a = Account::new(None).unwrap();
        account_a.generate_one_time_keys(1).unwrap();
        let one_time_keys = account_a.one_time_keys();
        assert_eq!(one_time_keys.curve25519.len(), 1);
        let one_time_key =
            X25519PublicKey::from_base64(&one_time_keys.curve25519["AAAAAQ"]).unwrap();
        account_a.mark_keys_as_published();

        println!("Step 2: B creates an outbound session to A...");
        let account_b = Account::new(None).unwrap();
        let identity_a =
            X25519PublicKey::from_base64(&account_a.identity_keys().curve25519).unwrap();
        let mut session_b = account_b
            .create_outbound_session(identity_a, one_time_key)
            .unwrap();

        println!("Step 3: B encrypts \"hello\"...");
        let message = session_b.encrypt("hello").unwrap();
        assert_eq!(message.message_type(), MessageType::PreKey);
        let received = transport(&message);

        println!("Step 4: A establishes the session and decrypts...");
        let pre_key_message = pre_key(&received);
        let mut session_a = account_a
            .create_inbound_session_from(&account_b.curve25519_key(), &pre_key_message)
            .unwrap();
        assert_eq!(session_a.role(), Role::Responder);
        assert!(session_a.matches_inbound(&pre_key_message));
        assert_eq!(session_a.decrypt(&received).unwrap(), b"hello");
        assert_eq!(session_a.session_id(), session_b.session_id());

        println!("Step 5: A second inbound attempt with the same key fails...");
        assert_eq!(
            account_a.create_inbound_session(&pre_key_message).unwrap_err(),
            Error::UnknownOneTimeKey(one_time_key.to_base64())
        );
    }

    #[test]
    fn test_full_protocol_flow() {
        println!("Step 1: Creating accounts for Alice and Bob...");
        let alice_account = Account::new(None).unwrap();
        let mut bob_account = Account::new(None).unwrap();

        println!("Step 2: Bob publishes his key bundle...");
        bob_account.generate_one_time_keys(5).unwrap();
        let bundle = bob_account.public_key_bundle().to_json().unwrap();
        bob_account.mark_keys_as_published();
        let bundle = duet::PublicKeyBundle::from_json(&bundle).unwrap();
        let bob_one_time_key = *bundle.agreement_keys().unwrap().values().next().unwrap();

        println!("Step 3: Alice creates outbound session to Bob...");
        let mut alice_session = alice_account
            .create_outbound_session(bob_account.curve25519_key(), bob_one_time_key)
            .unwrap();

        println!("Step 4: Alice sends two messages before hearing back...");
        let alice_message_1 = alice_session.encrypt("Hey Bob, this is a secure message!").unwrap();
        let alice_message_2 = alice_session.encrypt("Are you there?").unwrap();
        assert_eq!(alice_message_1.message_type(), MessageType::PreKey);
        assert_eq!(alice_message_2.message_type(), MessageType::PreKey);
        assert!(!alice_session.has_received_message());

        println!("Step 5: Bob creates inbound session and decrypts both...");
        let mut bob_session = bob_account
            .create_inbound_session(&pre_key(&alice_message_1))
            .unwrap();
        assert!(bob_session.matches_inbound(&pre_key(&alice_message_2)));
        assert_eq!(
            bob_session.decrypt(&transport(&alice_message_1)).unwrap(),
            b"Hey Bob, this is a secure message!"
        );
        assert_eq!(
            bob_session.decrypt(&transport(&alice_message_2)).unwrap(),
            b"Are you there?"
        );

        println!("Step 6: Bob replies to Alice...");
        let bob_reply = bob_session.encrypt("Hi Alice! I received your secure message.").unwrap();
        assert_eq!(bob_reply.message_type(), MessageType::Normal);
        assert_eq!(
            alice_session.decrypt(&transport(&bob_reply)).unwrap(),
            b"Hi Alice! I received your secure message."
        );
        assert!(alice_session.has_received_message());

        println!("Step 7: Alice switches to normal messages...");
        let alice_message_3 = alice_session.encrypt("How's the weather there?").unwrap();
        assert_eq!(alice_message_3.message_type(), MessageType::Normal);
        assert_eq!(
            bob_session.decrypt(&transport(&alice_message_3)).unwrap(),
            b"How's the weather there?"
        );

        println!("Step 8: Testing session pickling and restoration...");
        let mut alice_restored =
            Session::from_pickle(PICKLE_KEY, &alice_session.pickle(PICKLE_KEY).unwrap()).unwrap();
        let mut bob_restored =
            Session::from_pickle(PICKLE_KEY, &bob_session.pickle(PICKLE_KEY).unwrap()).unwrap();
        assert_eq!(alice_restored.session_id(), alice_session.session_id());
        assert!(alice_restored.has_received_message());

        println!("Step 9: Testing continued communication after restoration...");
        let continued = alice_restored.encrypt("After restore").unwrap();
        assert_eq!(bob_restored.decrypt(&continued).unwrap(), b"After restore");

        assert_eq!(
            bob_restored.decrypt(&continued).unwrap_err(),
            Error::Replay { counter: 1 }
        );

        println!("Step 10: Testing out-of-order message delivery...");
        let alice_messages = [
            "Message A - should be received third",
            "Message B - should be received first",
            "Message C - should be received second",
        ];
        let encrypted: Vec<_> = alice_messages
            .iter()
            .map(|message| alice_restored.encrypt(message).unwrap())
            .collect();

        for i in [1, 2, 0] {
            let decrypted = bob_restored.decrypt(&encrypted[i]).unwrap();
            assert_eq!(String::from_utf8(decrypted).unwrap(), alice_messages[i]);
        }

        println!("Step 11: Testing multiple DH ratchet rotations...");
        for i in 0..3 {
            let bob_message = format!("Rotation test from Bob {i}");
            let encrypted = bob_restored.encrypt(&bob_message).unwrap();
            assert_eq!(alice_restored.decrypt(&encrypted).unwrap(), bob_message.as_bytes());

            let alice_message = format!("Rotation test from Alice {i}");
            let encrypted = alice_restored.encrypt(&alice_message).unwrap();
            assert_eq!(bob_restored.decrypt(&encrypted).unwrap(), alice_message.as_bytes());
        }

        println!("Step 12: Testing large message...");
        let large_message = vec![b'X'; 100 * 1024]; // 100 KB
        let encrypted_large = alice_restored.encrypt(&large_message).unwrap();
        let decrypted_large = bob_restored.decrypt(&encrypted_large).unwrap();
        assert_eq!(decrypted_large, large_message);

        println!("All integration tests passed successfully!");
    }

    #[test]
    fn test_multiple_sessions() {
        println!("Setting up accounts for Alice, Bob, and Charlie...");
        let alice_account = Account::new(None).unwrap();
        let mut bob_account = Account::new(None).unwrap();
        let mut charlie_account = Account::new(None).unwrap();

        println!("Establishing sessions...");
        let (mut alice_bob, mut bob_session) = establish(&alice_account, &mut bob_account);
        let (mut alice_charlie, mut charlie_session) =
            establish(&alice_account, &mut charlie_account);
        assert_ne!(alice_bob.session_id(), alice_charlie.session_id());

        println!("Messages only decrypt on their own session...");
        let to_bob = alice_bob.encrypt("Hey Bob, it's Alice!").unwrap();
        let to_charlie = alice_charlie.encrypt("Hey Charlie, it's Alice!").unwrap();

        assert!(charlie_session.decrypt(&to_bob).is_err());
        assert!(bob_session.decrypt(&to_charlie).is_err());
        assert_eq!(bob_session.decrypt(&to_bob).unwrap(), b"Hey Bob, it's Alice!");
        assert_eq!(
            charlie_session.decrypt(&to_charlie).unwrap(),
            b"Hey Charlie, it's Alice!"
        );

        println!("Bob and Charlie respond to Alice...");
        let bob_reply = bob_session.encrypt("Hi Alice, it's Bob!").unwrap();
        let charlie_reply = charlie_session.encrypt("Hey Alice, Charlie here!").unwrap();

        assert!(alice_bob.decrypt(&charlie_reply).is_err());
        assert_eq!(alice_bob.decrypt(&bob_reply).unwrap(), b"Hi Alice, it's Bob!");
        assert_eq!(
            alice_charlie.decrypt(&charlie_reply).unwrap(),
            b"Hey Alice, Charlie here!"
        );

        println!("Multiple session test passed successfully!");
    }

    #[test]
    fn test_replay_is_rejected() {
        let alice_account = Account::new(None).unwrap();
        let mut bob_account = Account::new(None).unwrap();
        let (mut alice_session, mut bob_session) = establish(&alice_account, &mut bob_account);

        let reply = bob_session.encrypt("only once").unwrap();
        assert_eq!(alice_session.decrypt(&reply).unwrap(), b"only once");
        assert_eq!(
            alice_session.decrypt(&reply).unwrap_err(),
            Error::Replay { counter: 0 }
        );
    }

    #[test]
    fn test_tampered_messages_leave_session_unchanged() {
        let alice_account = Account::new(None).unwrap();
        let mut bob_account = Account::new(None).unwrap();
        let (mut alice_session, mut bob_session) = establish(&alice_account, &mut bob_account);

        let reply = bob_session.encrypt("untouched").unwrap();
        let bytes = reply.to_bytes();

        // Every bit of the ratchet key, the counter's low byte and the payload.
        // On a first message any change of the low byte is a later counter
        // within the gap, so the MAC decides.
        let positions = (2..34).chain((duet::NormalMessage::HEADER_LENGTH - 1)..bytes.len());
        for position in positions {
            for bit in 0..8 {
                let mut tampered = bytes.clone();
                tampered[position] ^= 1 << bit;
                let tampered = Message::from_bytes(&tampered).unwrap();

                assert_eq!(alice_session.decrypt(&tampered).unwrap_err(), Error::MacFailure);
            }
        }

        // Structural damage is reported as a malformed message.
        let mut wrong_version = bytes.clone();
        wrong_version[0] ^= 0x80;
        assert!(matches!(
            Message::from_bytes(&wrong_version),
            Err(Error::BadMessage(_))
        ));

        assert!(!alice_session.has_received_message());
        assert_eq!(alice_session.decrypt(&reply).unwrap(), b"untouched");
    }

    #[test]
    fn test_tampered_counter_outcomes() {
        let alice_account = Account::new(None).unwrap();
        let mut bob_account = Account::new(None).unwrap();
        let (mut alice_session, mut bob_session) = establish(&alice_account, &mut bob_account);

        let replies: Vec<_> = (0..3)
            .map(|i| bob_session.encrypt(format!("reply {i}")).unwrap())
            .collect();
        assert_eq!(alice_session.decrypt(&replies[0]).unwrap(), b"reply 0");
        assert_eq!(alice_session.decrypt(&replies[1]).unwrap(), b"reply 1");

        // The counter is checked before the MAC, so counter damage can surface
        // as a replay or an oversized gap instead of a MAC failure.
        let bytes = replies[2].to_bytes();
        let tamper = |position: usize, mask: u8| {
            let mut tampered = bytes.clone();
            tampered[position] ^= mask;
            Message::from_bytes(&tampered).unwrap()
        };

        // Counter 2 becomes 0, which was already consumed.
        assert_eq!(
            alice_session.decrypt(&tamper(37, 0x02)).unwrap_err(),
            Error::Replay { counter: 0 }
        );
        // Counter 2 becomes 3, a later message within the gap.
        assert_eq!(
            alice_session.decrypt(&tamper(37, 0x01)).unwrap_err(),
            Error::MacFailure
        );
        // Higher counter bytes jump past the gap limit.
        assert!(matches!(
            alice_session.decrypt(&tamper(35, 0x01)),
            Err(Error::BadMessage(_))
        ));
        assert!(matches!(
            alice_session.decrypt(&tamper(34, 0x80)),
            Err(Error::BadMessage(_))
        ));

        assert_eq!(alice_session.decrypt(&replies[2]).unwrap(), b"reply 2");
    }

    #[test]
    fn test_pre_key_message_for_other_session_is_rejected() {
        let alice_account = Account::new(None).unwrap();
        let mut bob_account = Account::new(None).unwrap();
        let (_, mut bob_session) = establish(&alice_account, &mut bob_account);

        let other_key = publish_one_time_key(&mut bob_account);
        let mut other = alice_account
            .create_outbound_session(bob_account.curve25519_key(), other_key)
            .unwrap();
        let message = other.encrypt("wrong session").unwrap();

        assert!(!bob_session.matches_inbound(&pre_key(&message)));
        assert!(matches!(bob_session.decrypt(&message), Err(Error::BadMessage(_))));
    }

    #[test]
    fn test_account_pickle_round_trip() {
        let mut bob_account = Account::new(Some(AccountConfig {
            max_skipped_message_keys: 10,
            ..Default::default()
        }))
        .unwrap();
        bob_account.generate_one_time_keys(3).unwrap();
        let published = publish_one_time_key(&mut bob_account);

        let pickle = bob_account.pickle(PICKLE_KEY).unwrap();
        assert!(matches!(
            Account::from_pickle(b"wrong key", &pickle),
            Err(Error::InvalidPickle(_))
        ));

        let mut restored = Account::from_pickle(PICKLE_KEY, &pickle).unwrap();
        assert_eq!(restored.identity_keys(), bob_account.identity_keys());
        assert_eq!(restored.config(), bob_account.config());
        assert!(restored.one_time_keys().is_empty());

        // Published keys survive the round trip and can still be consumed.
        let alice_account = Account::new(None).unwrap();
        let mut alice_session = alice_account
            .create_outbound_session(restored.curve25519_key(), published)
            .unwrap();
        let message = alice_session.encrypt("to the restored account").unwrap();
        let mut bob_session = restored.create_inbound_session(&pre_key(&message)).unwrap();
        assert_eq!(bob_session.decrypt(&message).unwrap(), b"to the restored account");
    }

    struct FailingRng;

    impl TryRngCore for FailingRng {
        type Error = std::io::Error;

        fn try_next_u32(&mut self) -> Result<u32, Self::Error> {
            Err(std::io::Error::other("no entropy"))
        }

        fn try_next_u64(&mut self) -> Result<u64, Self::Error> {
            Err(std::io::Error::other("no entropy"))
        }

        fn try_fill_bytes(&mut self, _dst: &mut [u8]) -> Result<(), Self::Error> {
            Err(std::io::Error::other("no entropy"))
        }
    }

    impl TryCryptoRng for FailingRng {}

    #[test]
    fn test_entropy_failure_is_fatal() {
        let err = Account::with_rng(None, &mut FailingRng).err().unwrap();

        assert_eq!(err, Error::EntropyUnavailable);
        assert!(err.is_fatal());
    }
}
