//! Short room codes: six characters from `A-Z0-9`

use rand::Rng;

pub const ROOM_ID_LENGTH: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LENGTH)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

pub fn is_valid_room_id(room_id: &str) -> bool {
    room_id.len() == ROOM_ID_LENGTH
        && room_id
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
