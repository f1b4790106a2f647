//! Benchmark utilities.

use idbkv_codec::Key;
use rand::Rng;

/// Generate random record data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` distinct number keys in random order.
pub fn shuffled_number_keys(count: usize) -> Vec<Key> {
    use rand::seq::SliceRandom;

    let mut keys: Vec<Key> = (0..count).map(|i| Key::number(i as f64)).collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

/// Generate a random string key of `len` lowercase letters.
pub fn random_string_key(len: usize) -> Key {
    let mut rng = rand::thread_rng();
    Key::String((0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect())
}

/// Generate a compound key nested `depth` levels deep.
pub fn nested_array_key(depth: usize, width: usize) -> Key {
    if depth == 0 {
        random_string_key(8)
    } else {
        Key::Array((0..width).map(|_| nested_array_key(depth - 1, width)).collect())
    }
}

/// Generate test records with the specified payload size.
pub fn generate_records(count: usize, payload_size: usize) -> Vec<(Key, Vec<u8>)> {
    shuffled_number_keys(count)
        .into_iter()
        .map(|key| (key, random_data(payload_size)))
        .collect()
}
