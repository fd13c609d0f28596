//! Byte layout of everything the object store writes into an [`crate::IAtomicStorage`].
//!
//! Key encodings are order-preserving (byte order equals [`KeyValue`] order) and prefix-free (no
//! encoded key is a prefix of a different encoded key), so prefix scans over an encoded key only
//! ever return entries for exactly that key.
//!
//! | Storage key | Value |
//! |---|---|
//! | `m` `version` | stored version, `u32` big endian |
//! | `m` `schema` | JSON encoded [`crate::Schema`] |
//! | `d` collection primary-key | JSON encoded record |
//! | `i` collection index index-key primary-key | encoded primary key |

use crate::{Key, KeyValue};

const TAG_ARRAY_END: u8 = 0x00;
const TAG_NUMBER: u8 = 0x10;
const TAG_STRING: u8 = 0x20;
const TAG_ARRAY: u8 = 0x30;

const META_PREFIX: u8 = b'm';
const DATA_PREFIX: u8 = b'd';
const INDEX_PREFIX: u8 = b'i';

pub fn encode_key(key: &KeyValue) -> Key {
    let mut out = Vec::new();
    encode_key_into(key, &mut out);
    out
}

pub fn encode_key_into(key: &KeyValue, out: &mut Vec<u8>) {
    match key {
        KeyValue::Number(number) => {
            out.push(TAG_NUMBER);
            out.extend_from_slice(&encode_number(*number));
        }
        KeyValue::String(string) => {
            out.push(TAG_STRING);
            encode_str_into(string, out);
        }
        KeyValue::Array(elements) => {
            out.push(TAG_ARRAY);
            for element in elements {
                encode_key_into(element, out);
            }
            out.push(TAG_ARRAY_END);
        }
    }
}

fn encode_number(number: f64) -> [u8; 8] {
    // Both zeros compare equal as keys
    let number = if number == 0.0 { 0.0 } else { number };
    let bits = number.to_bits();
    let ordered = if bits >> 63 == 1 {
        !bits
    } else {
        bits ^ (1 << 63)
    };
    ordered.to_be_bytes()
}

/// `0x00` is escaped as `0x00 0xff`, the string ends with `0x00 0x00`.
fn encode_str_into(string: &str, out: &mut Vec<u8>) {
    for byte in string.bytes() {
        out.push(byte);
        if byte == 0x00 {
            out.push(0xff);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

pub fn version_key() -> Key {
    meta_key("version")
}

pub fn schema_key() -> Key {
    meta_key("schema")
}

fn meta_key(name: &str) -> Key {
    let mut key = vec![META_PREFIX];
    key.extend_from_slice(name.as_bytes());
    key
}

/// Prefix of all records in `collection`
pub fn data_prefix(collection: &str) -> Key {
    let mut key = vec![DATA_PREFIX];
    encode_str_into(collection, &mut key);
    key
}

/// `encoded_primary_key` has to come from [`encode_key`]
pub fn data_key(collection: &str, encoded_primary_key: &[u8]) -> Key {
    let mut key = data_prefix(collection);
    key.extend_from_slice(encoded_primary_key);
    key
}

/// Prefix of all index entries of `collection`, across all its indexes
pub fn collection_index_prefix(collection: &str) -> Key {
    let mut key = vec![INDEX_PREFIX];
    encode_str_into(collection, &mut key);
    key
}

pub fn index_prefix(collection: &str, index: &str) -> Key {
    let mut key = collection_index_prefix(collection);
    encode_str_into(index, &mut key);
    key
}

/// Prefix of all entries of `index` with exactly `index_key`
pub fn index_key_prefix(collection: &str, index: &str, index_key: &KeyValue) -> Key {
    let mut key = index_prefix(collection, index);
    encode_key_into(index_key, &mut key);
    key
}

pub fn index_entry_key(
    collection: &str,
    index: &str,
    index_key: &KeyValue,
    encoded_primary_key: &[u8],
) -> Key {
    let mut key = index_key_prefix(collection, index, index_key);
    key.extend_from_slice(encoded_primary_key);
    key
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;
    use rand::Rng;

    use super::{data_prefix, encode_key, index_key_prefix};
    use crate::KeyValue;

    fn random_key(rng: &mut impl Rng, depth: usize) -> KeyValue {
        let kinds = if depth == 0 { 2 } else { 3 };
        match rng.gen_range(0..kinds) {
            0 => KeyValue::Number(match rng.gen_range(0..4) {
                0 => 0.0,
                1 => -rng.gen::<f64>() * 1e6,
                2 => rng.gen_range(-5..5) as f64,
                _ => rng.gen::<f64>() * 1e6,
            }),
            1 => {
                let alphabet = ["", "\0", "a", "b", "\u{ff}", "é", "Red", "Re"];
                let len = rng.gen_range(0..3);
                KeyValue::String(
                    (0..len)
                        .map(|_| *alphabet.choose(rng).expect("non-empty"))
                        .collect(),
                )
            }
            _ => {
                let len = rng.gen_range(0..3);
                KeyValue::Array((0..len).map(|_| random_key(rng, depth - 1)).collect())
            }
        }
    }

    #[test]
    fn test_encoding_preserves_order() {
        let mut rng = rand::thread_rng();
        for _ in 0..2000 {
            let a = random_key(&mut rng, 2);
            let b = random_key(&mut rng, 2);
            assert_eq!(
                a.cmp(&b),
                encode_key(&a).cmp(&encode_key(&b)),
                "order mismatch between {a} and {b}"
            );
        }
    }

    #[test]
    fn test_encoding_is_prefix_free() {
        let mut rng = rand::thread_rng();
        for _ in 0..2000 {
            let a = random_key(&mut rng, 2);
            let b = random_key(&mut rng, 2);
            if a != b {
                assert!(
                    !encode_key(&b).starts_with(&encode_key(&a)),
                    "{a} is a prefix of {b}"
                );
            }
        }
    }

    #[test]
    fn test_layout_separates_names() {
        // "car" must not scan into "cars"
        assert!(!data_prefix("cars").starts_with(&data_prefix("car")));

        let red = index_key_prefix("cars", "cars_colour", &KeyValue::from(["Red"]));
        let re = index_key_prefix("cars", "cars_colour", &KeyValue::from(["Re"]));
        assert!(!red.starts_with(&re));
    }
}
