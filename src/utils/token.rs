use rand::{Rng, RngCore, distr::Alphanumeric};

use crate::consts::SHARE_URL_LEN;

/// 128 random bits, hex encoded.
pub fn invitation_code() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn share_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_URL_LEN)
        .map(char::from)
        .collect()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
