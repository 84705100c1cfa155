// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Opaque 128-bit reservation tokens.

use std::fmt;

use blake3::Hasher;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::ids::{DrawingId, SlotNumber};

pub const TOKEN_LEN: usize = 16;

/// Token handed to the caller that placed a reservation; echoed back at confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationToken(String);

impl ReservationToken {
    /// Wraps a token received from a client. No format validation; unknown tokens simply never match.
    pub fn from_client(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct TokenBuilder {
    hasher: Hasher,
}

impl TokenBuilder {
    fn new(domain: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(&(domain.len() as u32).to_le_bytes());
        hasher.update(domain);
        Self { hasher }
    }

    fn write_str(&mut self, value: &str) -> &mut Self {
        self.hasher.update(&(value.len() as u32).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    fn write_u32(&mut self, value: u32) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.hasher.update(value);
        self
    }

    /// First `TOKEN_LEN` bytes of the digest, hex encoded.
    fn finish(self) -> String {
        let hex = self.hasher.finalize().to_hex();
        hex.as_str()[..TOKEN_LEN * 2].to_string()
    }
}

/// Mint a fresh token bound to one slot. The random nonce makes tokens unguessable even when the
/// drawing and number are public.
pub fn reservation_token(drawing_id: &DrawingId, number: SlotNumber) -> ReservationToken {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    let mut builder = TokenBuilder::new(b"slot_reservation.v1");
    builder
        .write_str(drawing_id.as_str())
        .write_u32(number)
        .write_bytes(&nonce);
    ReservationToken(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let drawing = DrawingId::from("d1");
        let a = reservation_token(&drawing, 42);
        let b = reservation_token(&drawing, 42);
        assert_eq!(a.as_str().len(), TOKEN_LEN * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_is_prefix_of_blake3_digest() {
        let mut builder = TokenBuilder::new(b"test");
        builder.write_str("d1").write_u32(7);
        let token = builder.finish();

        let mut hasher = Hasher::new();
        hasher.update(&4u32.to_le_bytes());
        hasher.update(b"test");
        hasher.update(&2u32.to_le_bytes());
        hasher.update(b"d1");
        hasher.update(&7u32.to_le_bytes());
        let full = hasher.finalize().to_hex();
        assert_eq!(token, &full.as_str()[..TOKEN_LEN * 2]);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
