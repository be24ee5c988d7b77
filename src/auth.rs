// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! VNC Authentication (RFB security type 2).
//!
//! The server sends a random 16-byte challenge; the client DES-encrypts it with a
//! key derived from the password and sends the 16-byte result back. The key is the
//! password's first 8 bytes, zero padded, with the bit order of every byte reversed.

use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;
use rand::RngCore;
use std::fmt;

/// Length of the challenge and of the expected response.
pub const CHALLENGE_LEN: usize = 16;

/// Server-side VNC authentication state.
#[derive(Clone)]
pub struct VncAuth {
    password: String,
}

impl fmt::Debug for VncAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VncAuth").field("password", &"<redacted>").finish()
    }
}

impl VncAuth {
    /// Creates an authenticator for `password`.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    /// Generates a fresh random challenge.
    #[must_use]
    pub fn generate_challenge(&self) -> [u8; CHALLENGE_LEN] {
        let mut challenge = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut challenge);
        challenge
    }

    /// Checks a client's response against the challenge that was sent.
    #[must_use]
    pub fn verify_response(&self, challenge: &[u8; CHALLENGE_LEN], response: &[u8; CHALLENGE_LEN]) -> bool {
        let expected = encrypt_challenge(challenge, &self.password);
        // Compare every byte regardless of where the first mismatch is.
        expected
            .iter()
            .zip(response.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Encrypts a challenge the way a VNC client does.
#[must_use]
pub fn encrypt_challenge(challenge: &[u8; CHALLENGE_LEN], password: &str) -> [u8; CHALLENGE_LEN] {
    let mut key = [0u8; 8];
    for (slot, &b) in key.iter_mut().zip(password.as_bytes()) {
        *slot = b.reverse_bits();
    }

    let cipher = Des::new(&GenericArray::from(key));
    let mut response = *challenge;
    for block in response.chunks_exact_mut(8) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    response
}
