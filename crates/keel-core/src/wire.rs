//! Wire codec for the handshake message set.
//!
//! Everything is little-endian. Nonces travel as raw fixed-width byte
//! runs; variable-length data uses the compact byte-string encoding: one
//! length byte below 254, otherwise `0xFE` plus a 3-byte little-endian
//! length, with the data zero-padded to a 4-byte boundary either way.
//! Each message starts with its 32-bit constructor id.

use thiserror::Error;

/// Constructor ids of the handshake message set.
pub mod ids {
    /// `req_pq`
    pub const REQ_PQ: u32 = 0x6046_9778;
    /// `res_pq`
    pub const RES_PQ: u32 = 0x0516_2463;
    /// `req_dh_params`
    pub const REQ_DH_PARAMS: u32 = 0xd712_e4be;
    /// `p_q_inner_data`
    pub const P_Q_INNER_DATA: u32 = 0x83c9_5aec;
    /// `server_dh_params_ok`
    pub const SERVER_DH_PARAMS_OK: u32 = 0xd0e8_075c;
    /// `server_dh_params_fail`
    pub const SERVER_DH_PARAMS_FAIL: u32 = 0x79cb_045d;
    /// `server_dh_inner_data`
    pub const SERVER_DH_INNER_DATA: u32 = 0xb589_0dba;
    /// `client_dh_inner_data`
    pub const CLIENT_DH_INNER_DATA: u32 = 0x6643_b654;
    /// `set_client_dh_params`
    pub const SET_CLIENT_DH_PARAMS: u32 = 0xf504_5f1f;
    /// `dh_gen_ok`
    pub const DH_GEN_OK: u32 = 0x3bcb_f734;
    /// `dh_gen_retry`
    pub const DH_GEN_RETRY: u32 = 0x46dc_1fb9;
    /// `dh_gen_fail`
    pub const DH_GEN_FAIL: u32 = 0xa69d_ae02;
    /// `msgs_ack`
    pub const MSGS_ACK: u32 = 0x62d6_b459;
    /// bare vector
    pub const VECTOR: u32 = 0x1cb5_c415;
}

/// Wire decoding errors. Any of these mid-handshake is a protocol
/// verification fault: the handshake restarts, the process never dies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Ran out of bytes mid-value
    #[error("truncated message")]
    Truncated,

    /// Constructor id does not match the expected message
    #[error("unexpected constructor {actual:#010x}, expected {expected:#010x}")]
    UnexpectedConstructor {
        /// Constructor the caller was decoding
        expected: u32,
        /// Constructor actually present
        actual: u32,
    },

    /// Structurally invalid field
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

/// Little-endian wire writer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an `i64`.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append raw bytes with no length prefix (nonces, digests).
    pub fn write_raw(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append a compact byte string, zero-padded to a 4-byte boundary.
    pub fn write_bytes(&mut self, data: &[u8]) {
        if data.len() < 254 {
            self.buf.push(data.len() as u8);
        } else {
            self.buf.push(0xFE);
            self.buf
                .extend_from_slice(&(data.len() as u32).to_le_bytes()[..3]);
        }
        self.buf.extend_from_slice(data);
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish and take the serialized bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Little-endian wire reader over a borrowed byte slice.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read raw bytes with no length prefix.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] if fewer than `n` bytes remain.
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a fixed-width byte run (nonces, hashes).
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] if fewer than `N` bytes remain.
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let raw = self.read_raw(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(raw);
        Ok(out)
    }

    /// Read a `u32`.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.read_fixed::<4>()?))
    }

    /// Read an `i32`.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_le_bytes(self.read_fixed::<4>()?))
    }

    /// Read an `i64`.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_le_bytes(self.read_fixed::<8>()?))
    }

    /// Read a compact byte string, consuming its alignment padding.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] if the declared length overruns the input.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let first = *self.data.get(self.pos).ok_or(WireError::Truncated)?;
        let (len, header) = if first < 254 {
            (first as usize, 1)
        } else {
            let raw = self
                .data
                .get(self.pos + 1..self.pos + 4)
                .ok_or(WireError::Truncated)?;
            (
                u32::from_le_bytes([raw[0], raw[1], raw[2], 0]) as usize,
                4,
            )
        };
        let padded = (header + len).div_ceil(4) * 4;
        if self.remaining() < padded {
            return Err(WireError::Truncated);
        }
        let out = &self.data[self.pos + header..self.pos + header + len];
        self.pos += padded;
        Ok(out)
    }

    /// Read and check a constructor id.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedConstructor`] on mismatch.
    pub fn expect_constructor(&mut self, expected: u32) -> Result<(), WireError> {
        let actual = self.read_u32()?;
        if actual == expected {
            Ok(())
        } else {
            Err(WireError::UnexpectedConstructor { expected, actual })
        }
    }

    /// Read a bare vector of `i64` (the fingerprint and msg-id lists).
    ///
    /// # Errors
    ///
    /// Propagates constructor and truncation errors.
    pub fn read_i64_vector(&mut self) -> Result<Vec<i64>, WireError> {
        self.expect_constructor(ids::VECTOR)?;
        let count = self.read_u32()? as usize;
        if count > self.remaining() / 8 {
            return Err(WireError::Truncated);
        }
        (0..count).map(|_| self.read_i64()).collect()
    }
}

/// Constructor id of a message, if it has one.
#[must_use]
pub fn peek_constructor(payload: &[u8]) -> Option<u32> {
    payload
        .get(..4)
        .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// `req_pq`: opens the handshake with a fresh client nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqPq {
    /// 16-byte client nonce binding the whole attempt
    pub nonce: [u8; 16],
}

impl ReqPq {
    /// Serialize.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::REQ_PQ);
        w.write_raw(&self.nonce);
        w.into_bytes()
    }

    /// Deserialize (exercised by test servers; the client only encodes).
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::REQ_PQ)?;
        Ok(Self {
            nonce: r.read_fixed()?,
        })
    }
}

/// `res_pq`: the server's nonce, factorization challenge and key offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResPq {
    /// Echo of the client nonce
    pub nonce: [u8; 16],
    /// 16-byte server nonce
    pub server_nonce: [u8; 16],
    /// Big-endian composite the client must factor
    pub pq: Vec<u8>,
    /// Fingerprints of the server keys usable for the next step
    pub fingerprints: Vec<i64>,
}

impl ResPq {
    /// Serialize (test servers).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::RES_PQ);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_bytes(&self.pq);
        w.write_u32(ids::VECTOR);
        w.write_u32(self.fingerprints.len() as u32);
        for fp in &self.fingerprints {
            w.write_i64(*fp);
        }
        w.into_bytes()
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::RES_PQ)?;
        Ok(Self {
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            pq: r.read_bytes()?.to_vec(),
            fingerprints: r.read_i64_vector()?,
        })
    }
}

/// `p_q_inner_data`: the RSA-wrapped proof that the client factored `pq`,
/// carrying the secret 32-byte new nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PqInnerData {
    /// The composite, echoed
    pub pq: Vec<u8>,
    /// Smaller prime factor, big-endian
    pub p: Vec<u8>,
    /// Larger prime factor, big-endian
    pub q: Vec<u8>,
    /// Client nonce
    pub nonce: [u8; 16],
    /// Server nonce
    pub server_nonce: [u8; 16],
    /// Fresh secret nonce, never sent in the clear
    pub new_nonce: [u8; 32],
}

impl PqInnerData {
    /// Serialize.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::P_Q_INNER_DATA);
        w.write_bytes(&self.pq);
        w.write_bytes(&self.p);
        w.write_bytes(&self.q);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_raw(&self.new_nonce);
        w.into_bytes()
    }

    /// Deserialize (exercised by test servers; the client only encodes).
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::P_Q_INNER_DATA)?;
        Ok(Self {
            pq: r.read_bytes()?.to_vec(),
            p: r.read_bytes()?.to_vec(),
            q: r.read_bytes()?.to_vec(),
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            new_nonce: r.read_fixed()?,
        })
    }
}

/// `req_dh_params`: carries the RSA-encrypted [`PqInnerData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqDhParams {
    /// Client nonce
    pub nonce: [u8; 16],
    /// Server nonce
    pub server_nonce: [u8; 16],
    /// Smaller factor, echoed
    pub p: Vec<u8>,
    /// Larger factor, echoed
    pub q: Vec<u8>,
    /// Fingerprint of the server key used for `encrypted_data`
    pub fingerprint: i64,
    /// 256-byte raw RSA ciphertext
    pub encrypted_data: Vec<u8>,
}

impl ReqDhParams {
    /// Serialize.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::REQ_DH_PARAMS);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_bytes(&self.p);
        w.write_bytes(&self.q);
        w.write_i64(self.fingerprint);
        w.write_bytes(&self.encrypted_data);
        w.into_bytes()
    }

    /// Deserialize (test servers).
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::REQ_DH_PARAMS)?;
        Ok(Self {
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            p: r.read_bytes()?.to_vec(),
            q: r.read_bytes()?.to_vec(),
            fingerprint: r.read_i64()?,
            encrypted_data: r.read_bytes()?.to_vec(),
        })
    }
}

/// `server_dh_params_{ok,fail}`: the server's answer to the RSA step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerDhParams {
    /// DH group accepted; the group parameters follow, AES-IGE encrypted
    /// under the temporary key derived from the nonces.
    Ok {
        /// Client nonce
        nonce: [u8; 16],
        /// Server nonce
        server_nonce: [u8; 16],
        /// Encrypted, hash-prefixed [`ServerDhInnerData`]
        encrypted_answer: Vec<u8>,
    },
    /// Server rejected the step; proves it saw the new nonce.
    Fail {
        /// Client nonce
        nonce: [u8; 16],
        /// Server nonce
        server_nonce: [u8; 16],
        /// Last 16 bytes of `SHA1(new_nonce)`
        new_nonce_hash: [u8; 16],
    },
}

impl ServerDhParams {
    /// Serialize (test servers).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        match self {
            Self::Ok {
                nonce,
                server_nonce,
                encrypted_answer,
            } => {
                w.write_u32(ids::SERVER_DH_PARAMS_OK);
                w.write_raw(nonce);
                w.write_raw(server_nonce);
                w.write_bytes(encrypted_answer);
            }
            Self::Fail {
                nonce,
                server_nonce,
                new_nonce_hash,
            } => {
                w.write_u32(ids::SERVER_DH_PARAMS_FAIL);
                w.write_raw(nonce);
                w.write_raw(server_nonce);
                w.write_raw(new_nonce_hash);
            }
        }
        w.into_bytes()
    }

    /// Deserialize either variant.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedConstructor`] (reported against the ok id)
    /// if the payload is neither variant, or any other [`WireError`] on
    /// malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        match r.read_u32()? {
            ids::SERVER_DH_PARAMS_OK => Ok(Self::Ok {
                nonce: r.read_fixed()?,
                server_nonce: r.read_fixed()?,
                encrypted_answer: r.read_bytes()?.to_vec(),
            }),
            ids::SERVER_DH_PARAMS_FAIL => Ok(Self::Fail {
                nonce: r.read_fixed()?,
                server_nonce: r.read_fixed()?,
                new_nonce_hash: r.read_fixed()?,
            }),
            actual => Err(WireError::UnexpectedConstructor {
                expected: ids::SERVER_DH_PARAMS_OK,
                actual,
            }),
        }
    }
}

/// `server_dh_inner_data`: the DH group, decrypted from
/// [`ServerDhParams::Ok`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDhInnerData {
    /// Client nonce
    pub nonce: [u8; 16],
    /// Server nonce
    pub server_nonce: [u8; 16],
    /// Group generator
    pub g: u32,
    /// 2048-bit group modulus, big-endian
    pub dh_prime: Vec<u8>,
    /// Server public value `g^a mod dh_prime`, big-endian
    pub g_a: Vec<u8>,
    /// Server clock at the moment of the answer, unix seconds
    pub server_time: i32,
}

impl ServerDhInnerData {
    /// Serialize (test servers).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::SERVER_DH_INNER_DATA);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_u32(self.g);
        w.write_bytes(&self.dh_prime);
        w.write_bytes(&self.g_a);
        w.write_i32(self.server_time);
        w.into_bytes()
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::SERVER_DH_INNER_DATA)?;
        Ok(Self {
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            g: r.read_u32()?,
            dh_prime: r.read_bytes()?.to_vec(),
            g_a: r.read_bytes()?.to_vec(),
            server_time: r.read_i32()?,
        })
    }
}

/// `client_dh_inner_data`: the client's public value, sent AES-IGE
/// encrypted inside [`SetClientDhParams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDhInnerData {
    /// Client nonce
    pub nonce: [u8; 16],
    /// Server nonce
    pub server_nonce: [u8; 16],
    /// Retry counter, zero on the first attempt
    pub retry_id: i64,
    /// Client public value `g^b mod dh_prime`, big-endian
    pub g_b: Vec<u8>,
}

impl ClientDhInnerData {
    /// Serialize.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::CLIENT_DH_INNER_DATA);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_i64(self.retry_id);
        w.write_bytes(&self.g_b);
        w.into_bytes()
    }

    /// Deserialize (test servers).
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::CLIENT_DH_INNER_DATA)?;
        Ok(Self {
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            retry_id: r.read_i64()?,
            g_b: r.read_bytes()?.to_vec(),
        })
    }
}

/// `set_client_dh_params`: carries the encrypted [`ClientDhInnerData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetClientDhParams {
    /// Client nonce
    pub nonce: [u8; 16],
    /// Server nonce
    pub server_nonce: [u8; 16],
    /// AES-IGE ciphertext of the hash-prefixed inner data
    pub encrypted_data: Vec<u8>,
}

impl SetClientDhParams {
    /// Serialize.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::SET_CLIENT_DH_PARAMS);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_bytes(&self.encrypted_data);
        w.into_bytes()
    }

    /// Deserialize (test servers).
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::SET_CLIENT_DH_PARAMS)?;
        Ok(Self {
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            encrypted_data: r.read_bytes()?.to_vec(),
        })
    }
}

/// Which way the server decided the DH exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhOutcome {
    /// `dh_gen_ok`: key established
    Ok,
    /// `dh_gen_retry`: redo the DH step on the same connection
    Retry,
    /// `dh_gen_fail`: restart from the top
    Fail,
}

impl DhOutcome {
    /// The selector byte this outcome hashes with.
    #[must_use]
    pub fn selector(self) -> u8 {
        match self {
            DhOutcome::Ok => 1,
            DhOutcome::Retry => 2,
            DhOutcome::Fail => 3,
        }
    }
}

/// `dh_gen_{ok,retry,fail}`: the final server verdict, authenticated by a
/// hash over the new nonce and the derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhGenOutcome {
    /// Which verdict arrived
    pub outcome: DhOutcome,
    /// Client nonce
    pub nonce: [u8; 16],
    /// Server nonce
    pub server_nonce: [u8; 16],
    /// Last 16 bytes of `SHA1(new_nonce || selector || SHA1(auth_key)[0..8])`
    pub new_nonce_hash: [u8; 16],
}

impl DhGenOutcome {
    /// Serialize (test servers).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let ctor = match self.outcome {
            DhOutcome::Ok => ids::DH_GEN_OK,
            DhOutcome::Retry => ids::DH_GEN_RETRY,
            DhOutcome::Fail => ids::DH_GEN_FAIL,
        };
        let mut w = WireWriter::new();
        w.write_u32(ctor);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_raw(&self.new_nonce_hash);
        w.into_bytes()
    }

    /// Deserialize any of the three verdicts.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedConstructor`] (reported against the ok id)
    /// if the payload is none of them, or any other [`WireError`] on
    /// malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        let outcome = match r.read_u32()? {
            ids::DH_GEN_OK => DhOutcome::Ok,
            ids::DH_GEN_RETRY => DhOutcome::Retry,
            ids::DH_GEN_FAIL => DhOutcome::Fail,
            actual => {
                return Err(WireError::UnexpectedConstructor {
                    expected: ids::DH_GEN_OK,
                    actual,
                });
            }
        };
        Ok(Self {
            outcome,
            nonce: r.read_fixed()?,
            server_nonce: r.read_fixed()?,
            new_nonce_hash: r.read_fixed()?,
        })
    }
}

/// `msgs_ack`: acknowledges message ids the state machine will not
/// otherwise answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgsAck {
    /// Acknowledged message ids
    pub msg_ids: Vec<i64>,
}

impl MsgsAck {
    /// Serialize.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_u32(ids::MSGS_ACK);
        w.write_u32(ids::VECTOR);
        w.write_u32(self.msg_ids.len() as u32);
        for id in &self.msg_ids {
            w.write_i64(*id);
        }
        w.into_bytes()
    }

    /// Deserialize (test servers).
    ///
    /// # Errors
    ///
    /// Any [`WireError`] on malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(payload);
        r.expect_constructor(ids::MSGS_ACK)?;
        Ok(Self {
            msg_ids: r.read_i64_vector()?,
        })
    }
}
