//! The handshake state machine.
//!
//! Drives the fixed req_pq → req_dh_params → set_client_dh_params
//! sequence over one framed connection, derives the 256-byte auth key and
//! writes it into the datacenter registry. Every verification fault
//! restarts the sequence from the top with fresh nonces; nothing here is
//! fatal to the process.
//!
//! The connection actor awaits delegate callbacks in-order, so the state
//! behind the async mutex is never contended in practice; the lock just
//! makes that ordering explicit at the type level.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use keel_crypto::rsa::Keyring;
use keel_crypto::{AUTH_KEY_LEN, CryptoError, dh, factorize, ige, random_array, sha};
use keel_transport::{Connection, ConnectionDelegate};
use num_bigint::BigUint;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::datacenter::Datacenter;
use crate::envelope::{MessageIdClock, pack_plaintext, unpack_plaintext};
use crate::salt::ServerSalt;
use crate::wire::{
    ClientDhInnerData, DhGenOutcome, DhOutcome, MsgsAck, PqInnerData, ReqDhParams, ReqPq, ResPq,
    ServerDhInnerData, ServerDhParams, SetClientDhParams, WireError, ids, peek_constructor,
};

/// Lifetime of the salt derived from the handshake nonces, seconds.
const INITIAL_SALT_LIFETIME: i32 = 1800;
/// The derived salt's window is back-dated slightly so it is already valid
/// despite clock measurement error.
const INITIAL_SALT_SKEW: i32 = 5;

/// Handshake faults. All of them are recoverable: the reaction to every
/// variant is a restart from the top, never an abort.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A response echoed the wrong client or server nonce
    #[error("nonce mismatch")]
    NonceMismatch,

    /// None of the server-offered key fingerprints is in the local table
    #[error("no matching server key fingerprint")]
    NoMatchingFingerprint,

    /// An integrity hash did not verify
    #[error("integrity hash mismatch")]
    HashMismatch,

    /// The server offered a DH group that fails the safety predicate
    #[error("unacceptable dh group")]
    BadPrime,

    /// A DH public value sits too close to the group edges
    #[error("dh public value out of range")]
    BadDhValue,

    /// The server rejected the exchange (params-fail, gen-retry, gen-fail)
    #[error("server rejected the exchange")]
    ServerRejected,

    /// The factorization worker was cancelled
    #[error("factorization worker gone")]
    WorkerGone,

    /// Malformed wire data
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Cryptographic primitive failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Everything a successful handshake produces.
#[derive(Clone)]
pub struct HandshakeResult {
    /// The derived 256-byte auth key
    pub auth_key: [u8; AUTH_KEY_LEN],
    /// Its 8-byte identifier
    pub auth_key_id: i64,
    /// The initial server salt
    pub salt: ServerSalt,
    /// Measured server minus client clock skew, seconds
    pub clock_offset: i32,
}

impl fmt::Debug for HandshakeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeResult")
            .field("auth_key", &"[256 bytes]")
            .field("auth_key_id", &self.auth_key_id)
            .field("salt", &self.salt)
            .field("clock_offset", &self.clock_offset)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Initial,
    AwaitingResPq,
    AwaitingDhParams,
    AwaitingDhOutcome,
    Complete,
}

struct State {
    stage: Stage,
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: Zeroizing<[u8; 32]>,
    auth_key: Zeroizing<[u8; AUTH_KEY_LEN]>,
    clock_offset: i32,
    pending_request: Option<Vec<u8>>,
    needs_resend: bool,
    clock: MessageIdClock,
    completion: Option<oneshot::Sender<HandshakeResult>>,
}

/// One handshake attempt bound to one connection and one datacenter.
///
/// Install via [`Handshake::begin`]; the result arrives exactly once on
/// the returned receiver. The handshake owns the connection's delegate
/// slot until it completes, then clears it so the connection can be
/// handed to general traffic.
pub struct Handshake {
    connection: Connection,
    datacenter: Arc<Datacenter>,
    keyring: Keyring,
    state: Mutex<State>,
}

impl Handshake {
    /// Start a handshake: installs itself as the connection delegate and
    /// connects. Returns the shared handle and the completion receiver.
    pub fn begin(
        connection: Connection,
        datacenter: Arc<Datacenter>,
        keyring: Keyring,
    ) -> (Arc<Self>, oneshot::Receiver<HandshakeResult>) {
        let (tx, rx) = oneshot::channel();
        let handshake = Arc::new(Self {
            connection: connection.clone(),
            datacenter,
            keyring,
            state: Mutex::new(State {
                stage: Stage::Initial,
                nonce: [0; 16],
                server_nonce: [0; 16],
                new_nonce: Zeroizing::new([0; 32]),
                auth_key: Zeroizing::new([0; AUTH_KEY_LEN]),
                clock_offset: 0,
                pending_request: None,
                needs_resend: false,
                clock: MessageIdClock::new(),
                completion: Some(tx),
            }),
        });
        connection.set_delegate(handshake.clone() as Arc<dyn ConnectionDelegate>);
        connection.connect();
        (handshake, rx)
    }

    fn send_request(&self, state: &mut State, body: Vec<u8>, remember: bool) {
        let msg_id = state.clock.next(state.clock_offset);
        let payload = pack_plaintext(msg_id, &body);
        if remember {
            state.pending_request = Some(payload.clone());
        }
        self.connection.send(payload, false);
    }

    /// (Re)start from the top with a fresh client nonce.
    fn start(&self, state: &mut State) -> Result<(), HandshakeError> {
        state.stage = Stage::AwaitingResPq;
        state.nonce = random_array()?;
        state.needs_resend = false;
        debug!(datacenter = self.datacenter.id(), "handshake starting");
        let body = ReqPq { nonce: state.nonce }.encode();
        self.send_request(state, body, true);
        Ok(())
    }

    async fn handle_frame(&self, state: &mut State, frame: &[u8]) -> Result<(), HandshakeError> {
        let message = unpack_plaintext(frame)?;
        let constructor = peek_constructor(message.body).ok_or(WireError::Truncated)?;
        match (state.stage, constructor) {
            (Stage::AwaitingResPq, ids::RES_PQ) => self.process_res_pq(state, message.body).await,
            (Stage::AwaitingDhParams, ids::SERVER_DH_PARAMS_OK | ids::SERVER_DH_PARAMS_FAIL) => {
                self.process_dh_params(state, message.body)
            }
            (Stage::AwaitingDhOutcome, ids::DH_GEN_OK | ids::DH_GEN_RETRY | ids::DH_GEN_FAIL) => {
                self.process_dh_outcome(state, message.body)
            }
            _ => {
                // Not one of the four expected responses: ack it so the
                // server stops resending, and carry on waiting.
                debug!(
                    msg_id = message.msg_id,
                    constructor,
                    "acknowledging unexpected message"
                );
                let ack = MsgsAck {
                    msg_ids: vec![message.msg_id],
                }
                .encode();
                self.send_request(state, ack, false);
                Ok(())
            }
        }
    }

    async fn process_res_pq(&self, state: &mut State, body: &[u8]) -> Result<(), HandshakeError> {
        let res = ResPq::decode(body)?;
        if res.nonce != state.nonce {
            return Err(HandshakeError::NonceMismatch);
        }
        let key = self
            .keyring
            .select(&res.fingerprints)
            .ok_or(HandshakeError::NoMatchingFingerprint)?;
        state.server_nonce = res.server_nonce;

        if res.pq.len() > 8 {
            return Err(WireError::Malformed("oversized pq").into());
        }
        let pq = res.pq.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        // Factorization is real CPU work; keep it off the protocol task.
        let (p, q) = tokio::task::spawn_blocking(move || factorize(pq))
            .await
            .map_err(|_| HandshakeError::WorkerGone)??;
        debug!(datacenter = self.datacenter.id(), pq, p, q, "factored server challenge");

        state.new_nonce = Zeroizing::new(random_array()?);
        let p_bytes = minimal_be_bytes(u64::from(p));
        let q_bytes = minimal_be_bytes(u64::from(q));
        let inner = PqInnerData {
            pq: res.pq.clone(),
            p: p_bytes.clone(),
            q: q_bytes.clone(),
            nonce: state.nonce,
            server_nonce: state.server_nonce,
            new_nonce: *state.new_nonce,
        }
        .encode();
        let encrypted = key.encrypt_padded(&inner)?;

        let request = ReqDhParams {
            nonce: state.nonce,
            server_nonce: state.server_nonce,
            p: p_bytes,
            q: q_bytes,
            fingerprint: key.fingerprint(),
            encrypted_data: encrypted.to_vec(),
        }
        .encode();
        state.stage = Stage::AwaitingDhParams;
        self.send_request(state, request, true);
        Ok(())
    }

    fn process_dh_params(&self, state: &mut State, body: &[u8]) -> Result<(), HandshakeError> {
        match ServerDhParams::decode(body)? {
            ServerDhParams::Fail {
                nonce,
                server_nonce,
                ..
            } => {
                if nonce != state.nonce || server_nonce != state.server_nonce {
                    return Err(HandshakeError::NonceMismatch);
                }
                warn!(datacenter = self.datacenter.id(), "server rejected dh params");
                Err(HandshakeError::ServerRejected)
            }
            ServerDhParams::Ok {
                nonce,
                server_nonce,
                mut encrypted_answer,
            } => {
                if nonce != state.nonce || server_nonce != state.server_nonce {
                    return Err(HandshakeError::NonceMismatch);
                }

                let (tmp_key, tmp_iv) = sha::derive_tmp_aes(&state.server_nonce, &state.new_nonce);
                ige::ige_decrypt(&mut encrypted_answer, &tmp_key, &tmp_iv)?;
                let verified_len = sha::verify_trimmed_hash(&encrypted_answer)
                    .ok_or(HandshakeError::HashMismatch)?;
                let inner =
                    ServerDhInnerData::decode(&encrypted_answer[20..20 + verified_len])?;
                if inner.nonce != state.nonce || inner.server_nonce != state.server_nonce {
                    return Err(HandshakeError::NonceMismatch);
                }

                let prime = BigUint::from_bytes_be(&inner.dh_prime);
                if !dh::is_good_prime(&prime, inner.g) {
                    return Err(HandshakeError::BadPrime);
                }
                let g_a = BigUint::from_bytes_be(&inner.g_a);
                if !dh::is_good_dh_value(&g_a, &prime) {
                    return Err(HandshakeError::BadDhValue);
                }

                state.clock_offset = inner.server_time - unix_seconds();

                let b_bytes = Zeroizing::new(random_array::<AUTH_KEY_LEN>()?);
                let b = BigUint::from_bytes_be(&b_bytes[..]);
                let g_b = BigUint::from(inner.g).modpow(&b, &prime);
                if !dh::is_good_dh_value(&g_b, &prime) {
                    return Err(HandshakeError::BadDhValue);
                }
                state.auth_key =
                    Zeroizing::new(dh::normalize_auth_key(&g_a.modpow(&b, &prime).to_bytes_be())?);

                let inner_ack = ClientDhInnerData {
                    nonce: state.nonce,
                    server_nonce: state.server_nonce,
                    retry_id: 0,
                    g_b: g_b.to_bytes_be(),
                }
                .encode();
                let mut blob = Vec::with_capacity(20 + inner_ack.len() + 15);
                blob.extend_from_slice(&sha::sha1(&inner_ack));
                blob.extend_from_slice(&inner_ack);
                let pad = (16 - blob.len() % 16) % 16;
                if pad > 0 {
                    let mut padding = vec![0u8; pad];
                    keel_crypto::fill_random(&mut padding)?;
                    blob.extend_from_slice(&padding);
                }
                ige::ige_encrypt(&mut blob, &tmp_key, &tmp_iv)?;

                let request = SetClientDhParams {
                    nonce: state.nonce,
                    server_nonce: state.server_nonce,
                    encrypted_data: blob,
                }
                .encode();
                state.stage = Stage::AwaitingDhOutcome;
                self.send_request(state, request, true);
                debug!(
                    datacenter = self.datacenter.id(),
                    clock_offset = state.clock_offset,
                    "dh group accepted, sent client public value"
                );
                Ok(())
            }
        }
    }

    fn process_dh_outcome(&self, state: &mut State, body: &[u8]) -> Result<(), HandshakeError> {
        let msg = DhGenOutcome::decode(body)?;
        if msg.nonce != state.nonce || msg.server_nonce != state.server_nonce {
            return Err(HandshakeError::NonceMismatch);
        }

        let auth_key_sha = sha::sha1(&state.auth_key[..]);
        let expected =
            sha::dh_outcome_hash(&state.new_nonce, msg.outcome.selector(), &auth_key_sha);
        if expected != msg.new_nonce_hash {
            return Err(HandshakeError::HashMismatch);
        }

        match msg.outcome {
            DhOutcome::Ok => {
                let auth_key = *state.auth_key;
                let auth_key_id = dh::auth_key_id(&auth_key);
                let server_now = unix_seconds() + state.clock_offset;
                let salt = initial_salt(&state.new_nonce, &state.server_nonce, server_now);

                self.datacenter.set_auth_key(auth_key, auth_key_id);
                self.datacenter.add_salt(salt);

                state.stage = Stage::Complete;
                state.pending_request = None;
                // Hand the connection over to general traffic
                self.connection.clear_delegate();
                debug!(
                    datacenter = self.datacenter.id(),
                    auth_key_id,
                    clock_offset = state.clock_offset,
                    "handshake complete"
                );
                if let Some(tx) = state.completion.take() {
                    let _ = tx.send(HandshakeResult {
                        auth_key,
                        auth_key_id,
                        salt,
                        clock_offset: state.clock_offset,
                    });
                }
                Ok(())
            }
            DhOutcome::Retry | DhOutcome::Fail => {
                warn!(
                    datacenter = self.datacenter.id(),
                    outcome = ?msg.outcome,
                    "server did not accept the derived key"
                );
                Err(HandshakeError::ServerRejected)
            }
        }
    }
}

#[async_trait]
impl ConnectionDelegate for Handshake {
    async fn on_connected(&self, token: u32) {
        let mut state = self.state.lock().await;
        if state.stage == Stage::Complete {
            return;
        }
        if state.needs_resend {
            if let Some(payload) = state.pending_request.clone() {
                debug!(token, "resending pending handshake request");
                state.needs_resend = false;
                self.connection.send(payload, false);
                return;
            }
            state.needs_resend = false;
        }
        if state.stage == Stage::Initial {
            if let Err(error) = self.start(&mut state) {
                warn!(%error, "failed to start handshake");
            }
        }
    }

    async fn on_closed(&self, token: u32) {
        let mut state = self.state.lock().await;
        if state.stage != Stage::Complete && state.pending_request.is_some() {
            debug!(token, "connection lost mid-handshake, marking for resend");
            state.needs_resend = true;
        }
    }

    async fn on_data(&self, _token: u32, payload: Vec<u8>) {
        let mut state = self.state.lock().await;
        if state.stage == Stage::Complete {
            return;
        }
        if let Err(error) = self.handle_frame(&mut state, &payload).await {
            warn!(
                datacenter = self.datacenter.id(),
                %error,
                "handshake fault, restarting"
            );
            if let Err(error) = self.start(&mut state) {
                warn!(%error, "failed to restart handshake");
            }
        }
    }

    async fn on_quick_ack(&self, _token: u32, ack_id: u32) {
        debug!(ack_id, "quick ack during handshake ignored");
    }

    async fn on_progress(&self, _token: u32, _message_id: i64, _received: u32, _total: u32) {}
}

/// Minimal big-endian encoding of an integer (no leading zero bytes).
fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

/// The initial salt: the byte-wise XOR of the leading 8 bytes of the new
/// nonce and the server nonce, valid for half an hour starting slightly
/// in the past.
fn initial_salt(new_nonce: &[u8; 32], server_nonce: &[u8; 16], server_now: i32) -> ServerSalt {
    let mut value = [0u8; 8];
    for (i, byte) in value.iter_mut().enumerate() {
        *byte = new_nonce[i] ^ server_nonce[i];
    }
    ServerSalt {
        valid_since: server_now - INITIAL_SALT_SKEW,
        valid_until: server_now - INITIAL_SALT_SKEW + INITIAL_SALT_LIFETIME,
        value: i64::from_le_bytes(value),
    }
}

fn unix_seconds() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i32)
}
