//! SASL authentication primitives (server side).
//!
//! PLAIN (RFC 4616) payload decoding, EXTERNAL, and the SCRAM-SHA-256
//! (RFC 5802/7677) server exchange. AUTHENTICATE payloads are chunked at
//! 400 bytes on the wire; an empty payload is the single character `+`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Maximum AUTHENTICATE chunk size on the wire.
pub const SASL_CHUNK_SIZE: usize = 400;

/// Supported SASL mechanisms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaslMechanism {
    /// Username + password in a single payload.
    Plain,
    /// TLS client certificate identity.
    External,
    /// Salted challenge-response (SHA-256).
    ScramSha256,
}

impl SaslMechanism {
    /// The wire name of the mechanism.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::External => "EXTERNAL",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
        }
    }

    /// Parse a mechanism name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(SaslMechanism::Plain),
            "EXTERNAL" => Some(SaslMechanism::External),
            "SCRAM-SHA-256" => Some(SaslMechanism::ScramSha256),
            _ => None,
        }
    }
}

/// Comma-joined mechanism list for `RPL_SASLMECHS` and the `sasl` cap value.
pub const MECHANISMS: &str = "PLAIN,EXTERNAL,SCRAM-SHA-256";

/// Errors from SASL payload handling.
#[derive(Debug, PartialEq, Eq)]
pub enum SaslError {
    /// Payload was not valid base64.
    InvalidEncoding,
    /// Payload structure did not match the mechanism.
    MalformedPayload,
    /// The client's proof did not verify.
    ProofMismatch,
    /// A SCRAM step arrived out of order.
    UnexpectedStep,
}

impl std::fmt::Display for SaslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaslError::InvalidEncoding => write!(f, "invalid base64 encoding"),
            SaslError::MalformedPayload => write!(f, "malformed payload"),
            SaslError::ProofMismatch => write!(f, "client proof mismatch"),
            SaslError::UnexpectedStep => write!(f, "unexpected SCRAM step"),
        }
    }
}

impl std::error::Error for SaslError {}

/// Decode a base64 AUTHENTICATE payload (`+` means empty).
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, SaslError> {
    if payload == "+" {
        return Ok(Vec::new());
    }
    BASE64.decode(payload).map_err(|_| SaslError::InvalidEncoding)
}

/// Split an outgoing payload into 400-byte AUTHENTICATE chunks.
///
/// A payload that is an exact multiple of the chunk size is followed by a
/// terminating `+` chunk; an empty payload is just `+`.
pub fn chunk_payload(data: &[u8]) -> Vec<String> {
    if data.is_empty() {
        return vec!["+".to_string()];
    }
    let encoded = BASE64.encode(data);
    let mut chunks: Vec<String> = encoded
        .as_bytes()
        .chunks(SASL_CHUNK_SIZE)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect();
    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        chunks.push("+".to_string());
    }
    chunks
}

/// Decoded PLAIN credentials.
#[derive(Debug, PartialEq, Eq)]
pub struct PlainCredentials {
    /// Authorization identity (usually empty).
    pub authzid: String,
    /// Authentication identity.
    pub authcid: String,
    /// Password.
    pub password: String,
}

/// Decode a PLAIN payload: `authzid NUL authcid NUL password`.
pub fn decode_plain(payload: &[u8]) -> Result<PlainCredentials, SaslError> {
    let parts: Vec<&[u8]> = payload.splitn(3, |&b| b == 0).collect();
    if parts.len() != 3 || parts[1].is_empty() {
        return Err(SaslError::MalformedPayload);
    }
    let text = |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| SaslError::MalformedPayload)
    };
    Ok(PlainCredentials {
        authzid: text(parts[0])?,
        authcid: text(parts[1])?,
        password: text(parts[2])?,
    })
}

// --- SCRAM-SHA-256 server exchange ---

fn hi(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut output = [0u8; 32];
    // InvalidLength cannot occur for a 32-byte output buffer.
    let _ = pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut output);
    output
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn scram_attr<'a>(message: &'a str, key: char) -> Option<&'a str> {
    message
        .split(',')
        .find_map(|part| part.strip_prefix(key)?.strip_prefix('='))
}

/// PBKDF2 iteration count for server-generated challenges.
const SCRAM_ITERATIONS: u32 = 4096;

/// Server side of a SCRAM-SHA-256 exchange.
///
/// Drives exactly two client payloads: client-first, then client-final.
#[derive(Debug)]
pub struct ScramServer {
    state: ScramState,
}

#[derive(Debug)]
enum ScramState {
    Fresh,
    SentChallenge {
        username: String,
        client_first_bare: String,
        server_first: String,
        combined_nonce: String,
        salt: Vec<u8>,
        iterations: u32,
    },
    Done,
}

/// Output of a SCRAM server step.
#[derive(Debug, PartialEq, Eq)]
pub enum ScramStep {
    /// Send this payload to the client and wait for the next step.
    Challenge {
        /// The username from client-first; look up its password before
        /// calling [`ScramServer::finish`].
        username: String,
        /// The server-first message.
        payload: Vec<u8>,
    },
    /// Authentication succeeded; send the final payload, then `903`.
    Success {
        /// The authenticated username.
        username: String,
        /// The server-final message (`v=...`).
        payload: Vec<u8>,
    },
}

impl ScramServer {
    /// Start a fresh exchange.
    pub fn new() -> Self {
        Self {
            state: ScramState::Fresh,
        }
    }

    /// Consume the client-first message and produce the server challenge.
    pub fn client_first(&mut self, payload: &[u8]) -> Result<ScramStep, SaslError> {
        if !matches!(self.state, ScramState::Fresh) {
            return Err(SaslError::UnexpectedStep);
        }
        let text = std::str::from_utf8(payload).map_err(|_| SaslError::MalformedPayload)?;

        // GS2 header: only `n,,` (no channel binding) is accepted.
        let bare = text
            .strip_prefix("n,,")
            .or_else(|| text.strip_prefix("y,,"))
            .ok_or(SaslError::MalformedPayload)?;

        let username = scram_attr(bare, 'n')
            .ok_or(SaslError::MalformedPayload)?
            .replace("=3D", "=")
            .replace("=2C", ",");
        let client_nonce = scram_attr(bare, 'r').ok_or(SaslError::MalformedPayload)?;
        if username.is_empty() || client_nonce.is_empty() {
            return Err(SaslError::MalformedPayload);
        }

        let mut nonce_bytes = [0u8; 18];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let combined_nonce = format!("{}{}", client_nonce, BASE64.encode(nonce_bytes));

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);

        let server_first = format!(
            "r={},s={},i={}",
            combined_nonce,
            BASE64.encode(salt),
            SCRAM_ITERATIONS
        );

        let step = ScramStep::Challenge {
            username: username.clone(),
            payload: server_first.clone().into_bytes(),
        };
        self.state = ScramState::SentChallenge {
            username,
            client_first_bare: bare.to_owned(),
            server_first,
            combined_nonce,
            salt: salt.to_vec(),
            iterations: SCRAM_ITERATIONS,
        };
        Ok(step)
    }

    /// Verify the client-final message against the account password.
    pub fn finish(&mut self, payload: &[u8], password: &str) -> Result<ScramStep, SaslError> {
        let ScramState::SentChallenge {
            username,
            client_first_bare,
            server_first,
            combined_nonce,
            salt,
            iterations,
        } = std::mem::replace(&mut self.state, ScramState::Done)
        else {
            return Err(SaslError::UnexpectedStep);
        };

        let text = std::str::from_utf8(payload).map_err(|_| SaslError::MalformedPayload)?;
        let nonce = scram_attr(text, 'r').ok_or(SaslError::MalformedPayload)?;
        let proof_b64 = scram_attr(text, 'p').ok_or(SaslError::MalformedPayload)?;
        if nonce != combined_nonce {
            return Err(SaslError::ProofMismatch);
        }

        let proof = BASE64
            .decode(proof_b64)
            .map_err(|_| SaslError::InvalidEncoding)?;

        let without_proof = text
            .rsplit_once(",p=")
            .map(|(head, _)| head)
            .ok_or(SaslError::MalformedPayload)?;
        let auth_message =
            format!("{client_first_bare},{server_first},{without_proof}");

        let salted = hi(password, &salt, iterations);
        let client_key = hmac_sha256(&salted, b"Client Key");
        let stored_key = sha256(&client_key);
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let recovered_key: Vec<u8> = proof
            .iter()
            .zip(client_signature.iter())
            .map(|(p, s)| p ^ s)
            .collect();

        if sha256(&recovered_key) != stored_key {
            return Err(SaslError::ProofMismatch);
        }

        let server_key = hmac_sha256(&salted, b"Server Key");
        let server_signature = hmac_sha256(&server_key, auth_message.as_bytes());
        Ok(ScramStep::Success {
            username,
            payload: format!("v={}", BASE64.encode(server_signature)).into_bytes(),
        })
    }
}

impl Default for ScramServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_plain_payload() {
        let creds = decode_plain(b"\0alice\0hunter2").unwrap();
        assert_eq!(creds.authzid, "");
        assert_eq!(creds.authcid, "alice");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn decode_plain_rejects_garbage() {
        assert_eq!(decode_plain(b"no-nuls"), Err(SaslError::MalformedPayload));
        assert_eq!(decode_plain(b"\0\0pw"), Err(SaslError::MalformedPayload));
    }

    #[test]
    fn plus_is_empty_payload() {
        assert_eq!(decode_payload("+").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn chunking_adds_terminator_on_exact_multiple() {
        // 300 bytes encodes to exactly 400 base64 chars.
        let chunks = chunk_payload(&[0u8; 300]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 400);
        assert_eq!(chunks[1], "+");

        let chunks = chunk_payload(b"short");
        assert_eq!(chunks.len(), 1);
    }

    /// Simulate a full client exchange against the server state machine.
    #[test]
    fn scram_full_exchange() {
        let password = "pencil";
        let mut server = ScramServer::new();

        let client_first = b"n,,n=user,r=clientnonce".to_vec();
        let (username, server_first) = match server.client_first(&client_first).unwrap() {
            ScramStep::Challenge { username, payload } => {
                (username, String::from_utf8(payload).unwrap())
            }
            other => panic!("expected challenge, got {other:?}"),
        };
        assert_eq!(username, "user");

        // Client side computation.
        let nonce = scram_attr(&server_first, 'r').unwrap().to_string();
        let salt = BASE64.decode(scram_attr(&server_first, 's').unwrap()).unwrap();
        let iterations: u32 = scram_attr(&server_first, 'i').unwrap().parse().unwrap();
        assert!(nonce.starts_with("clientnonce"));

        let salted = hi(password, &salt, iterations);
        let client_key = hmac_sha256(&salted, b"Client Key");
        let stored_key = sha256(&client_key);
        let without_proof = format!("c=biws,r={nonce}");
        let auth_message = format!("n=user,r=clientnonce,{server_first},{without_proof}");
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();
        let client_final = format!("{without_proof},p={}", BASE64.encode(proof));

        match server.finish(client_final.as_bytes(), password).unwrap() {
            ScramStep::Success { username, payload } => {
                assert_eq!(username, "user");
                assert!(String::from_utf8(payload).unwrap().starts_with("v="));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn scram_rejects_wrong_password() {
        let mut server = ScramServer::new();
        let step = server.client_first(b"n,,n=user,r=abc").unwrap();
        let server_first = match step {
            ScramStep::Challenge { payload, .. } => String::from_utf8(payload).unwrap(),
            other => panic!("{other:?}"),
        };
        let nonce = scram_attr(&server_first, 'r').unwrap().to_string();
        let salt = BASE64.decode(scram_attr(&server_first, 's').unwrap()).unwrap();

        // Proof computed from the wrong password.
        let salted = hi("wrong", &salt, SCRAM_ITERATIONS);
        let client_key = hmac_sha256(&salted, b"Client Key");
        let stored_key = sha256(&client_key);
        let without_proof = format!("c=biws,r={nonce}");
        let auth_message = format!("n=user,r=abc,{server_first},{without_proof}");
        let sig = hmac_sha256(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key.iter().zip(sig.iter()).map(|(k, s)| k ^ s).collect();
        let client_final = format!("{without_proof},p={}", BASE64.encode(proof));

        assert_eq!(
            server.finish(client_final.as_bytes(), "pencil").unwrap_err(),
            SaslError::ProofMismatch
        );
    }

    #[test]
    fn mechanism_names_round_trip() {
        for mech in [
            SaslMechanism::Plain,
            SaslMechanism::External,
            SaslMechanism::ScramSha256,
        ] {
            assert_eq!(SaslMechanism::from_name(mech.as_str()), Some(mech));
        }
        assert_eq!(SaslMechanism::from_name("CRAM-MD5"), None);
    }
}
