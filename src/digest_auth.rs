//! ISAPI camera protocol client
//! HTTP Digest authentication (RFC 2617)
//!
//! Parses `WWW-Authenticate: Digest ...` challenges and computes the matching
//! `Authorization` header. MD5 is used because the devices require it; none
//! of this is suitable where collision resistance matters.
//!
//! Pure computation only: no I/O, no retries.

use crate::device_endpoint::Credentials;

/// Client nonce count; each challenge is answered exactly once.
pub const NONCE_COUNT: &str = "00000001";

/// Parameters of a Digest challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value.
    ///
    /// Returns `None` if the scheme is not Digest or no nonce was offered,
    /// since no valid response can be computed without one.
    pub fn parse(header_value: &str) -> Option<Self> {
        let trimmed = header_value.trim_start();
        let (scheme, rest) = trimmed.split_at(trimmed.find(char::is_whitespace).unwrap_or(trimmed.len()));
        if !scheme.eq_ignore_ascii_case("Digest") {
            return None;
        }

        let params = parse_auth_params(rest);
        let lookup = |key: &str| {
            params
                .iter()
                .rev()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
        };

        let nonce = lookup("nonce").filter(|n| !n.is_empty())?;

        Some(Self {
            realm: lookup("realm").unwrap_or_default(),
            nonce,
            opaque: lookup("opaque").filter(|o| !o.is_empty()),
            qop: lookup("qop").filter(|q| !q.is_empty()),
            algorithm: lookup("algorithm").filter(|a| !a.is_empty()),
        })
    }

    pub fn algorithm(&self) -> &str {
        self.algorithm.as_deref().unwrap_or("MD5")
    }

    fn is_session_algorithm(&self) -> bool {
        self.algorithm().eq_ignore_ascii_case("MD5-sess")
    }

    /// The qop token to answer with: `auth` whenever offered, else the literal value
    pub fn selected_qop(&self) -> Option<&str> {
        let qop = self.qop.as_deref()?;
        if qop.split(',').any(|token| token.trim().eq_ignore_ascii_case("auth")) {
            Some("auth")
        } else {
            Some(qop)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Key,
    ValueStart,
    Quoted,
    QuotedEscape,
    Token,
}

/// Split auth-params into `(key, value)` pairs.
///
/// Quoted values may contain commas and backslash escapes; unquoted tokens
/// end at the next comma. Keys keep their original spelling.
pub fn parse_auth_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut state = ScanState::Key;
    let mut key = String::new();
    let mut value = String::new();

    for ch in input.chars() {
        match state {
            ScanState::Key => match ch {
                '=' => {
                    state = ScanState::ValueStart;
                }
                ',' => key.clear(),
                c if c.is_whitespace() && key.is_empty() => {}
                c => key.push(c),
            },
            ScanState::ValueStart => match ch {
                '"' => {
                    state = ScanState::Quoted;
                }
                c if c.is_whitespace() => {}
                ',' => {
                    push_param(&mut params, &mut key, &mut value);
                    state = ScanState::Key;
                }
                c => {
                    value.push(c);
                    state = ScanState::Token;
                }
            },
            ScanState::Quoted => match ch {
                '\\' => {
                    state = ScanState::QuotedEscape;
                }
                '"' => {
                    push_param(&mut params, &mut key, &mut value);
                    state = ScanState::Key;
                }
                c => value.push(c),
            },
            ScanState::QuotedEscape => {
                value.push(ch);
                state = ScanState::Quoted;
            }
            ScanState::Token => match ch {
                ',' => {
                    push_param(&mut params, &mut key, &mut value);
                    state = ScanState::Key;
                }
                c => value.push(c),
            },
        }
    }

    match state {
        ScanState::Token | ScanState::ValueStart => push_param(&mut params, &mut key, &mut value),
        // an unterminated quoted value is dropped
        ScanState::Quoted | ScanState::QuotedEscape | ScanState::Key => {}
    }

    params
}

fn push_param(params: &mut Vec<(String, String)>, key: &mut String, value: &mut String) {
    let name = key.trim();
    if !name.is_empty() {
        params.push((name.to_string(), value.trim_end().to_string()));
    }
    key.clear();
    value.clear();
}

/// Calculate MD5 hash as lowercase hex
fn calculate_md5(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Fresh client nonce, 32 hex chars
pub fn generate_cnonce() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Compute the `Authorization` header value for one request.
///
/// `uri` is the request's path and query exactly as sent on the wire.
pub fn compute_authorization_header(
    challenge: &DigestChallenge,
    credentials: &Credentials,
    method: &str,
    uri: &str
) -> String {
    compute_authorization_header_with_cnonce(
        challenge,
        credentials,
        method,
        uri,
        &generate_cnonce()
    )
}

/// Same as [`compute_authorization_header`] with a caller-chosen client nonce
pub fn compute_authorization_header_with_cnonce(
    challenge: &DigestChallenge,
    credentials: &Credentials,
    method: &str,
    uri: &str,
    cnonce: &str
) -> String {
    let username = credentials.username();
    let realm = &challenge.realm;
    let nonce = &challenge.nonce;

    let mut ha1 = calculate_md5(&format!("{}:{}:{}", username, realm, credentials.password()));
    if challenge.is_session_algorithm() {
        ha1 = calculate_md5(&format!("{}:{}:{}", ha1, nonce, cnonce));
    }
    let ha2 = calculate_md5(&format!("{}:{}", method, uri));

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", algorithm={}, "#,
        quote_escape(username),
        quote_escape(realm),
        quote_escape(nonce),
        quote_escape(uri),
        challenge.algorithm()
    );

    match challenge.selected_qop() {
        Some(qop) => {
            let response = calculate_md5(
                &format!("{}:{}:{}:{}:{}:{}", ha1, nonce, NONCE_COUNT, cnonce, qop, ha2)
            );
            header.push_str(
                &format!(
                    r#"response="{}", qop={}, nc={}, cnonce="{}""#,
                    response,
                    qop,
                    NONCE_COUNT,
                    quote_escape(cnonce)
                )
            );
        }
        None => {
            let response = calculate_md5(&format!("{}:{}:{}", ha1, nonce, ha2));
            header.push_str(&format!(r#"response="{}""#, response));
        }
    }

    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(r#", opaque="{}""#, quote_escape(opaque)));
    }

    header
}

fn quote_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
