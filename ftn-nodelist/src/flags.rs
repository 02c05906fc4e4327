// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Flag-tail classification: internet protocols, email protocols,
//! informational flags, modem families and raw passthrough.

use ftn_model::{InternetConfig, InternetEndpoint, InternetProtocol, NodelistFormat};

/// Modem-family tokens tagged as modem flags rather than raw flags.
const MODEM_FLAGS: &[&str] = &[
    "V21", "V22", "V23", "V29", "V32", "V32B", "V32T", "V33", "V34", "V42", "V42B", "V90",
    "V90C", "V90S", "V92", "HST", "H96", "H14", "H16", "MAX", "PEP", "CSP", "ZYX", "VFC",
    "X2C", "X2S", "X75",
];

/// Email-only protocol tags; values are email addresses.
const EMAIL_PROTOCOL_TAGS: &[&str] = &["IMI", "ITX", "ISE", "IUC", "EMA", "EVY"];

/// Informational flags collected verbatim.
const INFO_FLAGS: &[&str] = &["INO4", "INO6", "ICM"];

/// Rewrites applied to flag tokens only when the 1986 format was detected.
const LEGACY_FLAG_REWRITES: &[(&str, &str)] = &[
    ("XP:", "XA"),
    ("CM:", "CM"),
    ("MO:", "MO"),
    ("LO:", "LO"),
];

/// Where one classified flag token landed.
#[derive(Debug, Default)]
pub struct ClassifiedFlags {
    pub raw: Vec<String>,
    pub modem: Vec<String>,
}

/// Classify the comma-tokenized flag tail of one nodelist row into the
/// node's [`InternetConfig`] and flag lists.
pub fn classify_flags(
    tokens: impl Iterator<Item = String>,
    format: NodelistFormat,
    internet: &mut InternetConfig,
) -> ClassifiedFlags {
    let mut classified = ClassifiedFlags::default();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let token = if format == NodelistFormat::F1986 {
            rewrite_legacy_flag(token)
        } else {
            token.to_string()
        };

        let (key, value) = match token.split_once(':') {
            Some((key, value)) => (key.to_ascii_uppercase(), Some(value)),
            None => (token.to_ascii_uppercase(), None),
        };

        if let Ok(protocol) = InternetProtocol::from_tag(&key) {
            let endpoint = value.map(parse_protocol_value).unwrap_or_default();
            internet
                .protocols
                .entry(protocol)
                .or_default()
                .push(endpoint);
            continue;
        }

        if key == "INA" {
            if let Some(host) = value.filter(|v| !v.is_empty()) {
                let _ = internet.defaults.insert("INA".to_string(), host.to_string());
            }
            continue;
        }

        if key == "IEM" {
            if let Some(email) = value.filter(|v| !v.is_empty()) {
                let _ = internet.defaults.insert("IEM".to_string(), email.to_string());
            }
            continue;
        }

        if EMAIL_PROTOCOL_TAGS.contains(&key.as_str()) {
            let _ = internet
                .email_protocols
                .insert(key, value.unwrap_or_default().to_string());
            continue;
        }

        if INFO_FLAGS.contains(&key.as_str()) && value.is_none() {
            let _ = internet.info_flags.insert(key);
            continue;
        }

        if value.is_none() && MODEM_FLAGS.contains(&key.as_str()) {
            classified.modem.push(token);
            continue;
        }

        // `U`, `T`, `Tyz` and anything unrecognised pass through raw.
        classified.raw.push(token);
    }

    classified
}

fn rewrite_legacy_flag(token: &str) -> String {
    for (from, to) in LEGACY_FLAG_REWRITES {
        if token.eq_ignore_ascii_case(from) {
            return (*to).to_string();
        }
    }
    token.to_string()
}

/// Parse one protocol flag value into an endpoint.
///
/// A pure decimal in 1..=65535 is a port; `[addr]` and `[addr]:port` keep
/// their brackets; otherwise a `host:port` split is attempted when the part
/// left of the last colon holds at most one colon itself and the suffix is
/// a valid port. Anything else is an address with no port.
pub fn parse_protocol_value(value: &str) -> InternetEndpoint {
    let value = value.trim();
    if value.is_empty() {
        return InternetEndpoint::default();
    }

    if let Ok(port) = value.parse::<u16>() {
        if port >= 1 {
            return InternetEndpoint::port_only(port);
        }
    }

    if value.starts_with('[') {
        if let Some(close) = value.find(']') {
            let bracketed = &value[..=close];
            let rest = &value[close + 1..];
            if let Some(port_text) = rest.strip_prefix(':') {
                if let Ok(port) = port_text.parse::<u16>() {
                    if port >= 1 {
                        return InternetEndpoint {
                            address: Some(bracketed.to_string()),
                            port: Some(port),
                        };
                    }
                }
            }
            return InternetEndpoint::address_only(bracketed);
        }
    }

    if let Some(idx) = value.rfind(':') {
        let (left, right) = (&value[..idx], &value[idx + 1..]);
        if left.matches(':').count() <= 1 {
            if let Ok(port) = right.parse::<u16>() {
                if port >= 1 && !left.is_empty() {
                    return InternetEndpoint {
                        address: Some(left.to_string()),
                        port: Some(port),
                    };
                }
            }
        }
    }

    InternetEndpoint::address_only(value)
}
