//! Magnet URI parsing.
//!
//! Only the parameters the queue needs are extracted: the BitTorrent info
//! hash (`xt=urn:btih:`), the display name (`dn`), the exact length (`xl`)
//! and the trackers (`tr`). Everything else is ignored.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

const MAGNET_PREFIX: &str = "magnet:?";
const BTIH_URN: &str = "urn:btih:";

lazy_static! {
    static ref INFO_HASH_RE: Regex = Regex::new(r"^[A-Za-z0-9]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MagnetParseError {
    #[error("Not a magnet link")]
    MissingScheme,

    #[error("Magnet link has no BitTorrent info hash")]
    MissingInfoHash,

    #[error("Invalid info hash '{0}'")]
    InvalidInfoHash(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MagnetLink {
    /// The link as submitted, trimmed.
    pub uri: String,
    pub info_hash: String,
    pub display_name: Option<String>,
    pub exact_length: Option<u64>,
    pub trackers: Vec<String>,
}

impl MagnetLink {
    pub fn parse(input: &str) -> Result<Self, MagnetParseError> {
        let uri = input.trim();
        let query = uri
            .get(..MAGNET_PREFIX.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(MAGNET_PREFIX))
            .map(|_| &uri[MAGNET_PREFIX.len()..])
            .ok_or(MagnetParseError::MissingScheme)?;

        let mut info_hash = None;
        let mut display_name = None;
        let mut exact_length = None;
        let mut trackers = Vec::new();

        for pair in query.split('&') {
            let (key, value) = match pair.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            match key {
                "xt" => {
                    let is_btih = value
                        .get(..BTIH_URN.len())
                        .is_some_and(|urn| urn.eq_ignore_ascii_case(BTIH_URN));
                    if is_btih && info_hash.is_none() {
                        let hash = &value[BTIH_URN.len()..];
                        if !INFO_HASH_RE.is_match(hash) {
                            return Err(MagnetParseError::InvalidInfoHash(hash.to_string()));
                        }
                        info_hash = Some(hash.to_string());
                    }
                }
                "dn" => display_name = Some(decode_component(value)),
                "xl" => exact_length = value.parse::<u64>().ok(),
                "tr" => trackers.push(decode_component(value)),
                _ => {}
            }
        }

        Ok(Self {
            uri: uri.to_string(),
            info_hash: info_hash.ok_or(MagnetParseError::MissingInfoHash)?,
            display_name: display_name.filter(|name| !name.trim().is_empty()),
            exact_length,
            trackers,
        })
    }

    /// Name to show for the download.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => {
                let short: String = self.info_hash.chars().take(8).collect();
                format!("magnet {}", short)
            }
        }
    }
}

impl FromStr for MagnetLink {
    type Err = MagnetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MagnetLink::parse(s)
    }
}

impl std::fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

// Query components use '+' for spaces on top of percent-encoding.
fn decode_component(value: &str) -> String {
    let plus_decoded = value.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}
