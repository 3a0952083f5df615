//! Claim model: the signed content of a canary.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize};

use crate::canonical::Canonicalize;
use crate::codes::{code_strings, inverse_codes, parse_codes, Code};
use crate::constants::{DEFAULT_AUTHOR_NAME, DEFAULT_EXPIRY_MINUTES, STANDARD_VERSION};
use crate::crypto::{decode_block_hash, format_public_key, parse_public_key};
use crate::error::{CanaryError, PolicyViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Cosigner,
}

/// A roster entry. Identity is the encoded key string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub role: Role,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub required: bool,
}

impl Signer {
    /// The author is always required.
    pub fn author(name: impl Into<String>, key: &VerifyingKey) -> Self {
        Self {
            role: Role::Author,
            name: name.into(),
            key: format_public_key(key),
            required: true,
        }
    }

    pub fn cosigner(name: impl Into<String>, key: &VerifyingKey, required: bool) -> Self {
        Self {
            role: Role::Cosigner,
            name: name.into(),
            key: format_public_key(key),
            required,
        }
    }
}

impl FromStr for Signer {
    type Err = CanaryError;

    /// Parses `name:key` or `name:key:required` into a cosigner entry.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 {
            return Err(invalid(format!("malformed signer, expected at least 2 ':' separated parts in {s}")));
        }
        if parts.len() > 3 {
            return Err(invalid(format!("malformed signer, expected at most 3 ':' separated parts in {s}")));
        }
        if parts.len() == 3 && parts[2] != "required" {
            return Err(invalid(format!("malformed signer, expected 'required' in the third part in {s}")));
        }
        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(invalid(format!("malformed signer, empty name or key in {s}")));
        }
        Ok(Self {
            role: Role::Cosigner,
            name: parts[0].to_string(),
            key: parts[1].to_string(),
            required: parts.len() == 3,
        })
    }
}

/// The claim object, serialized under the canary's `canary` member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryClaim {
    pub domain: String,
    pub min_signers: u32,
    #[serde(rename = "pubkeys")]
    pub public_keys: Vec<Signer>,
    #[serde(rename = "panickey")]
    pub panic_key: String,
    pub version: String,
    pub release: String,
    pub expiry: String,
    pub freshness: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub codes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mirrors: Vec<String>,
}

/// Lists may be written as `null` by other producers; read them as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Every signed claim field. Signer and verifier both walk [`ClaimField::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClaimField {
    #[serde(rename = "domain")]
    Domain,
    #[serde(rename = "min_signers")]
    MinSigners,
    #[serde(rename = "pubkeys")]
    PublicKeys,
    #[serde(rename = "panickey")]
    PanicKey,
    #[serde(rename = "version")]
    Version,
    #[serde(rename = "release")]
    Release,
    #[serde(rename = "expiry")]
    Expiry,
    #[serde(rename = "freshness")]
    Freshness,
    #[serde(rename = "codes")]
    Codes,
    #[serde(rename = "mirrors")]
    Mirrors,
}

impl ClaimField {
    pub const ALL: [ClaimField; 10] = [
        ClaimField::Domain,
        ClaimField::MinSigners,
        ClaimField::PublicKeys,
        ClaimField::PanicKey,
        ClaimField::Version,
        ClaimField::Release,
        ClaimField::Expiry,
        ClaimField::Freshness,
        ClaimField::Codes,
        ClaimField::Mirrors,
    ];

    /// The field's JSON tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::MinSigners => "min_signers",
            Self::PublicKeys => "pubkeys",
            Self::PanicKey => "panickey",
            Self::Version => "version",
            Self::Release => "release",
            Self::Expiry => "expiry",
            Self::Freshness => "freshness",
            Self::Codes => "codes",
            Self::Mirrors => "mirrors",
        }
    }
}

impl std::fmt::Display for ClaimField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CanaryClaim {
    /// Canonical encoding of one field's current value.
    pub fn canonical_field(&self, field: ClaimField) -> String {
        match field {
            ClaimField::Domain => self.domain.canonicalize(),
            ClaimField::MinSigners => self.min_signers.canonicalize(),
            ClaimField::PublicKeys => self.public_keys.canonicalize(),
            ClaimField::PanicKey => self.panic_key.canonicalize(),
            ClaimField::Version => self.version.canonicalize(),
            ClaimField::Release => self.release.canonicalize(),
            ClaimField::Expiry => self.expiry.canonicalize(),
            ClaimField::Freshness => self.freshness.canonicalize(),
            ClaimField::Codes => self.codes.canonicalize(),
            ClaimField::Mirrors => self.mirrors.canonicalize(),
        }
    }

    pub fn release_time(&self) -> Result<DateTime<Utc>, CanaryError> {
        parse_timestamp(&self.release)
    }

    pub fn expiry_time(&self) -> Result<DateTime<Utc>, CanaryError> {
        parse_timestamp(&self.expiry)
    }

    /// The roster's first entry.
    pub fn author(&self) -> Option<&Signer> {
        self.public_keys.first()
    }

    pub fn signer(&self, key: &str) -> Option<&Signer> {
        self.public_keys.iter().find(|s| s.key == key)
    }

    /// Roster rules that must hold for any claim, loaded or freshly built:
    /// `min_signers >= 1`, enough roster entries, no key listed twice.
    pub fn check_structure(&self) -> Result<(), CanaryError> {
        if self.min_signers < 1 {
            return Err(invalid("min_signers must be at least 1".into()));
        }
        if self.public_keys.len() < self.min_signers as usize {
            return Err(invalid(format!(
                "total number of signers should be at least min signers, min_signers={}, total={}",
                self.min_signers,
                self.public_keys.len()
            )));
        }
        let mut seen = HashSet::new();
        for signer in &self.public_keys {
            if !seen.insert(signer.key.as_str()) {
                return Err(invalid(format!("duplicate signer key for '{}'", signer.name)));
            }
        }
        Ok(())
    }

    /// Full rule set checked before a claim is signed by its author.
    pub fn check_issuable(&self) -> Result<(), CanaryError> {
        self.check_structure()?;
        match self.author() {
            Some(a) if a.role == Role::Author => {}
            _ => return Err(invalid("the first roster entry must be the author".into())),
        }
        for signer in &self.public_keys {
            parse_public_key(&signer.key)?;
        }
        if !self.panic_key.is_empty() {
            parse_public_key(&self.panic_key)?;
        }
        if self.release_time()? > self.expiry_time()? {
            return Err(invalid(format!("release {} is after expiry {}", self.release, self.expiry)));
        }
        decode_block_hash(&self.freshness)?;
        parse_codes(&self.codes)?;
        Ok(())
    }
}

/// Parse an RFC3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CanaryError> {
    Ok(DateTime::parse_from_rfc3339(s.trim())?.with_timezone(&Utc))
}

/// RFC3339 at second precision with a `Z` suffix.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn invalid(msg: String) -> CanaryError {
    PolicyViolation::InvalidClaim(msg).into()
}

/// Author first, then cosigners required-first and by name. A cosigner
/// entry carrying the author's key only renames the author.
fn assemble_roster(mut author: Signer, cosigners: &[Signer]) -> Result<Vec<Signer>, CanaryError> {
    let mut names = HashSet::new();
    for s in cosigners {
        if !names.insert(s.name.as_str()) {
            return Err(invalid(format!("duplicate signer found with the name {}", s.name)));
        }
    }

    let mut others: Vec<Signer> = Vec::with_capacity(cosigners.len());
    for s in cosigners {
        if s.key == author.key {
            author.name = s.name.clone();
            continue;
        }
        others.push(Signer { role: Role::Cosigner, ..s.clone() });
    }
    others.sort_by(|a, b| b.required.cmp(&a.required).then_with(|| a.name.cmp(&b.name)));

    if author.name.is_empty() {
        author.name = DEFAULT_AUTHOR_NAME.to_string();
    }
    let mut roster = Vec::with_capacity(others.len() + 1);
    roster.push(author);
    roster.extend(others);
    Ok(roster)
}

/// `release` plus `minutes`, or `InvalidClaim` when that leaves chrono's range.
fn expiry_after(release: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, CanaryError> {
    Duration::try_minutes(minutes)
        .and_then(|d| release.checked_add_signed(d))
        .ok_or_else(|| invalid(format!("validity of {minutes} minutes is out of range")))
}

fn clamp_min_signers(n: u32) -> u32 {
    n.max(1)
}

/// Assembles a fresh claim for a new canary.
#[derive(Debug, Clone)]
pub struct ClaimBuilder {
    domain: String,
    author: Signer,
    cosigners: Vec<Signer>,
    panic_key: String,
    min_signers: u32,
    release: Option<DateTime<Utc>>,
    validity_minutes: i64,
    freshness: String,
    triggered: Vec<Code>,
    mirrors: Vec<String>,
}

impl ClaimBuilder {
    pub fn new(domain: impl Into<String>, author: &VerifyingKey) -> Self {
        Self {
            domain: domain.into(),
            author: Signer::author("", author),
            cosigners: Vec::new(),
            panic_key: String::new(),
            min_signers: 1,
            release: None,
            validity_minutes: DEFAULT_EXPIRY_MINUTES,
            freshness: String::new(),
            triggered: Vec::new(),
            mirrors: Vec::new(),
        }
    }

    pub fn author_name(mut self, name: impl Into<String>) -> Self {
        self.author.name = name.into();
        self
    }

    pub fn signer(mut self, signer: Signer) -> Self {
        self.cosigners.push(signer);
        self
    }

    pub fn signers(mut self, signers: impl IntoIterator<Item = Signer>) -> Self {
        self.cosigners.extend(signers);
        self
    }

    pub fn panic_key(mut self, key: &VerifyingKey) -> Self {
        self.panic_key = format_public_key(key);
        self
    }

    /// Values below 1 are raised to 1.
    pub fn min_signers(mut self, n: u32) -> Self {
        self.min_signers = clamp_min_signers(n);
        self
    }

    /// Release time; defaults to the moment `build` runs.
    pub fn released_at(mut self, t: DateTime<Utc>) -> Self {
        self.release = Some(t);
        self
    }

    pub fn validity_minutes(mut self, minutes: i64) -> Self {
        self.validity_minutes = minutes;
        self
    }

    /// Hex hash of a recent block, the freshness anchor.
    pub fn freshness(mut self, block_hash: impl Into<String>) -> Self {
        self.freshness = block_hash.into();
        self
    }

    /// Events that HAVE occurred. The claim carries every other code.
    pub fn triggered(mut self, codes: &[Code]) -> Self {
        self.triggered = codes.to_vec();
        self
    }

    pub fn mirror(mut self, url: impl Into<String>) -> Self {
        self.mirrors.push(url.into());
        self
    }

    pub fn build(self) -> Result<CanaryClaim, CanaryError> {
        let release = self.release.unwrap_or_else(Utc::now);
        let expiry = expiry_after(release, self.validity_minutes)?;
        let claim = CanaryClaim {
            domain: self.domain,
            min_signers: self.min_signers,
            public_keys: assemble_roster(self.author, &self.cosigners)?,
            panic_key: self.panic_key,
            version: STANDARD_VERSION.to_string(),
            release: format_timestamp(&release),
            expiry: format_timestamp(&expiry),
            freshness: self.freshness,
            codes: code_strings(&inverse_codes(&self.triggered)),
            mirrors: self.mirrors,
        };
        claim.check_issuable()?;
        Ok(claim)
    }
}

/// Changes applied when the author re-issues a canary, or when it is panicked.
#[derive(Debug, Clone)]
pub struct ClaimUpdate {
    pub released_at: Option<DateTime<Utc>>,
    pub validity_minutes: i64,
    pub freshness: String,
    pub triggered: Vec<Code>,
    pub min_signers: Option<u32>,
    /// Replaces every cosigner; the author entry is kept.
    pub signers: Option<Vec<Signer>>,
    pub mirrors: Option<Vec<String>>,
}

impl ClaimUpdate {
    pub fn new(block_hash: impl Into<String>) -> Self {
        Self {
            released_at: None,
            validity_minutes: DEFAULT_EXPIRY_MINUTES,
            freshness: block_hash.into(),
            triggered: Vec::new(),
            min_signers: None,
            signers: None,
            mirrors: None,
        }
    }

    /// Apply to `claim` in place. On error the claim is left untouched.
    pub fn apply(&self, claim: &mut CanaryClaim) -> Result<(), CanaryError> {
        let mut next = claim.clone();
        let release = self.released_at.unwrap_or_else(Utc::now);
        let expiry = expiry_after(release, self.validity_minutes)?;

        next.version = STANDARD_VERSION.to_string();
        next.release = format_timestamp(&release);
        next.expiry = format_timestamp(&expiry);
        next.freshness = self.freshness.clone();
        next.codes = code_strings(&inverse_codes(&self.triggered));
        if let Some(n) = self.min_signers {
            next.min_signers = clamp_min_signers(n);
        }
        if let Some(signers) = &self.signers {
            let author = next
                .author()
                .cloned()
                .ok_or_else(|| invalid("claim has no author".into()))?;
            next.public_keys = assemble_roster(author, signers)?;
        }
        if let Some(mirrors) = &self.mirrors {
            next.mirrors = mirrors.clone();
        }

        next.check_issuable()?;
        *claim = next;
        Ok(())
    }
}
