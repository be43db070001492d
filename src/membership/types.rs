use crate::error::{GridError, GridResult};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static INSTANCE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s/:]+(:\d{1,5})?(/\S*)?$").expect("Invalid instance URL regex")
});

/// Position of this process in the grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Solo,
    Master,
    Slave,
}

/// Shared secret minted at master promotion.
///
/// Acts as a capability: every privileged report call must present it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token(pub String);

impl Token {
    /// 256 random bits, hex encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens never end up in logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(..)")
    }
}

/// Enrollment payload as handed out by a broker or an operator.
///
/// Either field may be absent on the wire; `InstanceInfo::try_from`
/// performs the required-field validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceOffer {
    pub url: Option<String>,
    pub token: Option<String>,
}

/// A reachable worker: its RPC address and the token that opens it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InstanceInfo {
    pub url: String,
    pub token: String,
}

impl InstanceInfo {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> GridResult<Self> {
        InstanceOffer {
            url: Some(url.into()),
            token: Some(token.into()),
        }
        .try_into()
    }
}

impl TryFrom<InstanceOffer> for InstanceInfo {
    type Error = GridError;

    fn try_from(offer: InstanceOffer) -> GridResult<Self> {
        let url = offer
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(GridError::MissingField("url"))?;
        let token = offer
            .token
            .filter(|t| !t.is_empty())
            .ok_or(GridError::MissingField("token"))?;

        if !INSTANCE_URL_REGEX.is_match(&url) {
            return Err(GridError::InvalidUrl {
                url,
                reason: "expected http(s)://host[:port][/path]".to_string(),
            });
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

impl From<InstanceInfo> for InstanceOffer {
    fn from(info: InstanceInfo) -> Self {
        Self {
            url: Some(info.url),
            token: Some(info.token),
        }
    }
}

/// What a slave knows about the master it reports to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterLink {
    pub url: String,
    pub token: Token,
}
