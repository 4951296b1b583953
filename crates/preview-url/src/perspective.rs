//! Content perspectives requested for a preview session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PreviewUrlError;

/// Which content a preview should render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Perspective {
    /// Drafts layered over published content
    Drafts,
    /// Published content only
    Published,
    /// Every document, drafts and versions included
    Raw,
    /// Legacy name of [`Perspective::Drafts`]
    PreviewDrafts,
    /// Named releases layered in order, highest priority first
    Stack(Vec<String>),
}

impl Perspective {
    /// Wire encoding, release stacks joined with commas.
    pub fn encode(&self) -> String {
        match self {
            Perspective::Drafts => "drafts".to_string(),
            Perspective::Published => "published".to_string(),
            Perspective::Raw => "raw".to_string(),
            Perspective::PreviewDrafts => "previewDrafts".to_string(),
            Perspective::Stack(releases) => releases.join(","),
        }
    }
}

impl Default for Perspective {
    fn default() -> Self {
        Perspective::Drafts
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Perspective {
    type Err = PreviewUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(PreviewUrlError::Config("perspective must not be empty".to_string())),
            "drafts" => Ok(Perspective::Drafts),
            "published" => Ok(Perspective::Published),
            "raw" => Ok(Perspective::Raw),
            "previewDrafts" => Ok(Perspective::PreviewDrafts),
            other => {
                let releases: Vec<String> = other
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect();
                if releases.is_empty() {
                    return Err(PreviewUrlError::Config(format!(
                        "invalid perspective {:?}",
                        s
                    )));
                }
                Ok(Perspective::Stack(releases))
            }
        }
    }
}

impl TryFrom<String> for Perspective {
    type Error = PreviewUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Perspective> for String {
    fn from(value: Perspective) -> Self {
        value.encode()
    }
}

impl<S: Into<String>> FromIterator<S> for Perspective {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Perspective::Stack(iter.into_iter().map(Into::into).collect())
    }
}
