//! Rendition kinds, descriptors and metadata extraction policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AssetError;

/// Closed set of rendition kinds the service can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RenditionKind {
    #[serde(rename = "fullsize")]
    FullSize,
    #[serde(rename = "panorama")]
    Panorama,
    #[serde(rename = "2048")]
    Image2048,
    #[serde(rename = "1280")]
    Image1280,
    #[serde(rename = "640")]
    Image640,
    #[serde(rename = "thumbnail2x")]
    Thumbnail2x,
}

impl RenditionKind {
    pub const ALL: [RenditionKind; 6] = [
        RenditionKind::FullSize,
        RenditionKind::Panorama,
        RenditionKind::Image2048,
        RenditionKind::Image1280,
        RenditionKind::Image640,
        RenditionKind::Thumbnail2x,
    ];

    /// Renditions generated automatically for a new image:
    /// preview (2048), standard (1280) and the 2x thumbnail.
    pub const AUTO: [RenditionKind; 3] = [
        RenditionKind::Image2048,
        RenditionKind::Image1280,
        RenditionKind::Thumbnail2x,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RenditionKind::FullSize => "fullsize",
            RenditionKind::Panorama => "panorama",
            RenditionKind::Image2048 => "2048",
            RenditionKind::Image1280 => "1280",
            RenditionKind::Image640 => "640",
            RenditionKind::Thumbnail2x => "thumbnail2x",
        }
    }
}

impl fmt::Display for RenditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenditionKind {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenditionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AssetError::Decode(format!("unknown rendition kind: {s:?}")))
    }
}

/// Whether a single metadata field is extracted into or suppressed from a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldRule {
    #[default]
    Extract,
    Suppress,
}

/// Per-field rules for [`MetadataPolicy::Selective`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetadataRules {
    pub caption: FieldRule,
    pub geometry: FieldRule,
    pub location: FieldRule,
    pub xmp: FieldRule,
}

/// Metadata extraction applied when a rendition is generated.
///
/// On the wire this is a list of directives (`extract_all`, `extract_none`,
/// `extract_caption`, `suppress_location`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub enum MetadataPolicy {
    ExtractAll,
    #[default]
    ExtractNone,
    Selective(MetadataRules),
}

const FIELDS: [&str; 4] = ["caption", "geometry", "location", "xmp"];

impl MetadataPolicy {
    /// Policy sent for a generation request. Only a request for exactly the
    /// full-size rendition asks for metadata extraction; any other set gets
    /// the service default.
    pub fn for_kinds(kinds: &[RenditionKind]) -> Self {
        if kinds == [RenditionKind::FullSize] {
            MetadataPolicy::ExtractAll
        } else {
            MetadataPolicy::ExtractNone
        }
    }

    pub fn directives(&self) -> Vec<String> {
        match self {
            MetadataPolicy::ExtractAll => vec!["extract_all".to_string()],
            MetadataPolicy::ExtractNone => vec!["extract_none".to_string()],
            MetadataPolicy::Selective(rules) => {
                let values = [rules.caption, rules.geometry, rules.location, rules.xmp];
                FIELDS
                    .iter()
                    .zip(values)
                    .map(|(field, rule)| match rule {
                        FieldRule::Extract => format!("extract_{field}"),
                        FieldRule::Suppress => format!("suppress_{field}"),
                    })
                    .collect()
            }
        }
    }

    /// Parses wire directives. An empty list means the service default (`ExtractNone`);
    /// fields not named in a selective list are extracted.
    pub fn from_directives<S: AsRef<str>>(directives: &[S]) -> Result<Self, AssetError> {
        match directives {
            [] => return Ok(MetadataPolicy::ExtractNone),
            [one] if one.as_ref() == "extract_all" => return Ok(MetadataPolicy::ExtractAll),
            [one] if one.as_ref() == "extract_none" => return Ok(MetadataPolicy::ExtractNone),
            _ => {}
        }

        let mut rules = MetadataRules::default();
        for directive in directives {
            let directive = directive.as_ref();
            let (rule, field) = if let Some(field) = directive.strip_prefix("extract_") {
                (FieldRule::Extract, field)
            } else if let Some(field) = directive.strip_prefix("suppress_") {
                (FieldRule::Suppress, field)
            } else {
                return Err(AssetError::Decode(format!(
                    "unknown metadata directive: {directive:?}"
                )));
            };
            let slot = match field {
                "caption" => &mut rules.caption,
                "geometry" => &mut rules.geometry,
                "location" => &mut rules.location,
                "xmp" => &mut rules.xmp,
                _ => {
                    return Err(AssetError::Decode(format!(
                        "unknown metadata directive: {directive:?}"
                    )))
                }
            };
            *slot = rule;
        }
        Ok(MetadataPolicy::Selective(rules))
    }
}

impl From<MetadataPolicy> for Vec<String> {
    fn from(policy: MetadataPolicy) -> Self {
        policy.directives()
    }
}

impl TryFrom<Vec<String>> for MetadataPolicy {
    type Error = AssetError;

    fn try_from(directives: Vec<String>) -> Result<Self, Self::Error> {
        MetadataPolicy::from_directives(directives.as_slice())
    }
}

/// One rendition of an asset as known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionDescriptor {
    pub kind: RenditionKind,
    /// Size in bytes (0 when not yet generated).
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub metadata: MetadataPolicy,
}

impl RenditionDescriptor {
    pub fn new(kind: RenditionKind) -> Self {
        Self {
            kind,
            size: 0,
            available: false,
            metadata: MetadataPolicy::default(),
        }
    }
}
