use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionSource {
    Instagram,
    Facebook,
    Google,
    Website,
    Recommendation,
    Advertisement,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireAcquisitionSource {
    Instagram,
    Google,
    Recommendation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("acquisition source {0:?} has no wire mapping")]
pub struct UnmappedAcquisitionSource(pub AcquisitionSource);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSourceMapping {
    entries: BTreeMap<AcquisitionSource, WireAcquisitionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback: Option<WireAcquisitionSource>,
}

impl Default for AcquisitionSourceMapping {
    /// One-to-one entries only; `Facebook`, `Website` and `Advertisement`
    /// stay unmapped until configured.
    fn default() -> Self {
        Self::empty()
            .with_entry(AcquisitionSource::Instagram, WireAcquisitionSource::Instagram)
            .with_entry(AcquisitionSource::Google, WireAcquisitionSource::Google)
            .with_entry(
                AcquisitionSource::Recommendation,
                WireAcquisitionSource::Recommendation,
            )
            .with_entry(AcquisitionSource::Other, WireAcquisitionSource::Other)
    }
}

impl AcquisitionSourceMapping {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            fallback: None,
        }
    }

    pub fn with_entry(mut self, source: AcquisitionSource, wire: WireAcquisitionSource) -> Self {
        self.entries.insert(source, wire);
        self
    }

    pub fn with_fallback(mut self, wire: WireAcquisitionSource) -> Self {
        self.fallback = Some(wire);
        self
    }

    pub fn fallback(&self) -> Option<WireAcquisitionSource> {
        self.fallback
    }

    pub fn is_explicit(&self, source: AcquisitionSource) -> bool {
        self.entries.contains_key(&source)
    }

    pub fn to_wire(
        &self,
        source: AcquisitionSource,
    ) -> Result<WireAcquisitionSource, UnmappedAcquisitionSource> {
        self.entries
            .get(&source)
            .copied()
            .or(self.fallback)
            .ok_or(UnmappedAcquisitionSource(source))
    }

    /// Sources that map onto `wire`. More than one entry means the wire value
    /// is ambiguous and cannot be decoded back.
    pub fn sources_for(&self, wire: WireAcquisitionSource) -> Vec<AcquisitionSource> {
        self.entries
            .iter()
            .filter(|(_, mapped)| **mapped == wire)
            .map(|(source, _)| *source)
            .collect()
    }

    pub fn from_wire(&self, wire: WireAcquisitionSource) -> Option<AcquisitionSource> {
        match self.sources_for(wire).as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_rejects_channels_without_wire_value() {
        let mapping = AcquisitionSourceMapping::default();
        assert_eq!(
            mapping.to_wire(AcquisitionSource::Facebook),
            Err(UnmappedAcquisitionSource(AcquisitionSource::Facebook))
        );
        assert_eq!(
            mapping.to_wire(AcquisitionSource::Instagram),
            Ok(WireAcquisitionSource::Instagram)
        );
    }

    #[test]
    fn fallback_is_opt_in() {
        let mapping = AcquisitionSourceMapping::default().with_fallback(WireAcquisitionSource::Other);
        assert_eq!(
            mapping.to_wire(AcquisitionSource::Website),
            Ok(WireAcquisitionSource::Other)
        );
        assert!(!mapping.is_explicit(AcquisitionSource::Website));
    }

    #[test]
    fn many_to_one_entries_do_not_decode() {
        let mapping = AcquisitionSourceMapping::default()
            .with_entry(AcquisitionSource::Facebook, WireAcquisitionSource::Other);
        assert_eq!(mapping.from_wire(WireAcquisitionSource::Other), None);
        assert_eq!(
            mapping.from_wire(WireAcquisitionSource::Google),
            Some(AcquisitionSource::Google)
        );
    }

    #[test]
    fn wire_values_use_upper_case() {
        let encoded = serde_json::to_string(&WireAcquisitionSource::Recommendation).unwrap();
        assert_eq!(encoded, "\"RECOMMENDATION\"");
    }
}
