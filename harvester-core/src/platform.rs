use harvester_scanner::PlatformHint;
use url::Url;

/// Known site families, matched against the target host.
/// A pattern matches the host itself or any subdomain of it.
const KNOWN_PLATFORMS: &[(&str, PlatformHint)] = &[
    ("caleprocure.ca.gov", PlatformHint::CalEProcure),
    ("bonfirehub.com", PlatformHint::Bonfire),
    ("bonfirehub.ca", PlatformHint::Bonfire),
    ("planetbids.com", PlatformHint::PlanetBids),
    ("bidnetdirect.com", PlatformHint::BidNet),
    ("sam.gov", PlatformHint::SamGov),
];

/// Host pattern to platform hint mapping.
#[derive(Debug, Clone)]
pub struct PlatformTable {
    entries: Vec<(String, PlatformHint)>,
}

impl PlatformTable {
    pub fn new(entries: Vec<(String, PlatformHint)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, PlatformHint)] {
        &self.entries
    }

    /// First matching entry wins; unknown or unparsable targets are generic.
    pub fn hint_for(&self, target_url: &str) -> PlatformHint {
        let Some(host) = Url::parse(target_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        else {
            return PlatformHint::Generic;
        };

        self.entries
            .iter()
            .find(|(pattern, _)| host == *pattern || host.ends_with(&format!(".{}", pattern)))
            .map(|(_, hint)| *hint)
            .unwrap_or(PlatformHint::Generic)
    }
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::new(
            KNOWN_PLATFORMS
                .iter()
                .map(|(pattern, hint)| (pattern.to_string(), *hint))
                .collect(),
        )
    }
}
