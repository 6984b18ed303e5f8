//! Chinese carrier classification from ASN organization names

use serde::{Deserialize, Serialize};
use std::fmt;

/// Carrier a Chinese network belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IspLabel {
    /// China Education and Research Network
    Cernet,
    /// China Mobile
    Mobile,
    /// China Unicom
    Unicom,
    /// China Telecom
    Telecom,
}

impl IspLabel {
    /// Short label shown in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            IspLabel::Cernet => "CERNET",
            IspLabel::Mobile => "CM",
            IspLabel::Unicom => "CU",
            IspLabel::Telecom => "CT",
        }
    }
}

impl fmt::Display for IspLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keywords per carrier, tested in this order; the first hit wins
const KEYWORDS: &[(IspLabel, &[&str])] = &[
    (
        IspLabel::Cernet,
        &[
            "cernet",
            "education",
            "research",
            "university",
            "academy",
            "computer network information center",
        ],
    ),
    (IspLabel::Mobile, &["mobile", "cmnet", "tietong", "railway"]),
    (IspLabel::Unicom, &["unicom", "cnc", "china169", "netcom"]),
    (
        IspLabel::Telecom,
        &["chinanet", "telecom", "no.31,jin-rong", "inter-exchange", "ct"],
    ),
];

/// Classify a network by its ASN organization name
///
/// Only networks located in China get a label. Matching is a
/// case-insensitive substring search, so short keywords such as "ct" also
/// match inside longer words.
pub fn classify(asn_organization: Option<&str>, country_code: &str) -> Option<IspLabel> {
    if country_code != "CN" {
        return None;
    }
    let organization = asn_organization?.to_lowercase();

    KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| organization.contains(k)))
        .map(|(label, _)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_keywords() {
        assert_eq!(
            classify(Some("CHINANET-BACKBONE"), "CN"),
            Some(IspLabel::Telecom)
        );
        assert_eq!(
            classify(Some("China Mobile Communications Group Co., Ltd."), "CN"),
            Some(IspLabel::Mobile)
        );
        assert_eq!(
            classify(Some("CHINA UNICOM China169 Backbone"), "CN"),
            Some(IspLabel::Unicom)
        );
        assert_eq!(
            classify(Some("China Education and Research Network Center"), "CN"),
            Some(IspLabel::Cernet)
        );
    }

    #[test]
    fn test_priority_order() {
        // Contains both "education" and "mobile"
        assert_eq!(
            classify(Some("Mobile Education Network"), "CN"),
            Some(IspLabel::Cernet)
        );
        // "unicom" outranks the "ct" substring in "connect"
        assert_eq!(classify(Some("Unicom Connect"), "CN"), Some(IspLabel::Unicom));
    }

    #[test]
    fn test_short_keyword_matches_substring() {
        assert_eq!(classify(Some("Direct Peering"), "CN"), Some(IspLabel::Telecom));
    }

    #[test]
    fn test_non_cn_is_never_labelled() {
        assert_eq!(classify(Some("China Mobile"), "US"), None);
        assert_eq!(classify(Some("CHINANET"), ""), None);
        assert_eq!(classify(Some("chinanet"), "cn"), None);
    }

    #[test]
    fn test_missing_or_unknown_organization() {
        assert_eq!(classify(None, "CN"), None);
        assert_eq!(classify(Some(""), "CN"), None);
        assert_eq!(classify(Some("Alibaba"), "CN"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(IspLabel::Cernet.to_string(), "CERNET");
        assert_eq!(IspLabel::Mobile.to_string(), "CM");
        assert_eq!(IspLabel::Unicom.to_string(), "CU");
        assert_eq!(IspLabel::Telecom.to_string(), "CT");
    }
}
