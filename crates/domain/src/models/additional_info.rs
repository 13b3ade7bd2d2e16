//! Non-field metadata columns that can be added to an export.

use serde::{Deserialize, Serialize};

/// Additional information column, in its fixed declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalInfo {
    EntryId,
    Date,
    Notes,
    Viewed,
    Starred,
    UserAgent,
    IpAddress,
    UserUuid,
    Geodata,
    #[serde(rename = "pstatus")]
    PaymentStatus,
    #[serde(rename = "pginfo")]
    PaymentGatewayInfo,
    /// Expands into one column per deleted field instead of a column of its own.
    #[serde(rename = "del_fields")]
    DeletedFields,
}

impl AdditionalInfo {
    /// Every additional information column in declared order.
    pub const ALL: [AdditionalInfo; 12] = [
        AdditionalInfo::EntryId,
        AdditionalInfo::Date,
        AdditionalInfo::Notes,
        AdditionalInfo::Viewed,
        AdditionalInfo::Starred,
        AdditionalInfo::UserAgent,
        AdditionalInfo::IpAddress,
        AdditionalInfo::UserUuid,
        AdditionalInfo::Geodata,
        AdditionalInfo::PaymentStatus,
        AdditionalInfo::PaymentGatewayInfo,
        AdditionalInfo::DeletedFields,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            AdditionalInfo::EntryId => "entry_id",
            AdditionalInfo::Date => "date",
            AdditionalInfo::Notes => "notes",
            AdditionalInfo::Viewed => "viewed",
            AdditionalInfo::Starred => "starred",
            AdditionalInfo::UserAgent => "user_agent",
            AdditionalInfo::IpAddress => "ip_address",
            AdditionalInfo::UserUuid => "user_uuid",
            AdditionalInfo::Geodata => "geodata",
            AdditionalInfo::PaymentStatus => "pstatus",
            AdditionalInfo::PaymentGatewayInfo => "pginfo",
            AdditionalInfo::DeletedFields => "del_fields",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AdditionalInfo::EntryId => "Entry ID",
            AdditionalInfo::Date => "Entry Date",
            AdditionalInfo::Notes => "Entry Notes",
            AdditionalInfo::Viewed => "Viewed",
            AdditionalInfo::Starred => "Starred",
            AdditionalInfo::UserAgent => "User Agent",
            AdditionalInfo::IpAddress => "User IP",
            AdditionalInfo::UserUuid => "Unique Generated User ID",
            AdditionalInfo::Geodata => "Geolocation Details",
            AdditionalInfo::PaymentStatus => "Payment Status",
            AdditionalInfo::PaymentGatewayInfo => "Payment Gateway Information",
            AdditionalInfo::DeletedFields => "Include data of previously deleted fields",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|info| info.slug() == slug)
    }

    /// Parses user selected slugs, dropping unknown ones and duplicates while
    /// keeping the order of first appearance.
    pub fn parse_selection<S: AsRef<str>>(slugs: &[S]) -> Vec<Self> {
        let mut selection = Vec::new();
        for info in slugs.iter().filter_map(|s| Self::from_slug(s.as_ref())) {
            if !selection.contains(&info) {
                selection.push(info);
            }
        }
        selection
    }
}

impl std::fmt::Display for AdditionalInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_roundtrip() {
        for info in AdditionalInfo::ALL {
            assert_eq!(AdditionalInfo::from_slug(info.slug()), Some(info));
        }
        assert_eq!(AdditionalInfo::from_slug("bogus"), None);
    }

    #[test]
    fn test_serde_uses_slugs() {
        let json = serde_json::to_string(&AdditionalInfo::PaymentGatewayInfo).unwrap();
        assert_eq!(json, "\"pginfo\"");
        let parsed: AdditionalInfo = serde_json::from_str("\"ip_address\"").unwrap();
        assert_eq!(parsed, AdditionalInfo::IpAddress);
    }

    #[test]
    fn test_labels() {
        assert_eq!(AdditionalInfo::IpAddress.label(), "User IP");
        assert_eq!(AdditionalInfo::UserUuid.label(), "Unique Generated User ID");
    }

    #[test]
    fn test_parse_selection() {
        let selection = AdditionalInfo::parse_selection(&["notes", "bogus", "entry_id", "notes"]);
        assert_eq!(
            selection,
            vec![AdditionalInfo::Notes, AdditionalInfo::EntryId]
        );
    }
}
