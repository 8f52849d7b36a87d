//! The fixed set of collections mirrored between the local cache and the
//! remote document store.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix shared by every key this engine writes to local storage.
pub const KEY_PREFIX: &str = "tedsai_";

/// A known collection name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionName {
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "menu")]
    Menu,
    #[serde(rename = "garden_products")]
    GardenProducts,
    #[serde(rename = "ia_services")]
    IaServices,
    #[serde(rename = "content_pages")]
    ContentPages,
    #[serde(rename = "reservations")]
    Reservations,
    #[serde(rename = "messages")]
    Messages,
    #[serde(rename = "media")]
    Media,
    #[serde(rename = "blog_posts")]
    BlogPosts,
    #[serde(rename = "blog_categories")]
    BlogCategories,
    #[serde(rename = "blog_comments")]
    BlogComments,
    #[serde(rename = "logs")]
    Logs,
    #[serde(rename = "chatSessions")]
    ChatSessions,
    #[serde(rename = "error_logs")]
    ErrorLogs,
}

impl CollectionName {
    /// Every collection, in sync order.
    pub const ALL: [CollectionName; 14] = [
        Self::Users,
        Self::Menu,
        Self::GardenProducts,
        Self::IaServices,
        Self::ContentPages,
        Self::Reservations,
        Self::Messages,
        Self::Media,
        Self::BlogPosts,
        Self::BlogCategories,
        Self::BlogComments,
        Self::Logs,
        Self::ChatSessions,
        Self::ErrorLogs,
    ];

    /// Name used for the remote collection path.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Menu => "menu",
            Self::GardenProducts => "garden_products",
            Self::IaServices => "ia_services",
            Self::ContentPages => "content_pages",
            Self::Reservations => "reservations",
            Self::Messages => "messages",
            Self::Media => "media",
            Self::BlogPosts => "blog_posts",
            Self::BlogCategories => "blog_categories",
            Self::BlogComments => "blog_comments",
            Self::Logs => "logs",
            Self::ChatSessions => "chatSessions",
            Self::ErrorLogs => "error_logs",
        }
    }

    /// Local storage key holding this collection's records.
    pub fn storage_key(self) -> String {
        format!("{KEY_PREFIX}{}", self.as_str())
    }

    /// Reverse of [`CollectionName::storage_key`].
    pub fn from_storage_key(key: &str) -> Option<Self> {
        key.strip_prefix(KEY_PREFIX)
            .and_then(|name| name.parse().ok())
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::UnknownCollection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys() {
        assert_eq!(CollectionName::Menu.storage_key(), "tedsai_menu");
        assert_eq!(
            CollectionName::ChatSessions.storage_key(),
            "tedsai_chatSessions"
        );
        assert_eq!(
            CollectionName::from_storage_key("tedsai_garden_products"),
            Some(CollectionName::GardenProducts)
        );
        assert_eq!(CollectionName::from_storage_key("tedsai_db_backup"), None);
        assert_eq!(CollectionName::from_storage_key("menu"), None);
    }

    #[test]
    fn parse_round_trips_every_name() {
        for name in CollectionName::ALL {
            assert_eq!(name.as_str().parse::<CollectionName>().unwrap(), name);
        }
    }

    #[test]
    fn unknown_name() {
        let err = "recipes".parse::<CollectionName>().unwrap_err();
        assert!(matches!(err, Error::UnknownCollection(name) if name == "recipes"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&CollectionName::BlogPosts).unwrap();
        assert_eq!(json, "\"blog_posts\"");
        let parsed: CollectionName = serde_json::from_str("\"chatSessions\"").unwrap();
        assert_eq!(parsed, CollectionName::ChatSessions);
    }
}
