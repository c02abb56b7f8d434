use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown service '{0}'")]
pub struct UnknownService(pub String);

/// Platform services reachable through the API client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    AccountPublic,
    AffiliatePublic,
    CatalogPublic,
    EpicGames,
    EventsPublic,
    FortniteContentWebsite,
    FortnitePublic,
    FriendsPublic,
    LauncherPublic,
    Party,
    PersonaPublic,
}

impl Service {
    pub const ALL: [Service; 11] = [
        Service::AccountPublic,
        Service::AffiliatePublic,
        Service::CatalogPublic,
        Service::EpicGames,
        Service::EventsPublic,
        Service::FortniteContentWebsite,
        Service::FortnitePublic,
        Service::FriendsPublic,
        Service::LauncherPublic,
        Service::Party,
        Service::PersonaPublic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountPublic => "account",
            Self::AffiliatePublic => "affiliate",
            Self::CatalogPublic => "catalog",
            Self::EpicGames => "epic-games",
            Self::EventsPublic => "events",
            Self::FortniteContentWebsite => "content",
            Self::FortnitePublic => "fortnite",
            Self::FriendsPublic => "friends",
            Self::LauncherPublic => "launcher",
            Self::Party => "party",
            Self::PersonaPublic => "persona",
        }
    }

    pub fn base_url_str(&self) -> &'static str {
        match self {
            Self::AccountPublic => "https://account-public-service-prod03.ol.epicgames.com/",
            Self::AffiliatePublic => "https://affiliate-public-service-prod.ol.epicgames.com/",
            Self::CatalogPublic => "https://catalog-public-service-prod06.ol.epicgames.com/",
            Self::EpicGames => "https://www.epicgames.com/",
            Self::EventsPublic => "https://events-public-service-live.ol.epicgames.com/",
            Self::FortniteContentWebsite => "https://fortnitecontent-website-prod07.ol.epicgames.com/",
            Self::FortnitePublic => "https://fortnite-public-service-prod11.ol.epicgames.com/",
            Self::FriendsPublic => "https://friends-public-service-prod.ol.epicgames.com/",
            Self::LauncherPublic => "https://launcher-public-service-prod06.ol.epicgames.com/",
            Self::Party => "https://party-service-prod.ol.epicgames.com/",
            Self::PersonaPublic => "https://persona-public-service-prod06.ol.epicgames.com/",
        }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(self.base_url_str()).expect("valid service base URL")
    }

    /// Whether the session must be verified (and refreshed) before calling this service.
    ///
    /// The account and web login services are used by the login flow itself.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Self::AccountPublic | Self::EpicGames)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|service| service.name() == wanted)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_names() {
        for service in Service::ALL {
            assert_eq!(service.name().parse::<Service>().unwrap(), service);
        }
        assert_eq!("Friends".parse::<Service>().unwrap(), Service::FriendsPublic);
        assert_eq!(
            "nope".parse::<Service>(),
            Err(UnknownService("nope".to_string()))
        );
    }

    #[test]
    fn test_login_services_skip_verification() {
        assert!(!Service::AccountPublic.requires_session());
        assert!(!Service::EpicGames.requires_session());
        assert!(Service::FriendsPublic.requires_session());
        assert!(Service::Party.requires_session());
    }

    #[test]
    fn test_base_urls_parse() {
        for service in Service::ALL {
            assert!(service.base_url().as_str().ends_with('/'));
        }
    }
}
