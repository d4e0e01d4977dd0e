//! Screens of the client and the guard that keeps unconfigured users out of
//! the ones that need an API connection.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::core::config::{ConfigDefaults, ConfigStore};

pub const APP_TITLE: &str = "iChat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Chat,
    Settings,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::Home, Route::Chat, Route::Settings];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Chat => "/chat",
            Route::Settings => "/settings",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Route::Home => APP_TITLE,
            Route::Chat => "Chat - iChat",
            Route::Settings => "Settings - iChat",
        }
    }

    pub fn requires_config(self) -> bool {
        matches!(self, Route::Chat)
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = path.trim_end_matches('/');
        Route::ALL.into_iter().find(|route| {
            let candidate = route.path().trim_end_matches('/');
            candidate == trimmed
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed { title: &'static str },
    Redirect(Route),
}

pub struct RouteGuard {
    config: Arc<ConfigStore>,
    defaults: ConfigDefaults,
}

impl RouteGuard {
    pub fn new(config: Arc<ConfigStore>, defaults: ConfigDefaults) -> Self {
        Self { config, defaults }
    }

    /// Decide whether `route` may be shown. Routes that need an API
    /// connection redirect to settings until both the key and URL resolve;
    /// unreadable configuration counts as missing.
    pub fn check(&self, route: Route) -> Navigation {
        if route.requires_config() && !self.is_configured() {
            return Navigation::Redirect(Route::Settings);
        }
        Navigation::Proceed {
            title: route.title(),
        }
    }

    fn is_configured(&self) -> bool {
        match self.config.resolve(&self.defaults) {
            Ok(resolved) => resolved.is_configured(),
            Err(err) => {
                warn!("Failed to read configuration for route guard: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStore;

    fn guard_with(key: Option<&str>, url: Option<&str>, defaults: ConfigDefaults) -> RouteGuard {
        let config = ConfigStore::new(Arc::new(MemoryStore::new()));
        if let Some(key) = key {
            config.set_api_key(key).unwrap();
        }
        if let Some(url) = url {
            config.set_api_url(url).unwrap();
        }
        RouteGuard::new(Arc::new(config), defaults)
    }

    #[test]
    fn chat_redirects_to_settings_until_configured() {
        let guard = guard_with(Some("k"), None, ConfigDefaults::default());
        assert_eq!(guard.check(Route::Chat), Navigation::Redirect(Route::Settings));

        let guard = guard_with(
            Some("k"),
            Some("https://api.example.com"),
            ConfigDefaults::default(),
        );
        assert_eq!(
            guard.check(Route::Chat),
            Navigation::Proceed {
                title: "Chat - iChat"
            }
        );
    }

    #[test]
    fn defaults_satisfy_the_guard() {
        let defaults = ConfigDefaults::new(None, Some("https://api.example.com".to_string()));
        let guard = guard_with(Some("k"), None, defaults);
        assert!(matches!(guard.check(Route::Chat), Navigation::Proceed { .. }));
    }

    #[test]
    fn open_routes_always_proceed() {
        let guard = guard_with(None, None, ConfigDefaults::default());
        assert_eq!(guard.check(Route::Home), Navigation::Proceed { title: "iChat" });
        assert_eq!(
            guard.check(Route::Settings),
            Navigation::Proceed {
                title: "Settings - iChat"
            }
        );
    }

    #[test]
    fn routes_resolve_from_paths() {
        assert_eq!(Route::from_path("/"), Some(Route::Home));
        assert_eq!(Route::from_path("/chat/"), Some(Route::Chat));
        assert_eq!(Route::from_path("/settings"), Some(Route::Settings));
        assert_eq!(Route::from_path("/nowhere"), None);
    }
}
