// src/navigation.rs
use log::{debug, error};

use crate::auth::{AuthResolver, Navigator, parse_intent_uri};

/// What the host should do with a navigation the surface attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the surface load it.
    Allow,
    /// Consumed as an auth redirect.
    Handled,
    /// Hand the data URI of an intent to the OS.
    LaunchExternal(String),
    /// OAuth provider pages refuse to run inside embedded views.
    OpenInBrowser(String),
    Block,
}

impl NavigationDecision {
    /// Whether the surface's own load must be cancelled.
    pub fn overrides_loading(&self) -> bool {
        !matches!(self, NavigationDecision::Allow)
    }
}

pub fn intercept(
    url: &str,
    resolver: &mut AuthResolver,
    channel: Option<&dyn Navigator>,
) -> NavigationDecision {
    debug!("Loading URL: {}", url);

    let private_prefix = format!("{}://", resolver.redirect_scheme());
    if url.starts_with(&private_prefix) {
        resolver.handle(url, channel);
        return NavigationDecision::Handled;
    }

    if url.starts_with("intent://") {
        match parse_intent_uri(url) {
            Some(data_uri) => {
                if resolver.handle(&data_uri, channel).is_some() {
                    return NavigationDecision::Handled;
                }
                return NavigationDecision::LaunchExternal(data_uri);
            }
            None => error!("Error parsing intent URL: {}", url),
        }
    }

    if is_oauth_provider(url) {
        return NavigationDecision::OpenInBrowser(url.to_string());
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        NavigationDecision::Allow
    } else {
        NavigationDecision::Block
    }
}

fn is_oauth_provider(url: &str) -> bool {
    url.contains("accounts.google.com")
        || url.contains("google.com/accounts")
        || (url.contains("clerk") && url.contains("oauth"))
}
