// src/auth.rs
use log::{debug, info};
use url::Url;
use url::form_urlencoded;

use crate::config::BridgeConfig;

/// Something that can load a URL into the content surface.
pub trait Navigator {
    fn navigate(&self, url: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRedirect {
    pub target_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Navigated,
    Queued,
}

/// Turns auth redirects into navigation targets, holding at most one until a surface is attached.
pub struct AuthResolver {
    app_url: String,
    app_domain: String,
    redirect_scheme: String,
    redirect_host: String,
    handover_param: String,
    pending: Option<PendingRedirect>,
}

impl AuthResolver {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            app_url: config.app_url(),
            app_domain: config.app_domain.clone(),
            redirect_scheme: config.redirect_scheme.clone(),
            redirect_host: config.redirect_host.clone(),
            handover_param: config.handover_param.clone(),
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&PendingRedirect> {
        self.pending.as_ref()
    }

    pub fn redirect_scheme(&self) -> &str {
        &self.redirect_scheme
    }

    pub fn classify(&self, uri: &str) -> bool {
        let Ok(url) = Url::parse(uri) else {
            return false;
        };
        let host = url.host_str().unwrap_or_default();

        (url.scheme() == self.redirect_scheme && host == self.redirect_host)
            || host.contains(&self.app_domain)
    }

    pub fn resolve(&self, uri: &str) -> String {
        let token = Url::parse(uri).ok().and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| *key == *self.handover_param)
                .map(|(_, value)| value.into_owned())
        });

        match token {
            Some(token) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(&self.handover_param, &token)
                    .finish();
                format!("{}/auth/sync?{}", self.app_url.trim_end_matches('/'), query)
            }
            None => self.app_url.clone(),
        }
    }

    /// Navigates right away when a surface is attached, otherwise remembers the target.
    /// A newer redirect replaces any older pending one.
    pub fn deliver(&mut self, target_url: String, channel: Option<&dyn Navigator>) -> Delivery {
        match channel {
            Some(channel) => {
                info!("Navigating to {}", target_url);
                channel.navigate(&target_url);
                Delivery::Navigated
            }
            None => {
                debug!("No surface attached, queueing redirect to {}", target_url);
                self.pending = Some(PendingRedirect { target_url });
                Delivery::Queued
            }
        }
    }

    /// Consumes the pending redirect, if any.
    pub fn flush_pending(&mut self, channel: &dyn Navigator) -> Option<String> {
        let pending = self.pending.take()?;
        info!("Executing pending redirect to {}", pending.target_url);
        channel.navigate(&pending.target_url);
        Some(pending.target_url)
    }

    /// Shared entry point for launch URIs and intercepted navigations.
    /// Returns `None` when the URI is not an auth redirect.
    pub fn handle(&mut self, uri: &str, channel: Option<&dyn Navigator>) -> Option<Delivery> {
        if !self.classify(uri) {
            return None;
        }
        let target = self.resolve(uri);
        info!("Auth redirect detected! Target: {}", target);
        Some(self.deliver(target, channel))
    }
}

/// Converts `intent://HOST/PATH?Q#Intent;scheme=S;...;end` into `S://HOST/PATH?Q`.
pub fn parse_intent_uri(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix("intent://")?;
    let (data, fragment) = rest.split_once("#Intent;")?;
    let extras = fragment.strip_suffix(";end").or_else(|| fragment.strip_suffix("end"))?;

    let scheme = extras
        .split(';')
        .find_map(|extra| extra.strip_prefix("scheme="))
        .filter(|scheme| !scheme.is_empty())
        .unwrap_or("https");

    Some(format!("{scheme}://{data}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNavigator {
        urls: RefCell<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str) {
            self.urls.borrow_mut().push(url.to_string());
        }
    }

    fn resolver() -> AuthResolver {
        AuthResolver::new(&BridgeConfig::default())
    }

    #[test]
    fn classifies_private_scheme_and_app_domain() {
        let r = resolver();
        assert!(r.classify("lokaltu://auth?__clerk_handover_token=abc"));
        assert!(r.classify("lokaltu://auth"));
        assert!(r.classify("https://lokaltu.pl/sign-in"));
        assert!(r.classify("https://accounts.lokaltu.pl/callback"));
        assert!(!r.classify("lokaltu://settings"));
        assert!(!r.classify("https://example.com/auth"));
        assert!(!r.classify("not a uri"));
    }

    #[test]
    fn token_resolves_to_sync_page() {
        assert_eq!(
            resolver().resolve("lokaltu://auth?__clerk_handover_token=abc"),
            "https://lokaltu.pl/auth/sync?__clerk_handover_token=abc"
        );
    }

    #[test]
    fn missing_token_resolves_to_app_root() {
        assert_eq!(resolver().resolve("lokaltu://auth?foo=bar"), "https://lokaltu.pl/");
    }

    #[test]
    fn resolve_is_pure() {
        let r = resolver();
        let uri = "https://lokaltu.pl/x?__clerk_handover_token=t1&other=1";
        assert_eq!(r.resolve(uri), r.resolve(uri));
        assert!(r.pending().is_none());
    }

    #[test]
    fn queued_redirect_is_last_write_wins() {
        let mut r = resolver();
        assert_eq!(r.deliver("https://a".into(), None), Delivery::Queued);
        assert_eq!(r.deliver("https://b".into(), None), Delivery::Queued);
        assert_eq!(r.pending().unwrap().target_url, "https://b");
    }

    #[test]
    fn flush_delivers_exactly_once() {
        let mut r = resolver();
        let nav = RecordingNavigator::default();
        r.deliver("https://b".into(), None);

        assert_eq!(r.flush_pending(&nav).as_deref(), Some("https://b"));
        assert_eq!(r.flush_pending(&nav), None);
        assert_eq!(*nav.urls.borrow(), vec!["https://b".to_string()]);
        assert!(r.pending().is_none());
    }

    #[test]
    fn attached_channel_navigates_without_queueing() {
        let mut r = resolver();
        let nav = RecordingNavigator::default();
        let outcome = r.handle("lokaltu://auth?__clerk_handover_token=abc", Some(&nav));
        assert_eq!(outcome, Some(Delivery::Navigated));
        assert!(r.pending().is_none());
        assert_eq!(nav.urls.borrow().len(), 1);
    }

    #[test]
    fn unrelated_uri_is_not_handled() {
        let mut r = resolver();
        assert_eq!(r.handle("mailto:kontakt@example.com", None), None);
        assert!(r.pending().is_none());
    }

    #[test]
    fn parses_intent_uri_into_data_uri() {
        assert_eq!(
            parse_intent_uri(
                "intent://auth?__clerk_handover_token=abc#Intent;scheme=lokaltu;package=pl.lokaltu.android;end"
            )
            .as_deref(),
            Some("lokaltu://auth?__clerk_handover_token=abc")
        );
        assert_eq!(
            parse_intent_uri("intent://maps.example.com/place#Intent;package=x;end").as_deref(),
            Some("https://maps.example.com/place")
        );
    }

    #[test]
    fn rejects_incomplete_intent_uri() {
        assert_eq!(parse_intent_uri("intent://auth"), None);
        assert_eq!(parse_intent_uri("intent://auth#Intent;scheme=lokaltu"), None);
        assert_eq!(parse_intent_uri("https://lokaltu.pl"), None);
    }
}
