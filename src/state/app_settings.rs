use diamond_api::client::DEFAULT_BASE_URL;
use diamond_api::{MatchId, Side};
use log::LevelFilter;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub full_screen: bool,
    pub log_level: Option<LevelFilter>,
    pub api_url: String,
    pub match_id: Option<MatchId>,
    pub chat_url: Option<String>,
    pub affiliation: Side,
    pub user_id: Option<String>,
    pub muted: bool,
    pub cue_length: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            full_screen: false,
            log_level: None,
            api_url: DEFAULT_BASE_URL.to_string(),
            match_id: None,
            chat_url: None,
            affiliation: Side::Home,
            user_id: None,
            muted: false,
            cue_length: Duration::from_secs(4),
        }
    }
}

impl AppSettings {
    /// Read `DIAMONDCAST_*` variables. A positional match id on the command
    /// line wins over the environment.
    pub fn load(cli_match: Option<MatchId>) -> Self {
        Self::from_lookup(|key| env::var(key).ok(), cli_match)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, cli_match: Option<MatchId>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            full_screen: false,
            log_level: var("DIAMONDCAST_LOG").and_then(|v| v.parse().ok()),
            api_url: var("DIAMONDCAST_API").unwrap_or(defaults.api_url),
            match_id: cli_match.or_else(|| var("DIAMONDCAST_MATCH").and_then(|v| v.parse().ok())),
            chat_url: var("DIAMONDCAST_CHAT_WS"),
            affiliation: var("DIAMONDCAST_TEAM")
                .and_then(|v| Side::parse(&v))
                .unwrap_or(defaults.affiliation),
            user_id: var("DIAMONDCAST_USER_ID"),
            muted: var("DIAMONDCAST_MUTED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.muted),
            cue_length: var("DIAMONDCAST_CUE_SECS")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.cue_length),
        }
    }

    /// Commentary endpoint for a match: the explicit override, or the API
    /// host's `/api/chat` socket.
    pub fn commentary_url(&self, match_id: MatchId) -> String {
        if let Some(url) = &self.chat_url {
            return url.clone();
        }
        let (scheme, rest) = match self.api_url.split_once("://") {
            Some(("https", rest)) => ("wss", rest),
            Some((_, rest)) => ("ws", rest),
            None => ("ws", self.api_url.as_str()),
        };
        let host = rest.split('/').next().unwrap_or(rest);
        format!("{scheme}://{host}/api/chat?simulationId={match_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], cli: Option<MatchId>) -> AppSettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppSettings::from_lookup(|key| map.get(key).cloned(), cli)
    }

    #[test]
    fn defaults_without_environment() {
        let settings = load(&[], None);
        assert_eq!(settings.api_url, "http://127.0.0.1:8080");
        assert_eq!(settings.affiliation, Side::Home);
        assert!(settings.user_id.is_none());
        assert!(settings.match_id.is_none());
    }

    #[test]
    fn cli_match_beats_environment() {
        let settings = load(&[("DIAMONDCAST_MATCH", "4")], Some(9));
        assert_eq!(settings.match_id, Some(9));
        assert_eq!(load(&[("DIAMONDCAST_MATCH", "4")], None).match_id, Some(4));
    }

    #[test]
    fn environment_overrides() {
        let settings = load(
            &[
                ("DIAMONDCAST_TEAM", "away"),
                ("DIAMONDCAST_USER_ID", "77"),
                ("DIAMONDCAST_MUTED", "true"),
                ("DIAMONDCAST_LOG", "debug"),
                ("DIAMONDCAST_CUE_SECS", "1.5"),
            ],
            None,
        );
        assert_eq!(settings.affiliation, Side::Away);
        assert_eq!(settings.user_id.as_deref(), Some("77"));
        assert!(settings.muted);
        assert_eq!(settings.log_level, Some(LevelFilter::Debug));
        assert_eq!(settings.cue_length, Duration::from_millis(1500));
    }

    #[test]
    fn commentary_url_follows_api_host() {
        let settings = load(&[("DIAMONDCAST_API", "https://ball.example.com/")], None);
        assert_eq!(
            settings.commentary_url(12),
            "wss://ball.example.com/api/chat?simulationId=12"
        );
        let local = load(&[], None);
        assert_eq!(
            local.commentary_url(3),
            "ws://127.0.0.1:8080/api/chat?simulationId=3"
        );
    }
}
