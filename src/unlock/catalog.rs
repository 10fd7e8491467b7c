use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;

/// What a service answered.
pub struct Probe<'a> {
    pub status: StatusCode,
    pub final_url: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Reachable, with the region the service reported when it did.
    Unlocked(Option<String>),
    Blocked,
}

impl Verdict {
    pub fn entry(&self, name: &str) -> Option<String> {
        match self {
            Verdict::Unlocked(Some(region)) => Some(format!("{}:{}", name, region)),
            Verdict::Unlocked(None) => Some(name.to_string()),
            Verdict::Blocked => None,
        }
    }
}

pub struct Service {
    pub name: &'static str,
    pub url: &'static str,
    pub detect: fn(&Probe<'_>) -> Verdict,
}

pub fn services() -> Vec<Service> {
    vec![
        Service {
            name: "Netflix",
            url: "https://www.netflix.com/title/81280792",
            detect: netflix,
        },
        Service {
            name: "YouTube",
            url: "https://www.youtube.com/premium",
            detect: youtube_premium,
        },
        Service {
            name: "Disney+",
            url: "https://www.disneyplus.com/",
            detect: disney_plus,
        },
        Service {
            name: "ChatGPT",
            url: "https://chatgpt.com/cdn-cgi/trace",
            detect: chatgpt,
        },
        Service {
            name: "TikTok",
            url: "https://www.tiktok.com/",
            detect: tiktok,
        },
    ]
}

/// Countries where OpenAI refuses service.
const CHATGPT_UNSUPPORTED: &[&str] = &["CN", "HK", "MO", "RU", "BY", "IR", "KP", "SY", "CU"];

static NETFLIX_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"netflix\.com/([a-zA-Z]{2})(?:-[a-zA-Z]{2})?/title").unwrap()
});
static COUNTRY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""countryCode":"([A-Z]{2})""#).unwrap());
static REGION_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""region"\s*:\s*"([A-Z]{2})""#).unwrap());
static TRACE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^loc=([A-Z]{2})$").unwrap());

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

fn netflix(probe: &Probe<'_>) -> Verdict {
    if probe.status != StatusCode::OK {
        return Verdict::Blocked;
    }
    Verdict::Unlocked(capture(&NETFLIX_REGION, probe.final_url))
}

fn youtube_premium(probe: &Probe<'_>) -> Verdict {
    if !probe.status.is_success()
        || probe.body.contains("Premium is not available in your country")
    {
        return Verdict::Blocked;
    }
    Verdict::Unlocked(capture(&COUNTRY_CODE, probe.body))
}

fn disney_plus(probe: &Probe<'_>) -> Verdict {
    if !probe.status.is_success() || probe.final_url.contains("unavailable") {
        return Verdict::Blocked;
    }
    Verdict::Unlocked(capture(&REGION_FIELD, probe.body))
}

fn chatgpt(probe: &Probe<'_>) -> Verdict {
    if !probe.status.is_success() {
        return Verdict::Blocked;
    }
    match capture(&TRACE_LOCATION, probe.body) {
        Some(loc) if CHATGPT_UNSUPPORTED.contains(&loc.as_str()) => Verdict::Blocked,
        Some(loc) => Verdict::Unlocked(Some(loc)),
        None => Verdict::Blocked,
    }
}

fn tiktok(probe: &Probe<'_>) -> Verdict {
    if !probe.status.is_success() {
        return Verdict::Blocked;
    }
    Verdict::Unlocked(capture(&REGION_FIELD, probe.body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe<'a>(status: u16, final_url: &'a str, body: &'a str) -> Probe<'a> {
        Probe {
            status: StatusCode::from_u16(status).unwrap(),
            final_url,
            body,
        }
    }

    #[test]
    fn netflix_region_comes_from_redirect() {
        let verdict = netflix(&probe(200, "https://www.netflix.com/jp-en/title/81280792", ""));
        assert_eq!(verdict, Verdict::Unlocked(Some("JP".into())));
        assert_eq!(netflix(&probe(404, "https://www.netflix.com/title/81280792", "")), Verdict::Blocked);
    }

    #[test]
    fn chatgpt_rejects_unsupported_regions() {
        let trace = "fl=1\nip=1.1.1.1\nloc=HK\nwarp=off\n";
        assert_eq!(chatgpt(&probe(200, "", trace)), Verdict::Blocked);

        let trace = "fl=1\nloc=SG\n";
        assert_eq!(chatgpt(&probe(200, "", trace)), Verdict::Unlocked(Some("SG".into())));
    }

    #[test]
    fn youtube_refusal_is_blocked() {
        let body = "<p>YouTube Premium is not available in your country</p>";
        assert_eq!(youtube_premium(&probe(200, "", body)), Verdict::Blocked);

        let body = r#"{"countryCode":"US"}"#;
        assert_eq!(youtube_premium(&probe(200, "", body)), Verdict::Unlocked(Some("US".into())));
    }

    #[test]
    fn patterns_compile_once_and_are_reused() {
        for re in [&NETFLIX_REGION, &COUNTRY_CODE, &REGION_FIELD, &TRACE_LOCATION] {
            let first: *const Regex = LazyLock::force(re);
            let second: *const Regex = LazyLock::force(re);
            assert_eq!(first, second);
        }

        let body = r#"{"sdk":{"region" : "JP"}}"#;
        assert_eq!(disney_plus(&probe(200, "https://www.disneyplus.com/", body)), Verdict::Unlocked(Some("JP".into())));
        assert_eq!(tiktok(&probe(200, "", body)), Verdict::Unlocked(Some("JP".into())));
        assert_eq!(disney_plus(&probe(200, "https://www.disneyplus.com/unavailable", body)), Verdict::Blocked);
    }

    #[test]
    fn entries_render_with_optional_region() {
        assert_eq!(Verdict::Unlocked(Some("US".into())).entry("Netflix").as_deref(), Some("Netflix:US"));
        assert_eq!(Verdict::Unlocked(None).entry("TikTok").as_deref(), Some("TikTok"));
        assert_eq!(Verdict::Blocked.entry("Disney+"), None);
    }
}
