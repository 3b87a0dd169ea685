//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is done by the robotstxt crate's `DefaultMatcher`.
//! The crate's tokenizer is also used to pull out the `Crawl-delay` and
//! `Sitemap` lines, which the matcher does not expose.

use robotstxt::{parse_robotstxt, DefaultMatcher, RobotsParseHandler};
use std::time::Duration;
use url::Url;

/// Parsed robots.txt data for one user agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// Raw robots.txt content (empty means allow all)
    content: String,
    /// Product token matched against `User-agent` lines
    agent: String,
    crawl_delay: Option<Duration>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Loads robots.txt content for `user_agent`
    ///
    /// Only the product token of the user agent is matched
    /// (`ripple-crawl/0.1 (+https://...)` matches `User-agent: ripple-crawl`).
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt body
    /// * `user_agent` - The crawler's User-Agent string
    pub fn load(content: &str, user_agent: &str) -> Self {
        let agent = product_token(user_agent).to_string();

        let mut collector = DirectiveCollector::default();
        parse_robotstxt(content, &mut collector);

        Self {
            content: content.to_string(),
            crawl_delay: collector.crawl_delay_for(&agent),
            sitemaps: collector.sitemaps,
            agent,
        }
    }

    /// Rules that allow everything
    ///
    /// This is used when robots.txt cannot be fetched.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Checks whether a URL may be fetched
    pub fn is_allowed(&self, url: &Url) -> bool {
        self.is_path_allowed(url.as_str())
    }

    /// Checks a raw path (e.g. `/private/page?x=1`) or full URL string
    pub fn is_path_allowed(&self, path: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.agent, path)
    }

    /// Crawl-delay for the selected group
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }

    /// `Sitemap:` URLs listed anywhere in the file
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Leading run of letters, `-` and `_`, the part of a user agent that
/// robots.txt groups are matched against
fn product_token(user_agent: &str) -> &str {
    let user_agent = user_agent.trim();
    let end = user_agent
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(user_agent.len());
    &user_agent[..end]
}

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    crawl_delay: Option<Duration>,
}

/// Collects `Crawl-delay` per user-agent group and every `Sitemap` line
#[derive(Debug, Default)]
struct DirectiveCollector {
    groups: Vec<Group>,
    sitemaps: Vec<String>,
    in_agent_run: bool,
}

impl DirectiveCollector {
    fn end_agent_run(&mut self) {
        self.in_agent_run = false;
    }

    /// Groups naming the agent win over `*` groups
    fn crawl_delay_for(&self, agent: &str) -> Option<Duration> {
        let names_agent = |group: &Group| {
            !agent.is_empty() && group.agents.iter().any(|a| a.eq_ignore_ascii_case(agent))
        };
        let is_wildcard = |group: &Group| group.agents.iter().any(|a| a == "*");

        if self.groups.iter().any(|g| names_agent(g)) {
            self.groups
                .iter()
                .filter(|g| names_agent(g))
                .find_map(|g| g.crawl_delay)
        } else {
            self.groups
                .iter()
                .filter(|g| is_wildcard(g))
                .find_map(|g| g.crawl_delay)
        }
    }
}

impl RobotsParseHandler for DirectiveCollector {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if !self.in_agent_run {
            self.groups.push(Group::default());
            self.in_agent_run = true;
        }
        let agent = if user_agent.trim_start().starts_with('*') {
            "*".to_string()
        } else {
            product_token(user_agent).to_string()
        };
        if let Some(group) = self.groups.last_mut() {
            group.agents.push(agent);
        }
    }

    fn handle_allow(&mut self, _line_num: u32, _value: &str) {
        self.end_agent_run();
    }

    fn handle_disallow(&mut self, _line_num: u32, _value: &str) {
        self.end_agent_run();
    }

    fn handle_sitemap(&mut self, _line_num: u32, value: &str) {
        if !value.is_empty() {
            self.sitemaps.push(value.to_string());
        }
    }

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        if !action.eq_ignore_ascii_case("crawl-delay") {
            return;
        }
        self.end_agent_run();
        let delay = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);
        if let (Some(delay), Some(group)) = (delay, self.groups.last_mut()) {
            if group.crawl_delay.is_none() {
                group.crawl_delay = Some(delay);
            }
        }
    }
}
