use std::{fmt::Display, str::FromStr, sync::OnceLock};

use log::trace;
use regex::Regex;
use serde::{de::Error, Deserialize, Deserializer};
use stockbridge_common::Platform;

/// Platform names in query strings are accepted in any case.
pub fn any_case_platform<'de, D: Deserializer<'de>>(d: D) -> Result<Platform, D::Error> {
    let s = String::deserialize(d)?;
    s.parse::<Platform>().map_err(D::Error::custom)
}

/// As [`any_case_platform`], with an empty value meaning "all platforms".
pub fn optional_any_case_platform<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Platform>, D::Error> {
    let s = Option::<String>::deserialize(d)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<Platform>().map(Some).map_err(D::Error::custom),
    }
}

/// Compares two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The jobs that can be triggered through `/jobs/{name}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// `getPending{Platform}Orders`
    PollPendingOrders(Platform),
    /// `settle{Platform}`
    Settle(Platform),
    /// `refresh{Platform}Tokens`
    RefreshTokens(Platform),
    /// `updateOrderStatuses?platform=`
    UpdateOrderStatuses,
    /// `runDiscordNotif`
    DiscordNotifications,
    Ping,
}

fn job_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(concat!(
                r"^(?:getPending(?P<poll>[A-Za-z]+)Orders|settle(?P<settle>[A-Za-z]+)",
                r"|refresh(?P<tokens>[A-Za-z]+)Tokens)$"
            ))
            .ok()
        })
        .as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownJob(pub String);

impl Display for UnknownJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "There is no job called {}", self.0)
    }
}

impl FromStr for Job {
    type Err = UnknownJob;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updateOrderStatuses" => return Ok(Job::UpdateOrderStatuses),
            "runDiscordNotif" => return Ok(Job::DiscordNotifications),
            "ping" => return Ok(Job::Ping),
            _ => {},
        }
        let caps = job_pattern().and_then(|re| re.captures(s)).ok_or_else(|| UnknownJob(s.to_string()))?;
        let platform = |name: &str| {
            caps.name(name).map(|m| m.as_str().parse::<Platform>().map_err(|_| UnknownJob(s.to_string())))
        };
        let job = if let Some(p) = platform("poll") {
            Job::PollPendingOrders(p?)
        } else if let Some(p) = platform("settle") {
            Job::Settle(p?)
        } else if let Some(p) = platform("tokens") {
            Job::RefreshTokens(p?)
        } else {
            return Err(UnknownJob(s.to_string()));
        };
        trace!("Parsed job {s} as {job:?}");
        Ok(job)
    }
}
