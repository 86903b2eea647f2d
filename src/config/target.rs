// ABOUTME: Host argument parsing.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@[::1]:port".

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Destination given on the command line, before config resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl Target {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidTarget("host cannot be empty".to_string()));
        }

        // Parse format: [user@]host[:port]
        let (user, rest) = match s.rfind('@') {
            Some(at_pos) => {
                let user = &s[..at_pos];
                if user.is_empty() {
                    return Err(Error::InvalidTarget(format!("empty user in {:?}", s)));
                }
                (Some(user.to_string()), &s[at_pos + 1..])
            }
            None => (None, s),
        };

        let (host, port) = split_host_port(rest)?;
        if host.is_empty() {
            return Err(Error::InvalidTarget(format!("empty host in {:?}", s)));
        }

        Ok(Target {
            user,
            host: host.to_string(),
            port,
        })
    }
}

fn split_host_port(s: &str) -> Result<(&str, Option<u16>)> {
    if let Some(bracketed) = s.strip_prefix('[') {
        let close = bracketed
            .find(']')
            .ok_or_else(|| Error::InvalidTarget(format!("unterminated '[' in {:?}", s)))?;
        let host = &bracketed[..close];
        let after = &bracketed[close + 1..];
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if after.is_empty() => Ok((host, None)),
            None => Err(Error::InvalidTarget(format!("unexpected {:?} after ']'", after))),
        };
    }

    match s.rfind(':') {
        // More than one colon without brackets: bare IPv6 literal
        Some(_) if s.matches(':').count() > 1 => Ok((s, None)),
        Some(colon_pos) => Ok((&s[..colon_pos], Some(parse_port(&s[colon_pos + 1..])?))),
        None => Ok((s, None)),
    }
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse::<u16>()
        .map_err(|_| Error::InvalidTarget(format!("invalid port: {:?}", s)))
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        let bracket = self.host.contains(':') && self.port.is_some();
        if bracket {
            write!(f, "[{}]", self.host)?;
        } else {
            f.write_str(&self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}
