//! YAML frontmatter rendering and parsing.
//!
//! Frontmatter is delimited by lines of exactly `---`; the body starts
//! immediately after the closing delimiter line. The body is stored verbatim
//! so `version = hex(sha256(body))` is reproducible by any peer.

use serde::de::DeserializeOwned;
use serde::Serialize;

use polis_protocol::{PolisError, Result};

const DELIM: &str = "---";

/// Render frontmatter + body into one Markdown file.
pub fn render<T: Serialize>(front: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(front)?;
    Ok(format!("{DELIM}\n{yaml}{DELIM}\n{body}"))
}

/// Split a Markdown file into its raw YAML block and body.
pub fn split(content: &str) -> Result<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .ok_or_else(|| PolisError::validation("missing frontmatter opening delimiter"))?;
    let end = rest
        .find("\n---\n")
        .ok_or_else(|| PolisError::validation("missing frontmatter closing delimiter"))?;
    let yaml = &rest[..end + 1];
    let body = &rest[end + "\n---\n".len()..];
    Ok((yaml, body))
}

/// Parse a Markdown file into typed frontmatter and its body.
pub fn parse<T: DeserializeOwned>(content: &str) -> Result<(T, &str)> {
    let (yaml, body) = split(content)?;
    let front = serde_yaml::from_str(yaml)?;
    Ok((front, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polis_protocol::PostFrontmatter;

    fn front() -> PostFrontmatter {
        PostFrontmatter {
            title: "Hello".into(),
            published: "2025-01-01T12:00:00Z".parse().unwrap(),
            updated: None,
            version: "ab".repeat(32),
        }
    }

    #[test]
    fn test_render_parse_round_trip() {
        let body = "# Hello\n\nWorld\n";
        let file = render(&front(), body).unwrap();
        let (parsed, parsed_body): (PostFrontmatter, &str) = parse(&file).unwrap();
        assert_eq!(parsed, front());
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn test_body_preserved_verbatim() {
        // A body containing its own --- lines must survive.
        let body = "intro\n\n---\n\noutro\n";
        let file = render(&front(), body).unwrap();
        let (_, parsed_body): (PostFrontmatter, &str) = parse(&file).unwrap();
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn test_missing_delimiters_rejected() {
        assert!(split("no frontmatter here").is_err());
        assert!(split("---\ntitle: x\nno closing").is_err());
    }

    #[test]
    fn test_garbage_yaml_rejected() {
        let file = "---\n: : :\n---\nbody";
        assert!(parse::<PostFrontmatter>(file).is_err());
    }
}
