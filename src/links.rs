//! Social-link extraction from verified contract source text.
//!
//! Pure and pattern-based: a single broad URL-shaped pattern is scanned over
//! the source, and the first qualifying matches fill three write-once slots
//! (telegram, x, website). Scanning stops once all three slots are filled.

use once_cell::sync::Lazy;
use regex::Regex;

/// Broad `scheme://host/path`-shaped token pattern. Deliberately loose: it is
/// run over whole Solidity sources, where links live in comments, string
/// literals and NatSpec blocks.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\w+]+://)?([\w\d-]+\.)*[\w-]+[.:]\w+([/?=&#.]?[\w-]+)*/?")
        .expect("url pattern compiles")
});

/// Domains that show up in virtually every verified source but never point at
/// the project itself.
const NON_PROJECT_DOMAINS: [&str; 3] = ["openzeppelin", "eips", "etherscan"];

/// The three single-slot outputs of the extractor. Each slot is write-once
/// per pass; the first qualifying match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub telegram: Option<String>,
    pub x: Option<String>,
}

impl SocialLinks {
    pub fn is_complete(&self) -> bool {
        self.website.is_some() && self.telegram.is_some() && self.x.is_some()
    }
}

/// Scans `source` for website/telegram/x links.
///
/// Classification is case-insensitive: `t.me` fills the telegram slot,
/// `x.com`/`twitter.com` the x slot, and the first remaining match that is
/// neither a known non-project domain nor a purely numeric string fills the
/// website slot.
pub fn extract_links(source: &str) -> SocialLinks {
    let mut links = SocialLinks::default();

    for m in URL_PATTERN.find_iter(source) {
        let link = m.as_str().to_lowercase();

        if link.contains("t.me") && links.telegram.is_none() {
            links.telegram = Some(repair_scheme(&link));
        } else if (link.contains("x.com") || link.contains("twitter.com")) && links.x.is_none() {
            links.x = Some(repair_scheme(&link));
        } else if links.website.is_none()
            && !NON_PROJECT_DOMAINS.iter().any(|d| link.contains(d))
            && !is_purely_numeric(&link)
        {
            links.website = Some(repair_scheme(&link));
        }

        if links.is_complete() {
            break;
        }
    }

    links
}

/// Post-match repair: the pattern occasionally absorbs the character
/// preceding the scheme, which in practice is a stray `n` (from an escaped
/// newline in the source text). Restore the valid `http(s)://` prefix.
/// Anything else is left untouched.
fn repair_scheme(link: &str) -> String {
    if link.contains("nhttps") {
        link.replacen("nhttps", "https", 1)
    } else if link.contains("nhttp") {
        link.replacen("nhttp", "http", 1)
    } else {
        link.to_string()
    }
}

fn is_purely_numeric(link: &str) -> bool {
    !link.is_empty() && link.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_all_three_slots() {
        let source = r#"
            // Website: https://mytoken.finance
            // Telegram: https://t.me/mytoken
            // Twitter: https://twitter.com/mytoken
        "#;
        let links = extract_links(source);
        assert_eq!(links.website.as_deref(), Some("https://mytoken.finance"));
        assert_eq!(links.telegram.as_deref(), Some("https://t.me/mytoken"));
        assert_eq!(links.x.as_deref(), Some("https://twitter.com/mytoken"));
    }

    #[test]
    fn x_dot_com_fills_the_x_slot() {
        let links = extract_links("https://x.com/someproject");
        assert_eq!(links.x.as_deref(), Some("https://x.com/someproject"));
        assert_eq!(links.website, None);
    }

    #[test]
    fn slots_are_write_once() {
        let source = "https://t.me/first https://t.me/second";
        let links = extract_links(source);
        assert_eq!(links.telegram.as_deref(), Some("https://t.me/first"));
    }

    #[test]
    fn non_project_domains_never_become_the_website() {
        let source = r#"
            // Sources flattened with https://etherscan.io
            // import "https://github.com/OpenZeppelin/openzeppelin-contracts"
            // https://eips.ethereum.org/EIPS/eip-20
            // https://realproject.io
        "#;
        let links = extract_links(source);
        assert_eq!(links.website.as_deref(), Some("https://realproject.io"));
    }

    #[test]
    fn repairs_spurious_leading_n_before_scheme() {
        // An escaped newline in the source makes the pattern absorb an `n`.
        let links = extract_links(r"\nhttps://t.me/foo");
        assert_eq!(links.telegram.as_deref(), Some("https://t.me/foo"));
    }

    #[test]
    fn extraction_is_idempotent_on_normalized_text() {
        let first = extract_links("https://t.me/foo https://x.com/bar https://site.io");
        let renormalized = format!(
            "{} {} {}",
            first.telegram.as_deref().unwrap(),
            first.x.as_deref().unwrap(),
            first.website.as_deref().unwrap()
        );
        let second = extract_links(&renormalized);
        assert_eq!(first, second);
    }

    #[test]
    fn no_links_in_plain_solidity() {
        let links = extract_links("contract Foo { uint256 public x; }");
        assert_eq!(links, SocialLinks::default());
    }

    #[test]
    fn stops_scanning_once_full() {
        // A later, "better" website match must not displace the first one.
        let source = "https://t.me/a https://x.com/b https://site-one.io https://site-two.io";
        let links = extract_links(source);
        assert_eq!(links.website.as_deref(), Some("https://site-one.io"));
    }
}
