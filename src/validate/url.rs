//! URL dimension: well-formedness plus marketplace-domain recognition.
//!
//! 100 — parses and the host belongs to a known portal.
//! 50  — parses but the domain is unrecognized (warning, not an error).
//! 0   — missing or malformed (hard error).

use super::SubScore;

pub(crate) fn score(source_url: &str, known_domains: &[String]) -> SubScore {
    let mut out = SubScore::new(0.0);

    if source_url.trim().is_empty() {
        out.errors.push("missing URL".to_string());
        return out;
    }

    let parsed = match url::Url::parse(source_url) {
        Ok(u) => u,
        Err(_) => {
            out.errors.push(format!("malformed URL: {source_url}"));
            return out;
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        out.errors
            .push(format!("unsupported URL scheme: {}", parsed.scheme()));
        return out;
    }

    let host = match parsed.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => {
            out.errors.push(format!("URL has no host: {source_url}"));
            return out;
        }
    };

    if known_domains.iter().any(|d| host_matches(&host, d)) {
        out.score = 100.0;
    } else {
        out.score = 50.0;
        out.warnings
            .push(format!("unrecognized marketplace domain: {host}"));
    }
    out
}

/// `www.spitogatos.gr` matches `spitogatos.gr`, but `evilspitogatos.gr`
/// does not.
fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}
