use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

const SYNTAX_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Domains commonly serving throwaway inboxes. Illustrative, not a
/// maintained blocklist.
const BUILTIN_DISPOSABLE_DOMAINS: &[&str] = &[
    "tempmail.com",
    "throwaway.email",
    "guerrillamail.com",
    "mailinator.com",
    "10minutemail.com",
    "trashmail.com",
    "yopmail.com",
    "temp-mail.org",
    "fakeinbox.com",
];

fn syntax_regex() -> Option<&'static Regex> {
    lazy_static! {
        static ref EMAIL_SYNTAX: Result<Regex, regex::Error> = Regex::new(SYNTAX_PATTERN);
    }

    EMAIL_SYNTAX.as_ref().ok()
}

/// Shallow structural check: a local part, a single `@`, an ASCII domain
/// with at least one dot and a top-level label of two letters or more.
///
/// This is a sanity filter, not RFC-compliant validation, and says nothing
/// about deliverability; for that, use the remote verification.
#[must_use]
pub fn is_valid_syntax(email: &str) -> bool {
    syntax_regex().is_some_and(|re| re.is_match(email))
}

/// The lower-cased text after the first `@`, or `None` without one.
#[must_use]
pub fn extract_domain(email: &str) -> Option<String> {
    email
        .split_once('@')
        .map(|(_, domain)| domain.to_lowercase())
}

/// Check a domain against the built-in disposable-provider list.
///
/// For a caller-supplied list, build a [`DisposableDomains`] instead.
#[must_use]
pub fn is_disposable_domain(domain: &str) -> bool {
    lazy_static! {
        static ref BUILTIN: DisposableDomains = DisposableDomains::default();
    }

    BUILTIN.contains(domain)
}

/// An immutable set of domains treated as disposable.
///
/// The default set is the built-in list, which is non-exhaustive by
/// design; callers with their own blocklist inject it through
/// [`DisposableDomains::new`]. Lookups are case-insensitive.
#[derive(Clone, Debug)]
pub struct DisposableDomains {
    domains: HashSet<String>,
}

impl DisposableDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|domain| domain.as_ref().to_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_lowercase())
    }
}

impl Default for DisposableDomains {
    fn default() -> Self {
        Self::new(BUILTIN_DISPOSABLE_DOMAINS.iter().copied())
    }
}
