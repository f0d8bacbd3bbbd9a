//! Identity exclusion for internal staff accounts.
//!
//! The policy is built from injected lists and handed to the loaders; nothing
//! in the pipeline carries its own list of domains or addresses.

use std::collections::HashSet;

/// Compiled exclusion lists. All entries are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionPolicy {
    /// Domain suffixes, always starting with `@`.
    domains: Vec<String>,
    /// Exact addresses.
    emails: HashSet<String>,
    /// Sender-name fragments that mark a chat message as internal.
    sender_names: Vec<String>,
}

impl ExclusionPolicy {
    /// Build a policy. Domains without a leading `@` get one so that
    /// `acme.com` does not also exclude `notacme.com`.
    pub fn new<D, E, S>(domains: D, emails: E, sender_names: S) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty() && d != "@")
            .map(|d| if d.starts_with('@') { d } else { format!("@{}", d) })
            .collect();
        let emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let sender_names = sender_names
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            domains,
            emails,
            sender_names,
        }
    }

    /// A policy that excludes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.emails.is_empty() && self.sender_names.is_empty()
    }

    /// `true` when `email` (any casing or padding) matches an excluded address
    /// exactly or ends with an excluded domain.
    pub fn is_excluded_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return false;
        }
        self.emails.contains(&email) || self.domains.iter().any(|d| email.ends_with(d.as_str()))
    }

    /// `true` when a chat sender belongs to an internal account.
    ///
    /// Senders are display names, so this checks the configured name
    /// fragments and, for senders that carry an address anywhere in the
    /// field (`Coach <coach@acme.com>`), the email rules.
    pub fn is_excluded_sender(&self, sender: &str) -> bool {
        let sender = sender.trim().to_lowercase();
        if sender.is_empty() {
            return false;
        }
        if self.sender_names.iter().any(|n| sender.contains(n.as_str())) {
            return true;
        }
        let mut tokens = sender
            .split(|c: char| c.is_whitespace() || "<>()[],;:\"'".contains(c))
            .filter(|t| !t.is_empty());
        if tokens.any(|t| self.domains.iter().any(|d| t.ends_with(d.as_str()))) {
            return true;
        }
        self.emails.iter().any(|e| sender.contains(e.as_str()))
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn sender_names(&self) -> &[String] {
        &self.sender_names
    }

    /// Excluded addresses in sorted order.
    pub fn emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self.emails.iter().cloned().collect();
        emails.sort();
        emails
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::new(
            ["@acme.com", "Staff.Example.org"],
            ["Coach@Gmail.com"],
            ["Admin Team"],
        )
    }

    #[test]
    fn test_domain_suffix_match() {
        let p = policy();
        assert!(p.is_excluded_email("alice@acme.com"));
        assert!(p.is_excluded_email("  ALICE@ACME.COM "));
        assert!(!p.is_excluded_email("alice@notacme.company"));
    }

    #[test]
    fn test_domain_without_at_is_prefixed() {
        let p = policy();
        assert!(p.is_excluded_email("bob@staff.example.org"));
        assert!(!p.is_excluded_email("bob@mystaff.example.org"));
        assert_eq!(p.domains()[1], "@staff.example.org");
    }

    #[test]
    fn test_exact_email_match() {
        let p = policy();
        assert!(p.is_excluded_email("coach@gmail.com"));
        assert!(!p.is_excluded_email("coach2@gmail.com"));
    }

    #[test]
    fn test_empty_email_never_excluded() {
        assert!(!policy().is_excluded_email("   "));
    }

    #[test]
    fn test_sender_name_fragment() {
        let p = policy();
        assert!(p.is_excluded_sender("ADMIN TEAM (Host)"));
        assert!(p.is_excluded_sender("host@acme.com"));
        assert!(p.is_excluded_sender("Coach <coach@gmail.com>"));
        assert!(!p.is_excluded_sender("Priya Sharma"));
    }

    #[test]
    fn test_sender_domain_inside_brackets() {
        let p = policy();
        assert!(p.is_excluded_sender("Coach <coach@acme.com>"));
        assert!(p.is_excluded_sender("Coach (coach@acme.com)"));
        assert!(p.is_excluded_sender("Mentor [ops@staff.example.org] (Host)"));
        assert!(!p.is_excluded_sender("Bob <bob@acme.com.au>"));
        assert!(!p.is_excluded_sender("Bob (bob@notacme.company)"));
    }

    #[test]
    fn test_none_policy_excludes_nothing() {
        let p = ExclusionPolicy::none();
        assert!(p.is_empty());
        assert!(!p.is_excluded_email("alice@acme.com"));
        assert!(!p.is_excluded_sender("Admin Team"));
    }

    #[test]
    fn test_blank_entries_ignored() {
        let p = ExclusionPolicy::new(["", "@"], [" "], Vec::<String>::new());
        assert!(p.is_empty());
    }
}
