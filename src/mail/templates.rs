//! Email bodies.

use crate::auth::roles::Role;
use crate::mail::OutboundEmail;

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Staff invitation with an accept link.
pub fn invitation(to: &str, inviter: Option<&str>, role: Role, accept_url: &str, ttl_days: u64) -> OutboundEmail {
    let inviter = inviter.unwrap_or("A colleague");
    let subject = "You've been invited to join a restaurant team".to_string();

    let text = format!(
        "{inviter} invited you to join their restaurant team as {role}.\n\n\
         Accept the invitation: {accept_url}\n\n\
         This link expires in {ttl_days} days.\n"
    );

    let html = format!(
        "<p>{inviter} invited you to join their restaurant team as <strong>{role}</strong>.</p>\
         <p><a href=\"{url}\">Accept the invitation</a></p>\
         <p>This link expires in {ttl_days} days.</p>",
        inviter = escape_html(inviter),
        role = role,
        url = escape_html(accept_url),
        ttl_days = ttl_days,
    );

    OutboundEmail {
        to: to.to_string(),
        subject,
        text,
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_contents() {
        let email = invitation(
            "new@example.com",
            Some("Chef <Ana>"),
            Role::Manager,
            "https://app.example.com/invite/abc",
            7,
        );
        assert_eq!(email.to, "new@example.com");
        assert!(email.text.contains("as manager"));
        assert!(email.text.contains("https://app.example.com/invite/abc"));
        assert!(email.html.contains("Chef &lt;Ana&gt;"));
        assert!(!email.html.contains("<Ana>"));
        assert!(email.html.contains("expires in 7 days"));
    }

    #[test]
    fn test_invitation_without_inviter() {
        let email = invitation("x@example.com", None, Role::Staff, "https://a/b", 1);
        assert!(email.text.starts_with("A colleague invited you"));
    }
}
