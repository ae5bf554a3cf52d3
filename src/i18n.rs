//! Message catalogue for the bundled views.

/// Looks up `key` for `lang`, falling back to Swedish and then to the key itself.
///
/// ```
/// use sso_web::translate;
///
/// assert_eq!(translate("en", "site_name"), "SSO Web");
/// assert_eq!(translate("fi", "logout"), "Logga ut");
/// assert_eq!(translate("en", "no.such.key"), "no.such.key");
/// ```
pub fn translate<'a>(lang: &str, key: &'a str) -> &'a str {
    message(lang, key)
        .or_else(|| message("sv", key))
        .unwrap_or(key)
}

fn message(lang: &str, key: &str) -> Option<&'static str> {
    let text = match (lang, key) {
        ("sv", "site_name") | ("en", "site_name") => "SSO Web",
        ("sv", "welcome") => "Välkommen",
        ("en", "welcome") => "Welcome",
        ("sv", "signed_in_as") => "Inloggad som",
        ("en", "signed_in_as") => "Signed in as",
        ("sv", "not_signed_in") => "Du är inte inloggad",
        ("en", "not_signed_in") => "You are not signed in",
        ("sv", "login") => "Logga in",
        ("en", "login") => "Log in",
        ("sv", "logout") => "Logga ut",
        ("en", "logout") => "Log out",
        ("sv", "admin") => "Administratör",
        ("en", "admin") => "Administrator",
        ("sv", "about_title") => "Om applikationen",
        ("en", "about_title") => "About the application",
        ("sv", "started") => "Startad",
        ("en", "started") => "Started",
        ("sv", "environment") => "Miljö",
        ("en", "environment") => "Environment",
        ("sv", "version") => "Version",
        ("en", "version") => "Version",
        ("sv", "crawler_notice") => "Den här sidan finns på",
        ("en", "crawler_notice") => "This page is available at",
        _ => return None,
    };
    Some(text)
}
