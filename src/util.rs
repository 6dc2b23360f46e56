//! Small shared helpers.

/// Convert a kebab/snake name into its camel-case form (`no-banner-text`
/// becomes `noBannerText`). Already-camel input passes through unchanged.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' || c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Check that a name is usable as a command: the parser matches commands as
/// plain tokens, so the name must begin with a lowercase letter (a leading
/// dash would classify as an option, a digit reads like a value) and stick
/// to the lowercase kebab form schema file stems use. A trailing hyphen is
/// rejected so camel-casing and alias text never end mid-word.
pub fn is_valid_command_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_lowercase()
        && !name.ends_with('-')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_folds_separators() {
        assert_eq!(camel_case("banner"), "banner");
        assert_eq!(camel_case("no-color"), "noColor");
        assert_eq!(camel_case("log_level"), "logLevel");
        assert_eq!(camel_case("a-b-c"), "aBC");
        assert_eq!(camel_case("-x"), "x");
    }

    #[test]
    fn command_names_follow_the_pattern() {
        assert!(is_valid_command_name("help"));
        assert!(is_valid_command_name("my-command2"));
        assert!(!is_valid_command_name(""));
        assert!(!is_valid_command_name("2fast"));
        assert!(!is_valid_command_name("Cmd"));
        assert!(!is_valid_command_name("trailing-"));
        assert!(!is_valid_command_name("under_score"));
    }
}
