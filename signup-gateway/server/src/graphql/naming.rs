//! Inflection of catalog identifiers into GraphQL names.

const IRREGULAR: [(&str, &str); 4] =
    [("person", "people"), ("child", "children"), ("man", "men"), ("woman", "women")];

/// `user_accounts` -> `UserAccounts`.
pub fn pascal_case(identifier: &str) -> String {
    identifier
        .split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect()
}

/// `user_accounts` -> `userAccounts`.
pub fn camel_case(identifier: &str) -> String {
    let pascal = pascal_case(identifier);
    let mut chars = pascal.chars();
    chars.next().map_or_else(String::new, |first| first.to_lowercase().chain(chars).collect())
}

/// `first_name` -> `FIRST_NAME`.
pub fn constant_case(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut previous_lower = false;
    for c in identifier.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !out.ends_with('_') {
                out.push('_');
            }
            previous_lower = false;
        } else {
            if c.is_uppercase() && previous_lower {
                out.push('_');
            }
            previous_lower = c.is_lowercase() || c.is_ascii_digit();
            out.extend(c.to_uppercase());
        }
    }
    out.trim_matches('_').to_string()
}

pub fn singularize(word: &str) -> String {
    let (head, last) = split_last_word(word);
    let lower = last.to_lowercase();

    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == lower) {
        return format!("{head}{}", match_case(last, singular));
    }
    if IRREGULAR.iter().any(|(singular, _)| *singular == lower) {
        return word.to_string();
    }

    let singular = if let Some(stem) = last.strip_suffix("ies").filter(|stem| !stem.is_empty()) {
        format!("{stem}y")
    } else if ["sses", "shes", "ches", "xes", "zes"].iter().any(|suffix| lower.ends_with(suffix)) {
        last[..last.len() - 2].to_string()
    } else if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") {
        last[..last.len() - 1].to_string()
    } else {
        last.to_string()
    };
    format!("{head}{singular}")
}

pub fn pluralize(word: &str) -> String {
    let (head, last) = split_last_word(word);
    let lower = last.to_lowercase();

    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return format!("{head}{}", match_case(last, plural));
    }

    let plural = if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &last[..last.len() - 1])
    } else if ["s", "sh", "ch", "x", "z"].iter().any(|suffix| lower.ends_with(suffix)) {
        format!("{last}es")
    } else {
        format!("{last}s")
    };
    format!("{head}{plural}")
}

/// GraphQL type name of a relation: `user_accounts` -> `UserAccount`.
pub fn type_name(relation: &str) -> String { pascal_case(&singularize(relation)) }

/// Plural form used in list fields: `user_accounts` -> `UserAccounts`.
pub fn plural_type_name(relation: &str) -> String { pascal_case(&pluralize(&singularize(relation))) }

/// Whether `name` can be used as a GraphQL name outside the introspection
/// namespace.
pub fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !name.starts_with("__")
}

fn split_last_word(word: &str) -> (&str, &str) {
    word.rfind('_').map_or(("", word), |index| word.split_at(index + 1))
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        pascal_case(replacement)
    } else {
        replacement.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        assert_eq!(pascal_case("user_accounts"), "UserAccounts");
        assert_eq!(camel_case("first_name"), "firstName");
        assert_eq!(camel_case("id"), "id");
        assert_eq!(constant_case("first_name"), "FIRST_NAME");
        assert_eq!(constant_case("createdAt"), "CREATED_AT");
    }

    #[test]
    fn test_inflection() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("user_sign_ups"), "user_sign_up");
        assert_eq!(singularize("status"), "status");
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("person"), "people");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name("users"), "User");
        assert_eq!(plural_type_name("users"), "Users");
        assert_eq!(type_name("person"), "Person");
        assert_eq!(plural_type_name("person"), "People");
        assert_eq!(type_name("sign_up_events"), "SignUpEvent");
    }

    #[test]
    fn test_graphql_names() {
        assert!(is_graphql_name("allUsers"));
        assert!(is_graphql_name("_private"));
        assert!(is_graphql_name("FIRST_NAME"));
        assert!(!is_graphql_name(""));
        assert!(!is_graphql_name("2fa"));
        assert!(!is_graphql_name("__typename"));
        assert!(!is_graphql_name(&camel_case("price$usd")));
        assert!(!is_graphql_name(&pascal_case("café")));
    }
}
