//! Filters available to every template.

use cruet::case::{
    camel::to_camel_case, kebab::to_kebab_case, pascal::to_pascal_case,
    screaming_snake::to_screaming_snake_case, snake::to_snake_case, train::to_train_case,
};
use cruet::string::{pluralize::to_plural, singularize::to_singular};
use log::warn;
use minijinja::Environment;
use regex::Regex;

/// Registers every filter on `env`.
pub fn register(env: &mut Environment<'_>) {
    env.add_filter("camel_case", to_camel_case);
    env.add_filter("kebab_case", to_kebab_case);
    env.add_filter("pascal_case", to_pascal_case);
    env.add_filter("screaming_snake_case", to_screaming_snake_case);
    env.add_filter("snake_case", to_snake_case);
    env.add_filter("train_case", to_train_case);
    env.add_filter("plural", to_plural);
    env.add_filter("singular", to_singular);
    env.add_filter("slug", slug);
    env.add_filter("regex", regex_filter);
    env.add_filter("regex_replace", regex_replace);
}

/// URL path segment for a title: kebab case, ASCII letters, digits and
/// dashes only.
pub fn slug(value: &str) -> String {
    to_kebab_case(value)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Tests if a string matches a regular expression. Invalid patterns never
/// match.
pub fn regex_filter(val: &str, re: &str) -> bool {
    match Regex::new(re) {
        Ok(re) => re.is_match(val),
        Err(err) => {
            warn!("Invalid regex '{re}': {err}");
            false
        }
    }
}

/// Replaces every match of `pattern`; `$1` style group references work in
/// `replacement`. An invalid pattern leaves the value untouched.
pub fn regex_replace(value: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(value, replacement).into_owned(),
        Err(err) => {
            warn!("Invalid regex '{pattern}': {err}");
            value.to_string()
        }
    }
}
