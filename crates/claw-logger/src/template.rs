//! Message template rendering.
//!
//! Templates use brace placeholders:
//! - `{name}` is replaced by the attribute `name`
//! - `{}` is replaced by positional arguments (`"0"`, `"1"`, ...) in order
//! - `{{` and `}}` produce literal braces
//!
//! Attributes that no placeholder consumed are returned separately so
//! human-readable sinks can print them after the message.

use crate::attrs::Attrs;

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// The message with placeholders substituted and escapes collapsed.
    pub text: String,
    /// Attributes that were not consumed by any placeholder.
    pub unconsumed: Attrs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Splits a template into literal runs and placeholders.
///
/// A lone brace that does not open a well-formed placeholder is kept as
/// literal text.
fn tokenize(template: &str) -> Vec<Token<'_>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let escaped = match (bytes[i], bytes.get(i + 1)) {
            (b'{', Some(b'{')) => Some("{"),
            (b'}', Some(b'}')) => Some("}"),
            _ => None,
        };
        if let Some(brace) = escaped {
            if literal_start < i {
                tokens.push(Token::Literal(&template[literal_start..i]));
            }
            tokens.push(Token::Literal(brace));
            i += 2;
            literal_start = i;
            continue;
        }

        if bytes[i] == b'{' {
            let rest = &template[i + 1..];
            if let Some(end) = rest.find(['{', '}']) {
                if rest.as_bytes()[end] == b'}' {
                    if literal_start < i {
                        tokens.push(Token::Literal(&template[literal_start..i]));
                    }
                    tokens.push(Token::Placeholder(&rest[..end]));
                    i += end + 2;
                    literal_start = i;
                    continue;
                }
            }
        }
        i += 1;
    }

    if literal_start < bytes.len() {
        tokens.push(Token::Literal(&template[literal_start..]));
    }
    tokens
}

/// Renders `template` against `attrs`.
///
/// A named key is consumed when the template holds a `{key}` placeholder and
/// does not also hold the escaped form `{{key}}`. Named placeholders are
/// resolved first. If `"0"` is still unconsumed afterwards, empty `{}`
/// placeholders bind to `"0"`, `"1"`, ... from left to right until the next
/// index is missing; remaining `{}` stay literal.
///
/// Rendering never fails: malformed or unmatched placeholders pass through
/// unchanged.
#[must_use]
pub fn render(template: &str, attrs: &Attrs) -> Rendered {
    let tokens = tokenize(template);
    let mut unconsumed = attrs.clone();

    let named: Vec<Option<String>> = tokens
        .iter()
        .map(|token| match token {
            Token::Placeholder(name) if !name.is_empty() => {
                let escaped = format!("{{{{{name}}}}}");
                let value = attrs.get(name).filter(|_| !template.contains(&escaped))?;
                unconsumed.remove(name);
                Some(value.to_string())
            }
            _ => None,
        })
        .collect();

    let mut next_positional = unconsumed.contains_key("0").then_some(0usize);
    let mut text = String::with_capacity(template.len());

    for (token, substitution) in tokens.into_iter().zip(named) {
        match token {
            Token::Literal(literal) => text.push_str(literal),
            Token::Placeholder("") => {
                let bound = next_positional.and_then(|index| {
                    let key = index.to_string();
                    unconsumed.remove(&key).map(|value| (index, value))
                });
                match bound {
                    Some((index, value)) => {
                        text.push_str(&value.to_string());
                        next_positional = Some(index + 1);
                    }
                    None => {
                        next_positional = None;
                        text.push_str("{}");
                    }
                }
            }
            Token::Placeholder(name) => match substitution {
                Some(value) => text.push_str(&value),
                None => {
                    text.push('{');
                    text.push_str(name);
                    text.push('}');
                }
            },
        }
    }

    Rendered { text, unconsumed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::attrs::{merge_call_args, Value};
    use crate::args;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn named_placeholder_consumed() {
        let rendered = render("{x}", &attrs! { "x" => "v" });
        assert_eq!(rendered.text, "v");
        assert!(rendered.unconsumed.is_empty());
    }

    #[test]
    fn escaped_placeholder_not_consumed() {
        let attrs = attrs! { "x" => "v" };
        let rendered = render("{{x}}", &attrs);
        assert_eq!(rendered.text, "{x}");
        assert_eq!(rendered.unconsumed, attrs);
    }

    #[test]
    fn escape_anywhere_suppresses_every_occurrence() {
        let rendered = render("{x} and {{x}}", &attrs! { "x" => "v" });
        assert_eq!(rendered.text, "{x} and {x}");
        assert!(rendered.unconsumed.contains_key("x"));
    }

    #[test]
    fn positional_in_ascending_order() {
        let attrs = merge_call_args(args!["bike", "300"]);
        let rendered = render("Created a new {} {}", &attrs);
        assert_eq!(rendered.text, "Created a new bike 300");
        assert!(rendered.unconsumed.is_empty());
    }

    #[test]
    fn extra_positional_left_unconsumed() {
        let attrs = merge_call_args(args!["a", "b", "c"]);
        let rendered = render("{}-{}", &attrs);
        assert_eq!(rendered.text, "a-b");
        assert_eq!(rendered.unconsumed.get("2"), Some(&Value::Str("c".to_string())));
        assert_eq!(rendered.unconsumed.len(), 1);
    }

    #[test]
    fn missing_positional_leaves_placeholder() {
        let attrs = merge_call_args(args!["a"]);
        let rendered = render("{} {} {}", &attrs);
        assert_eq!(rendered.text, "a {} {}");
        assert!(rendered.unconsumed.is_empty());
    }

    #[test]
    fn empty_placeholders_ignored_without_positional_args() {
        let rendered = render("{} {name}", &attrs! { "name" => "ada" });
        assert_eq!(rendered.text, "{} ada");
    }

    #[test]
    fn named_and_positional_mix() {
        let attrs = merge_call_args(args![42, attrs! { "user" => "ada", "ip" => "10.0.0.1" }]);
        let rendered = render("{user} has {} items", &attrs);
        assert_eq!(rendered.text, "ada has 42 items");
        assert_eq!(rendered.unconsumed, attrs! { "ip" => "10.0.0.1" });
    }

    #[test]
    fn named_zero_disables_positional_binding() {
        let attrs = merge_call_args(args!["a"]);
        let rendered = render("{0} {}", &attrs);
        assert_eq!(rendered.text, "a {}");
        assert!(rendered.unconsumed.is_empty());
    }

    #[test]
    fn named_one_stops_positional_run() {
        let attrs = merge_call_args(args!["a", "b"]);
        let rendered = render("{1} {} {}", &attrs);
        assert_eq!(rendered.text, "b a {}");
        assert!(rendered.unconsumed.is_empty());
    }

    #[test]
    fn repeated_placeholder_substituted_everywhere() {
        let rendered = render("{a}{a}{a}", &attrs! { "a" => 1 });
        assert_eq!(rendered.text, "111");
    }

    #[test]
    fn byte_values_render_as_hex() {
        let rendered = render("id={id}", &attrs! { "id" => vec![0xabu8, 0x01] });
        assert_eq!(rendered.text, "id=ab01");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let rendered = render("{a}", &attrs! { "a" => "{b}", "b" => "x" });
        assert_eq!(rendered.text, "{b}");
        assert!(rendered.unconsumed.contains_key("b"));
    }

    #[test_case("", "" ; "empty template")]
    #[test_case("plain text", "plain text" ; "no placeholders")]
    #[test_case("{{}}", "{}" ; "escaped empty braces")]
    #[test_case("a { b", "a { b" ; "lone open brace")]
    #[test_case("a } b", "a } b" ; "lone close brace")]
    #[test_case("{unknown}", "{unknown}" ; "unknown key")]
    #[test_case("{ {x}", "{ v" ; "brace before placeholder")]
    #[test_case("{x", "{x" ; "unterminated")]
    fn passthrough_cases(template: &str, expected: &str) {
        let rendered = render(template, &attrs! { "x" => "v" });
        assert_eq!(rendered.text, expected);
    }

    #[test]
    fn no_match_keeps_all_attrs() {
        let attrs = attrs! { "a" => 1, "b" => 2 };
        let rendered = render("", &attrs);
        assert_eq!(rendered.text, "");
        assert_eq!(rendered.unconsumed, attrs);
    }

    #[test]
    fn multibyte_text_survives() {
        let rendered = render("→ {x} ✓", &attrs! { "x" => "é" });
        assert_eq!(rendered.text, "→ é ✓");
    }

    proptest! {
        #[test]
        fn rendering_plain_text_is_identity(msg in "[^{}]*") {
            let rendered = render(&msg, &Attrs::new());
            prop_assert_eq!(rendered.text, msg);
            prop_assert!(rendered.unconsumed.is_empty());
        }

        #[test]
        fn consumed_plus_unconsumed_covers_attrs(msg in "[a-c{} ]{0,12}") {
            let attrs = attrs! { "a" => 1, "b" => 2 };
            let rendered = render(&msg, &attrs);
            for (key, value) in &rendered.unconsumed {
                prop_assert_eq!(attrs.get(key), Some(value));
            }
        }
    }
}
