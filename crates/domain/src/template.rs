//! Placeholder substitution for delivery messages.
//!
//! Templates are plain strings containing `{name}` or `{name:subfield}`
//! tokens. The engine walks the template once with a single precompiled
//! pattern; each token is resolved by the first rule that recognizes it, and
//! tokens no rule recognizes are left verbatim. Rendering never fails.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use common::UserId;
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z]+)(?::([A-Za-z]+))?\}").expect("placeholder pattern is valid")
});

/// Resolved presentation data for a user referenced in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorInfo {
    pub id: UserId,
    pub username: String,
    pub tag: String,
}

impl ActorInfo {
    pub fn new(id: UserId, username: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            tag: tag.into(),
        }
    }

    /// The platform mention form of the user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// One replacement rule.
///
/// Rules are matched in order; the rule set the dispatcher builds keeps
/// date rules after the scalar rules sharing a name (`{order}` is the order
/// text, `{order:date}` is the order timestamp), but because a scalar only
/// recognizes the bare form the outcome does not depend on rule order.
#[derive(Debug, Clone)]
pub enum Rule {
    /// An actor placeholder: subfields `tag` (default), `id`, `name` /
    /// `username`, `ping` / `mention`. Falls back to a fixed string when
    /// the actor is unknown.
    Actor {
        name: &'static str,
        actor: Option<ActorInfo>,
        fallback: &'static str,
    },

    /// A date placeholder: requires a subfield of `date`, `time` or
    /// `datetime`.
    Date {
        name: &'static str,
        at: DateTime<Utc>,
    },

    /// A plain string placeholder: recognizes only the bare `{name}` form.
    Scalar { name: &'static str, value: String },
}

impl Rule {
    fn resolve(&self, name: &str, subfield: Option<&str>, escaped: bool) -> Option<String> {
        match self {
            Rule::Actor {
                name: rule_name,
                actor,
                fallback,
            } => {
                if name != *rule_name {
                    return None;
                }
                let text = match subfield {
                    None | Some("tag") => actor.as_ref().map(|a| a.tag.clone()),
                    Some("id") => actor.as_ref().map(|a| a.id.to_string()),
                    Some("name" | "username") => actor.as_ref().map(|a| a.username.clone()),
                    Some("ping" | "mention") => actor.as_ref().map(ActorInfo::mention),
                    Some(_) => return None,
                }
                .unwrap_or_else(|| fallback.to_string());
                // Inert-formatting marker so a substituted name can't be
                // mistaken for markup by the destination renderer.
                if escaped {
                    Some(format!("`{text}`"))
                } else {
                    Some(text)
                }
            }
            Rule::Date { name: rule_name, at } => {
                if name != *rule_name {
                    return None;
                }
                match subfield? {
                    "date" => Some(format!("{} (dd-mm-YYYY)", at.format("%-d-%-m-%Y"))),
                    "time" => Some(format!("{} (HH:mm:ss)", at.format("%-H:%-M:%-S"))),
                    "datetime" => Some(format!(
                        "{} {} (dd-mm-YYYY HH:mm:ss)",
                        at.format("%-d-%-m-%Y"),
                        at.format("%-H:%-M:%-S")
                    )),
                    _ => None,
                }
            }
            Rule::Scalar { name: rule_name, value } => {
                if name == *rule_name && subfield.is_none() {
                    Some(value.clone())
                } else {
                    None
                }
            }
        }
    }
}

/// A configured, side-effect-free substitution engine.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    rules: Vec<Rule>,
    escaped: bool,
}

impl TemplateEngine {
    /// Creates an engine over an ordered list of rules.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            escaped: false,
        }
    }

    /// Enables escaped mode: actor substitutions are wrapped in an
    /// inert-formatting marker. Used for personal deliveries.
    pub fn escaped(mut self, escaped: bool) -> Self {
        self.escaped = escaped;
        self
    }

    /// Renders a template, substituting every recognized placeholder and
    /// leaving unrecognized ones untouched.
    pub fn render(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                let name = &caps[1];
                let subfield = caps.get(2).map(|m| m.as_str());
                self.rules
                    .iter()
                    .find_map(|rule| rule.resolve(name, subfield, self.escaped))
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chef() -> ActorInfo {
        ActorInfo::new(UserId::new("111222333"), "mario", "mario#0001")
    }

    fn engine() -> TemplateEngine {
        TemplateEngine::new(vec![
            Rule::Actor {
                name: "chef",
                actor: Some(chef()),
                fallback: "Unknown Chef",
            },
            Rule::Actor {
                name: "deliverer",
                actor: None,
                fallback: "Unknown Deliverer",
            },
            Rule::Scalar {
                name: "order",
                value: "Margherita".to_string(),
            },
            Rule::Date {
                name: "order",
                at: Utc.with_ymd_and_hms(2022, 3, 5, 9, 8, 7).unwrap(),
            },
        ])
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let engine = TemplateEngine::new(vec![]);
        assert_eq!(engine.render("{foo} and {bar:baz}"), "{foo} and {bar:baz}");
    }

    #[test]
    fn literal_brace_is_left_alone() {
        let engine = engine();
        assert_eq!(engine.render("a { b } c {"), "a { b } c {");
    }

    #[test]
    fn scalar_replaces_bare_form_only() {
        let engine = engine();
        assert_eq!(engine.render("{order}"), "Margherita");
        assert_eq!(engine.render("{order:weird}"), "{order:weird}");
    }

    #[test]
    fn actor_subfields() {
        let engine = engine();
        assert_eq!(engine.render("{chef}"), "mario#0001");
        assert_eq!(engine.render("{chef:tag}"), "mario#0001");
        assert_eq!(engine.render("{chef:id}"), "111222333");
        assert_eq!(engine.render("{chef:name}"), "mario");
        assert_eq!(engine.render("{chef:username}"), "mario");
        assert_eq!(engine.render("{chef:mention}"), "<@111222333>");
        assert_eq!(engine.render("{chef:ping}"), "<@111222333>");
        assert_eq!(engine.render("{chef:shoesize}"), "{chef:shoesize}");
    }

    #[test]
    fn unknown_actor_uses_fallback_for_every_subfield() {
        let engine = engine();
        assert_eq!(engine.render("{deliverer}"), "Unknown Deliverer");
        assert_eq!(engine.render("{deliverer:id}"), "Unknown Deliverer");
        assert_eq!(engine.render("{deliverer:mention}"), "Unknown Deliverer");
    }

    #[test]
    fn escaped_mode_wraps_actor_substitutions() {
        let engine = engine().escaped(true);
        assert_eq!(engine.render("{chef}"), "`mario#0001`");
        assert_eq!(engine.render("{deliverer}"), "`Unknown Deliverer`");
        // Non-actor rules are not wrapped.
        assert_eq!(engine.render("{order}"), "Margherita");
    }

    #[test]
    fn date_subfields_use_fixed_formats() {
        let engine = engine();
        assert_eq!(engine.render("{order:date}"), "5-3-2022 (dd-mm-YYYY)");
        assert_eq!(engine.render("{order:time}"), "9:8:7 (HH:mm:ss)");
        assert_eq!(
            engine.render("{order:datetime}"),
            "5-3-2022 9:8:7 (dd-mm-YYYY HH:mm:ss)"
        );
    }

    #[test]
    fn renders_mixed_template_in_one_pass() {
        let engine = engine();
        assert_eq!(
            engine.render("Order {order} cooked by {chef:name} on {order:date}; {mystery} stays"),
            "Order Margherita cooked by mario on 5-3-2022 (dd-mm-YYYY); {mystery} stays"
        );
    }
}
