//! `{{placeholder}}` substitution for campaign subjects and bodies.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use mailshot::render;
//!
//! let fields = HashMap::from([("name".to_string(), "Ana".to_string())]);
//! assert_eq!(render("Hi {{name}}, {{missing}}", &fields), "Hi Ana, {{missing}}");
//! ```

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::contact::Contact;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"))
}

/// Replace every `{{name}}` with `fields[name]`.
///
/// Unknown placeholders are left as-is. The name is matched literally (no
/// whitespace trimming) and substituted values are never re-scanned.
pub fn render(template_body: &str, fields: &HashMap<String, String>) -> String {
    placeholder_re()
        .replace_all(template_body, |caps: &Captures<'_>| match fields.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// A campaign template: subject and body, both may carry placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Human-readable name
    pub name: String,
    /// Subject line
    pub subject: String,
    /// Text or HTML body
    pub body: String,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Placeholder names declared in the subject and body.
    pub fn placeholders(&self) -> BTreeSet<String> {
        [&self.subject, &self.body]
            .into_iter()
            .flat_map(|text| placeholder_re().captures_iter(text))
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Render subject and body for one contact.
    ///
    /// `default_name` stands in for a blank contact name.
    pub fn render_for(&self, contact: &Contact, default_name: &str) -> (String, String) {
        let fields = contact.render_fields(default_name);
        (render(&self.subject, &fields), render(&self.body, &fields))
    }
}
