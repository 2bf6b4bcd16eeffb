//! `${name}` placeholder substitution.

use std::collections::BTreeMap;
use std::fmt::{Display, Write};

/// Replace `${name}` placeholders in `template` with values from `variables`.
///
/// Placeholders without a matching variable, and an unterminated `${`, are
/// kept verbatim.
pub fn substitute<V: Display>(template: &str, variables: &BTreeMap<String, V>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match variables.get(name) {
            Some(value) => {
                let _ = write!(out, "{value}");
            }
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
