//! Prompt templating: `<<VAR>>`-style placeholders substituted from a
//! flat variable bag. No expression evaluation, just a deterministic
//! find/replace.

use std::collections::HashMap;

/// Replace every `<<NAME>>` occurrence in `template` with `vars[NAME]`.
/// An unresolved placeholder is left verbatim — a missing variable is a
/// prompt-authoring bug, not a runtime error worth failing the turn over.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if template[i..].starts_with("<<") {
            if let Some(end) = template[i + 2..].find(">>") {
                let name = &template[i + 2..i + 2 + end];
                if let Some(value) = vars.get(name) {
                    out.push_str(value);
                    i += 2 + end + 2;
                    continue;
                }
            }
        }
        let ch = template[i..].chars().next().expect("i is a char boundary");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// `CURRENT_TIME`, formatted e.g. `Sun Jul 26 2026 14:03:11 +0000`.
pub fn current_time() -> String {
    chrono::Local::now().format("%a %b %d %Y %H:%M:%S %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variable() {
        let mut vars = HashMap::new();
        vars.insert("NAME".to_string(), "researcher".to_string());
        assert_eq!(render("hello <<NAME>>", &vars), "hello researcher");
    }

    #[test]
    fn leaves_unknown_placeholder_verbatim() {
        let vars = HashMap::new();
        assert_eq!(render("hello <<GHOST>>", &vars), "hello <<GHOST>>");
    }

    #[test]
    fn handles_multiple_placeholders_and_plain_text() {
        let mut vars = HashMap::new();
        vars.insert("A".to_string(), "1".to_string());
        vars.insert("B".to_string(), "2".to_string());
        assert_eq!(render("<<A>> and <<B>>!", &vars), "1 and 2!");
    }

    #[test]
    fn no_placeholders_is_identity() {
        let vars = HashMap::new();
        assert_eq!(render("plain text", &vars), "plain text");
    }
}
