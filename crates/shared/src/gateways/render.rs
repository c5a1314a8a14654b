//! Template rendering is out of scope (spec §1) beyond this pure function:
//! `{var}` placeholders are substituted from `vars`, left verbatim if
//! unmatched.

use std::collections::HashMap;

pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            output.push_str(rest);
            return output;
        };
        let end = start + end;
        let key = &rest[start + 1..end];

        output.push_str(&rest[..start]);
        match vars.get(key) {
            Some(value) => output.push_str(value),
            None => output.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::render;

    #[test]
    fn substitutes_known_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Sam".to_string());
        assert_eq!(render("Hi {name}!", &vars), "Hi Sam!");
    }

    #[test]
    fn leaves_unknown_placeholders_verbatim() {
        let vars = HashMap::new();
        assert_eq!(render("Hi {name}!", &vars), "Hi {name}!");
    }
}
