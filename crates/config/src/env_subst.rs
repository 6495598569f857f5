/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Unresolvable variables are left as-is so validation can report them.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

/// Implementation of [`substitute_env`] with a custom lookup, testable
/// without mutating the process environment.
fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        // Leave unresolved placeholder as-is.
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // Malformed — emit literal and continue past it.
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}
