use crate::models::{HookInfo, HookToken, TelemetryEvent};

/// True when some `hook_type` invocation in `event` shows the expected feature.
pub fn check_concat_in_hook(event: &TelemetryEvent, hook_type: &str, feature: &str) -> bool {
    event.hooks(hook_type).any(|hook| hook_matches(hook, hook_type, feature))
}

fn hook_matches(hook: &HookInfo, hook_type: &str, feature: &str) -> bool {
    match hook_type {
        "command" => {
            let injected = hook
                .str_field("command")
                .is_some_and(|code| is_token_injected(code, feature, &hook.tokens()));
            injected || hook.env().iter().any(|entry| entry.contains(feature))
        }
        "readFile" | "directory" | "writeFile" => hook
            .str_field("realpath")
            .is_some_and(|resolved| path_matches(resolved, feature)),
        "ssrf" => hook.str_field("hostname") == Some(feature),
        "xxe" => hook.str_field("entity") == Some(feature),
        _ => false,
    }
}

/// Compare a resolved filesystem path with an expected value. A leading `:`
/// stands for any drive letter; Windows paths compare case-insensitively.
pub fn path_matches(resolved: &str, expected: &str) -> bool {
    let windows = expected.contains('\\') || resolved.contains('\\');
    let eq = |a: &str, b: &str| if windows { a.eq_ignore_ascii_case(b) } else { a == b };

    if expected.starts_with(':') {
        let mut chars = resolved.chars();
        return match chars.next() {
            Some(drive) if drive.is_ascii_alphabetic() => eq(chars.as_str(), expected),
            _ => false,
        };
    }
    eq(resolved, expected)
}

/// The feature occurs in `code` and spans more than the lexer token it
/// starts in, so it altered the token structure. A feature past every
/// token is measured from the first one.
pub fn is_token_injected(code: &str, feature: &str, tokens: &[HookToken]) -> bool {
    let Some(byte_index) = code.find(feature) else {
        return false;
    };
    if tokens.is_empty() {
        return false;
    }
    let index = code[..byte_index].chars().count();
    let end = index + feature.chars().count();

    let start = tokens.iter().position(|t| t.stop > index).unwrap_or(0);
    if tokens[start].stop > end {
        return false;
    }
    tokens.len() - start > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::telemetry::fixtures::{new_request, with_hooks};
    use serde_json::json;

    fn token(text: &str, start: usize, stop: usize) -> HookToken {
        HookToken { text: text.to_string(), start, stop }
    }

    #[test]
    fn test_path_matches_exact() {
        assert!(path_matches("/etc/passwd", "/etc/passwd"));
        assert!(!path_matches("/etc/passwd.bak", "/etc/passwd"));
        assert!(!path_matches("/ETC/passwd", "/etc/passwd"));
    }

    #[test]
    fn test_path_matches_drive_relative() {
        assert!(path_matches("C:\\Windows\\system.ini", ":\\Windows\\system.ini"));
        assert!(path_matches("d:\\windows\\SYSTEM.INI", ":\\Windows\\system.ini"));
        assert!(!path_matches("\\\\share\\Windows\\system.ini", ":\\Windows\\system.ini"));
        assert!(!path_matches("C:\\Windows\\system.ini.bak", ":\\Windows\\system.ini"));
    }

    #[test]
    fn test_path_matches_windows_absolute() {
        assert!(path_matches("C:\\Windows\\system.ini", "c:\\Windows\\system.ini"));
        assert!(!path_matches("D:\\Windows\\system.ini", "c:\\Windows\\system.ini"));
    }

    #[test]
    fn test_token_injected_across_tokens() {
        // sh -c "echo '"openrasp' cmd"
        let code = "echo ''\"openrasp' cmd";
        let tokens = vec![
            token("echo", 0, 4),
            token("''", 5, 7),
            token("\"openrasp'", 7, 17),
            token("cmd", 18, 21),
        ];
        assert!(is_token_injected(code, "'\"openrasp' cmd", &tokens));
    }

    #[test]
    fn test_token_not_injected_inside_single_token() {
        let code = "cat 'a$(openrasp `cmd`)b'";
        let tokens = vec![token("cat", 0, 3), token("'a$(openrasp `cmd`)b'", 4, 25)];
        assert!(!is_token_injected(code, "a$(openrasp `cmd`)b", &tokens));
        assert!(!is_token_injected(code, "missing", &tokens));
    }

    #[test]
    fn test_token_injected_past_last_token() {
        let tokens = vec![token("ls", 0, 2), token("-l", 3, 5)];
        assert!(is_token_injected("ls -l ;id", ";id", &tokens));
        assert!(!is_token_injected("ls ;id", ";id", &[token("ls", 0, 2)]));
        assert!(!is_token_injected("ls ;id", ";id", &[]));
    }

    #[test]
    fn test_check_xxe_entity_equality() {
        let event = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "xxe", "entity": "file:///etc/passwd" }]),
        ))
        .unwrap();
        assert!(check_concat_in_hook(&event, "xxe", "file:///etc/passwd"));
        assert!(!check_concat_in_hook(&event, "xxe", "file:///etc/shadow"));
    }

    #[test]
    fn test_check_unknown_hook_type() {
        let event = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "eval", "code": "openrasp" }]),
        ))
        .unwrap();
        assert!(!check_concat_in_hook(&event, "eval", "openrasp"));
    }

    #[test]
    fn test_check_command_env() {
        let event = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "command", "command": "env", "tokens": [{ "text": "env", "start": 0, "stop": 3 }], "env": ["X=openrasp=openxrasp"] }]),
        ))
        .unwrap();
        assert!(check_concat_in_hook(&event, "command", "openrasp=openxrasp"));
        assert!(!check_concat_in_hook(&event, "command", "other"));
    }

    #[test]
    fn test_check_ssrf_hostname_equality() {
        let event = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "ssrf", "url": "http://127.1.2.3/", "hostname": "127.1.2.3" }]),
        ))
        .unwrap();
        assert!(check_concat_in_hook(&event, "ssrf", "127.1.2.3"));
        assert!(!check_concat_in_hook(&event, "ssrf", "127.1.2"));
        assert!(!check_concat_in_hook(&event, "readFile", "127.1.2.3"));
    }
}
