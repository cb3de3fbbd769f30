//! Heuristics deciding whether a request parameter's literal value flows,
//! by string concatenation, into a hook's traced input.

use crate::models::{HookToken, TelemetryEvent};

/// Above this product of lengths, substring search replaces LCS.
const LCS_WORK_LIMIT: usize = 10_000;
const MIN_SHARED_RUN: usize = 3;

pub fn is_param_concat_in_hook(event: &TelemetryEvent, hook_type: &str, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    event.hooks(hook_type).any(|hook| match hook_type {
        "command" => token_concat(value, &hook.tokens()) || env_concat(value, &hook.env()),
        "ssrf" => hook.str_field("url").is_some_and(|url| url_concat(value, url)),
        "directory" | "readFile" | "writeFile" => {
            hook.str_field("path").is_some_and(|path| url_concat(value, path))
        }
        _ => false,
    })
}

/// Scheme, authority, path and query, sliced from the raw text without
/// decoding or normalization. A value without `//` after the scheme has
/// no authority; one without a valid scheme is all path.
fn url_components(url: &str) -> [&str; 4] {
    let (scheme, rest) = match url.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) => (scheme, rest),
        _ => ("", url),
    };
    let (authority, rest) = match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find(|c| matches!(c, '/' | '?' | '#')).unwrap_or(after.len());
            after.split_at(end)
        }
        None => ("", rest),
    };
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    [scheme, authority, path, query]
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub fn url_concat(param: &str, url: &str) -> bool {
    let components = url_components(url);
    let param_len = param.chars().count();

    for value in components.iter().filter(|c| !c.is_empty()) {
        let value_len = value.chars().count();
        if value_len >= param_len && value.contains(param) {
            return true;
        }
        if value_len < param_len && param.contains(*value) {
            return true;
        }
    }

    if param_len > MIN_SHARED_RUN {
        let words = split_words(param);
        for component in components {
            let normalized = component.replace('\\', "/");
            for item in &words {
                for part in normalized.split('/') {
                    if shares_run(part, item) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn shares_run(part: &str, item: &str) -> bool {
    let part_len = part.chars().count();
    let item_len = item.chars().count();
    if part_len * item_len < LCS_WORK_LIMIT {
        lcs_len(part, item) > MIN_SHARED_RUN
    } else {
        part_len >= item_len && part.contains(item)
    }
}

pub fn token_concat(param: &str, tokens: &[HookToken]) -> bool {
    let param = param.trim();
    if param.is_empty() {
        return false;
    }
    let param_len = param.chars().count();
    let tokens: Vec<&HookToken> = tokens.iter().filter(|t| !t.text.is_empty()).collect();

    if tokens
        .iter()
        .any(|t| t.text.chars().count() >= param_len && t.text.contains(param))
    {
        return true;
    }

    if param_len > MIN_SHARED_RUN {
        let words = split_words(param);
        for token in &tokens {
            let text_len = token.text.chars().count();
            for item in &words {
                let item_len = item.chars().count();
                if text_len * item_len < LCS_WORK_LIMIT {
                    if text_len <= MIN_SHARED_RUN {
                        if param.contains(token.text.as_str()) {
                            return true;
                        }
                    } else if lcs_len(&token.text, item) > MIN_SHARED_RUN {
                        return true;
                    }
                } else if text_len >= item_len && token.text.contains(item.as_str()) {
                    return true;
                }
            }
        }
    }
    false
}

/// Any non-empty side of a `NAME=value` environment entry found in the value.
pub fn env_concat(param: &str, env: &[&str]) -> bool {
    env.iter()
        .flat_map(|entry| entry.split('='))
        .any(|part| !part.is_empty() && param.contains(part))
}

fn is_word_char(c: char) -> bool {
    c > '\u{ff}' || c.is_ascii_alphanumeric() || c == '_'
}

/// Split into alternating runs of word and non-word characters. The trailing
/// run is kept only when at least three characters long.
pub fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let Some(first) = chars.first() else {
        return Vec::new();
    };
    let mut runs = Vec::new();
    let mut word = is_word_char(*first);
    let mut start = 0;
    for (index, c) in chars.iter().enumerate() {
        if is_word_char(*c) != word {
            runs.push(chars[start..index].iter().collect());
            word = !word;
            start = index;
        }
    }
    if chars.len() - start >= 3 {
        runs.push(chars[start..].iter().collect());
    }
    runs
}

/// Length of the longest common substring.
pub fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for ca in &a {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                best = best.max(row[j + 1]);
            }
        }
        prev = row;
    }
    best
}
