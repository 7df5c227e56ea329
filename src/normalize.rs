use crate::config::Config;
use anyhow::Result;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Cleans extracted text before it is chunked, classified or reviewed.
pub fn normalize_text(cfg: &Config, raw: &str) -> Result<String> {
    let n = &cfg.normalize;
    let mut text = raw.to_string();

    if n.normalize_newlines {
        text = text.replace("\r\n", "\n").replace('\r', "\n");
    }

    if n.normalize_unicode {
        text = text.nfkc().collect::<String>();
    }

    text = sanitize_control_chars(&text, &n.control_chars_to_sanitize);

    if n.trim_trailing_whitespace {
        text = text
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
    }

    if n.remove_by_regex {
        text = remove_by_regex(&n.regex.patterns, &text)?;
    }

    if n.collapse_blank_lines {
        text = collapse_blank_lines(&text);
    }

    Ok(text.trim().to_string())
}

fn sanitize_control_chars(s: &str, codes: &[u8]) -> String {
    if codes.is_empty() {
        return s.to_string();
    }

    let mut mask = [false; 128];
    for &code in codes {
        if (code as usize) < mask.len() {
            mask[code as usize] = true;
        }
    }

    s.chars()
        .filter(|&ch| {
            // Structural whitespace always survives.
            if ch == '\n' || ch == '\r' || ch == '\t' {
                return true;
            }
            let cp = ch as u32;
            cp >= 128 || !mask[cp as usize]
        })
        .collect()
}

/// At most two consecutive empty lines are kept.
fn collapse_blank_lines(s: &str) -> String {
    let mut out = Vec::new();
    let mut blank_run = 0usize;
    for line in s.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }
    out.join("\n")
}

fn remove_by_regex(patterns: &[String], s: &str) -> Result<String> {
    let regs: Vec<Regex> = patterns
        .iter()
        .map(|p| Regex::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(s.lines()
        .filter(|line| !regs.iter().any(|r| r.is_match(line.trim())))
        .collect::<Vec<_>>()
        .join("\n"))
}
