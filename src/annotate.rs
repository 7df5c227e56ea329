use crate::report::Issue;

pub fn suggestion_marker(issue: &Issue) -> String {
    format!("[Suggestion: {}]", issue.suggestion)
}

/// Text used to locate an issue in the document: the section label, or the
/// start of the description when the label is empty.
pub fn anchor_for(issue: &Issue) -> String {
    let section = issue.section.trim();
    if section.is_empty() {
        crate::util::truncate_chars(&issue.issue, 50).to_lowercase()
    } else {
        section.to_lowercase()
    }
}

/// Appends a suggestion marker to the first line containing each issue's
/// anchor; unmatched issues are appended as new lines at the end.
pub fn annotate_text(text: &str, issues: &[Issue]) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut trailing = Vec::new();

    for issue in issues {
        let anchor = anchor_for(issue);
        let marker = suggestion_marker(issue);
        let hit = if anchor.is_empty() {
            None
        } else {
            lines
                .iter_mut()
                .find(|l| l.to_lowercase().contains(&anchor))
        };
        match hit {
            Some(line) => {
                line.push(' ');
                line.push_str(&marker);
            }
            None => trailing.push(marker),
        }
    }

    lines.extend(trailing);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Severity;

    fn issue(section: &str, suggestion: &str) -> Issue {
        Issue {
            document: "a.txt".into(),
            section: section.into(),
            issue: "Something is wrong".into(),
            severity: Severity::Medium,
            suggestion: suggestion.into(),
        }
    }

    #[test]
    fn marks_matching_line_case_insensitively() {
        let out = annotate_text("1. Name\n2. JURISDICTION\n3. Shares", &[issue("2. Jurisdiction", "Name ADGM")]);
        assert_eq!(out, "1. Name\n2. JURISDICTION [Suggestion: Name ADGM]\n3. Shares");
    }

    #[test]
    fn unmatched_issue_goes_to_the_end() {
        let out = annotate_text("Body", &[issue("Signatory Section", "Add signatures")]);
        assert_eq!(out, "Body\n[Suggestion: Add signatures]");
    }

    #[test]
    fn original_text_is_untouched_without_issues() {
        assert_eq!(annotate_text("a\nb", &[]), "a\nb");
    }
}
