use crate::report::{Issue, Severity};

const JURISDICTION_KEYWORDS: &[&str] = &["jurisdiction", "governing law"];
const ADGM_KEYWORDS: &[&str] = &["adgm", "abu dhabi global market"];
const ONSHORE_COURT_KEYWORDS: &[&str] = &[
    "uae federal court",
    "federal courts of the uae",
    "federal courts of the united arab emirates",
    "dubai court",
    "courts of dubai",
    "onshore court",
];
const SIGNATURE_KEYWORDS: &[&str] = &[
    "signed",
    "signature",
    "authorised signatory",
    "authorized signatory",
];
const SOFT_OBLIGATION_KEYWORDS: &[&str] = &["shall endeavour", "shall endeavor", "will endeavour", "will endeavor"];

/// Lines after a jurisdiction heading that still belong to the clause.
const CLAUSE_LOOKAHEAD: usize = 3;
const MAX_SECTION_CHARS: usize = 80;

/// Deterministic red-flag checks that run without a model.
pub fn check_document(document: &str, text: &str) -> Vec<Issue> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut issues = Vec::new();

    issues.extend(check_jurisdiction(document, &lines));
    issues.extend(check_onshore_courts(document, &lines));
    if let Some(i) = check_signatory(document, &lines) {
        issues.push(i);
    }
    issues.extend(check_soft_obligations(document, &lines));

    issues
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn section_label(line: &str) -> String {
    crate::util::truncate_chars(line, MAX_SECTION_CHARS).to_string()
}

/// Every jurisdiction or governing-law clause that never names ADGM. A clause
/// is its opening line plus the lookahead lines; a later mention inside the
/// same clause does not open a new one.
fn check_jurisdiction(document: &str, lines: &[&str]) -> Vec<Issue> {
    let lowered: Vec<String> = lines.iter().map(|l| l.to_lowercase()).collect();
    let mut issues = Vec::new();
    let mut start = 0;
    while let Some(offset) = lowered[start..]
        .iter()
        .position(|l| contains_any(l, JURISDICTION_KEYWORDS))
    {
        let opening = start + offset;
        let end = (opening + 1 + CLAUSE_LOOKAHEAD).min(lines.len());
        let mentions_adgm = lowered[opening..end]
            .iter()
            .any(|l| contains_any(l, ADGM_KEYWORDS));
        if !mentions_adgm {
            issues.push(Issue {
                document: document.to_string(),
                section: section_label(lines[opening]),
                issue: "Jurisdiction clause does not specify ADGM Courts".to_string(),
                severity: Severity::High,
                suggestion: "Update the jurisdiction clause to refer to the Courts of the Abu Dhabi Global Market (ADGM) and ADGM law.".to_string(),
            });
        }
        start = end;
    }
    issues
}

fn check_onshore_courts(document: &str, lines: &[&str]) -> Vec<Issue> {
    lines
        .iter()
        .filter(|l| contains_any(&l.to_lowercase(), ONSHORE_COURT_KEYWORDS))
        .map(|l| Issue {
            document: document.to_string(),
            section: section_label(l),
            issue: "Clause refers disputes to courts outside ADGM".to_string(),
            severity: Severity::High,
            suggestion: "Replace references to UAE Federal or Dubai courts with ADGM Courts.".to_string(),
        })
        .collect()
}

fn check_signatory(document: &str, lines: &[&str]) -> Option<Issue> {
    if lines.is_empty() {
        return None;
    }
    let has_block = lines
        .iter()
        .any(|l| contains_any(&l.to_lowercase(), SIGNATURE_KEYWORDS));
    if has_block {
        return None;
    }
    Some(Issue {
        document: document.to_string(),
        section: "Signatory Section".to_string(),
        issue: "No signature or signatory block found".to_string(),
        severity: Severity::Medium,
        suggestion: "Add a signature block naming each authorised signatory with date and capacity.".to_string(),
    })
}

fn check_soft_obligations(document: &str, lines: &[&str]) -> Vec<Issue> {
    lines
        .iter()
        .filter(|l| contains_any(&l.to_lowercase(), SOFT_OBLIGATION_KEYWORDS))
        .map(|l| Issue {
            document: document.to_string(),
            section: section_label(l),
            issue: "Non-binding obligation wording".to_string(),
            severity: Severity::Low,
            suggestion: "Use binding language (\"shall\") or state the standard of effort expected.".to_string(),
        })
        .collect()
}
