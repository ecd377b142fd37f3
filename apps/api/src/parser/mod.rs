//! Resume text parser: heuristic section detection and structured extraction.
//!
//! Partitions unstructured resume text into labeled sections with a fixed
//! dictionary of header patterns, then runs section-specific extractors.
//! Header detection is best-effort: a short line mentioning "skills" inside
//! prose can be misclassified, and no exactness is guaranteed. Extraction is
//! deterministic for identical input.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("resume text cannot be empty")]
    EmptyInput,
}

/// Converts raw resume text into structured fields. Fails only on
/// empty/whitespace input; unparseable content best-effort-extracts into
/// possibly-empty fields.
pub trait TextExtractionCapability: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParsedResume, ParseError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub description: Vec<String>,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field_of_study: Option<String>,
    pub graduation_date: Option<String>,
    pub gpa: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub url: Option<String>,
}

/// Named section buffers keyed by canonical section name. Text before the
/// first detected header lands in the implicit `header` section.
pub type Sections = std::collections::BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResume {
    pub contact_info: ContactInfo,
    pub summary: Option<String>,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
    pub projects: Vec<Project>,
    pub certifications: Vec<String>,
    pub languages: Vec<String>,
    pub sections: Sections,
}

// ── Pattern tables ──────────────────────────────────────────────────────────

/// Canonical section names with their header patterns.
const SECTION_PATTERNS: &[(&str, &[&str])] = &[
    (
        "contact",
        &[
            r"contact\s+information?",
            r"personal\s+information?",
            r"contact\s+details?",
        ],
    ),
    (
        "summary",
        &[
            r"(?:professional\s+)?summary",
            r"(?:professional\s+)?profile",
            r"objective",
            r"about\s+me",
            r"overview",
            r"career\s+summary",
        ],
    ),
    (
        "experience",
        &[
            r"(?:work\s+|professional\s+|employment\s+)?experience",
            r"work\s+history",
            r"career\s+history",
            r"professional\s+background",
            r"employment",
        ],
    ),
    (
        "education",
        &[
            r"education(?:al\s+background)?",
            r"academic\s+background",
            r"qualifications?",
            r"degrees?",
        ],
    ),
    (
        "skills",
        &[
            r"(?:technical\s+)?skills?",
            r"core\s+competencies",
            r"expertise",
            r"proficiencies",
            r"technologies",
            r"programming\s+languages?",
        ],
    ),
    (
        "projects",
        &[
            r"projects?",
            r"personal\s+projects?",
            r"portfolio",
            r"achievements?",
            r"accomplishments?",
        ],
    ),
    (
        "certifications",
        &[
            r"certifications?",
            r"certificates?",
            r"licenses?",
            r"credentials?",
        ],
    ),
    (
        "languages",
        &[r"languages?", r"language\s+skills?", r"linguistic\s+skills?"],
    ),
];

/// Curated technology keywords: languages, frameworks, databases, cloud/devops,
/// data/ML tooling.
const TECH_PATTERN: &str = r"(?xi)
    \b(?:
        Python|Java|JavaScript|TypeScript|C\+\+|C\#|PHP|Ruby|Go|Rust|Swift|Kotlin|Scala
      | React|Angular|Vue\.js|Node\.js|Express|Django|Flask|Laravel|Spring|ASP\.NET
      | MySQL|PostgreSQL|MongoDB|Redis|SQLite|Oracle|SQL\s+Server|Cassandra|DynamoDB
      | AWS|Azure|Google\s+Cloud|Docker|Kubernetes|Jenkins|Git|GitHub|GitLab|CI/CD
      | TensorFlow|PyTorch|Scikit-learn|Pandas|NumPy|Apache\s+Spark|Hadoop|Tableau
    )\b";

/// Soft-skill keywords matched as substrings anywhere in the document.
const SKILL_KEYWORDS: &[&str] = &[
    "Machine Learning",
    "Data Analysis",
    "Web Development",
    "Mobile Development",
    "DevOps",
    "Cloud Computing",
    "Database Design",
    "API Development",
    "Project Management",
    "Agile",
    "Scrum",
    "Leadership",
    "Team Management",
];

static TECH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(TECH_PATTERN).unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap()
});
static LINKEDIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"linkedin\.com/(?:in|pub)/([A-Za-z0-9_-]+)")
        .case_insensitive(true)
        .build()
        .unwrap()
});
static GITHUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"github\.com/([A-Za-z0-9_-]+)")
        .case_insensitive(true)
        .build()
        .unwrap()
});
static WEBSITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://(?:www\.)?[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static PAGE_ARTIFACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"page\s+\d+(?:\s+of\s+\d+)?|confidential|proprietary")
        .case_insensitive(true)
        .build()
        .unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[•·▪▫◦‣⁃]\s*").unwrap());
static CITY_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+(?:\s[A-Z][a-z]+)*,\s+[A-Z]{2}$").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static GPA_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"GPA:?\s*([0-9.]+)")
        .case_insensitive(true)
        .build()
        .unwrap()
});
static POSITION_AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(.+?)\s+at\s+(.+?)(?:\s*[(,]([^)]+)[),])?$")
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// Date-range patterns: MM/YYYY, Month YYYY, or bare YYYY, each followed by
/// an end date or present/current.
static DATE_RANGE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\d{1,2}/\d{4})\s*[-–]\s*(\d{1,2}/\d{4}|present|current)",
        r"(?i)([A-Za-z]+\s+\d{4})\s*[-–]\s*([A-Za-z]+\s+\d{4}|present|current)",
        r"(?i)(\d{4})\s*[-–]\s*(\d{4}|present|current)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Lines that start a new experience entry: a company-suffix line, a
/// "Title at Company" line, or a seniority+role-title line.
static ENTRY_START_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[A-Z][A-Za-z\s,&]+(?:Inc|LLC|Corp|Company|Corporation|Ltd|Group|Technologies|Solutions|Systems|Software|Services)\b",
        r"^[A-Z][A-Za-z\s]+\s+(?:at|@)\s+[A-Z][A-Za-z\s]+",
        r"^(?:Senior|Junior|Lead|Principal|Staff|Associate|Assistant)?\s*[A-Z][A-Za-z\s]*(?:Engineer|Developer|Manager|Analyst|Specialist|Consultant|Director)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DEGREE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?:Bachelor(?:'s)?|Master(?:'s)?|PhD|Doctor(?:ate)?|Associate)\s*(?:of\s+)?(?:Science|Arts|Engineering|Business|Fine Arts|Philosophy)",
        r"\b(?:B\.?S\.?|M\.?S\.?|Ph\.?D\.?|M\.?B\.?A\.?|B\.?A\.?)\b",
        r"(?i)(?:Bachelor|Master|PhD|Doctorate)\s+(?:of\s+|in\s+)?[A-Za-z\s]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static FIELD_OF_STUDY_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\bin\s+([A-Za-z][A-Za-z\s]+)")
        .case_insensitive(true)
        .build()
        .unwrap()
});

static SUMMARY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(?:professional\s+)?(?:summary|profile|objective)[:.]?\s*")
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// A header line must be short; longer lines are treated as prose.
const MAX_HEADER_LINE_LEN: usize = 50;

/// Compiled header matchers per section: an exact form (`^pattern s?:?$`) and
/// an anchored form (`^pattern|pattern$`).
static SECTION_RES: LazyLock<Vec<(&'static str, Regex, Regex)>> = LazyLock::new(|| {
    SECTION_PATTERNS
        .iter()
        .flat_map(|(section, patterns)| {
            patterns.iter().map(|pattern| {
                (
                    *section,
                    Regex::new(&format!("^{pattern}s?:?$")).unwrap(),
                    Regex::new(&format!("^{pattern}|{pattern}$")).unwrap(),
                )
            })
        })
        .collect()
});

// ── Parser ──────────────────────────────────────────────────────────────────

/// Heuristic resume parser. Stateless; all patterns are compiled once.
#[derive(Debug, Default)]
pub struct ResumeParser;

impl TextExtractionCapability for ResumeParser {
    fn parse(&self, text: &str) -> Result<ParsedResume, ParseError> {
        self.parse_resume(text)
    }
}

impl ResumeParser {
    pub fn new() -> Self {
        ResumeParser
    }

    pub fn parse_resume(&self, text: &str) -> Result<ParsedResume, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let cleaned = clean_text(text);
        let sections = extract_sections(&cleaned);

        let contact_info = extract_contact_info(&cleaned);
        let summary = extract_summary(sections.get("summary").map(String::as_str).unwrap_or(""));
        let work_experience =
            extract_work_experience(sections.get("experience").map(String::as_str).unwrap_or(""));
        let education =
            extract_education(sections.get("education").map(String::as_str).unwrap_or(""));
        let skills = extract_skills(
            sections.get("skills").map(String::as_str).unwrap_or(""),
            &cleaned,
        );
        let projects =
            extract_projects(sections.get("projects").map(String::as_str).unwrap_or(""));
        let certifications = split_delimited(
            sections
                .get("certifications")
                .map(String::as_str)
                .unwrap_or(""),
            3,
        );
        let languages = extract_languages(
            sections.get("languages").map(String::as_str).unwrap_or(""),
        );

        Ok(ParsedResume {
            contact_info,
            summary,
            work_experience,
            education,
            skills,
            projects,
            certifications,
            languages,
            sections,
        })
    }
}

/// Normalizes line breaks, strips page-number/confidentiality artifacts, and
/// collapses intra-line whitespace while preserving line structure.
fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = PAGE_ARTIFACT_RE.replace_all(&text, "");

    text.lines()
        .map(|line| WHITESPACE_RE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Line-by-line scan: a detected header starts a new buffer, everything else
/// accumulates into the current one.
fn extract_sections(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current_section = "header".to_string();
    let mut current_content: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(section) = detect_section_header(line) {
            if !current_content.is_empty() {
                sections.insert(current_section.clone(), current_content.join("\n"));
            }
            current_section = section.to_string();
            current_content = Vec::new();
        } else {
            current_content.push(line);
        }
    }

    if !current_content.is_empty() {
        sections.insert(current_section, current_content.join("\n"));
    }

    sections
}

/// A line is a section header when it is short and one of the known header
/// patterns matches anchored at line start or end.
fn detect_section_header(line: &str) -> Option<&'static str> {
    if line.len() > MAX_HEADER_LINE_LEN {
        return None;
    }
    let line_lower = line.to_lowercase();

    for (section, exact, anchored) in SECTION_RES.iter() {
        if exact.is_match(&line_lower) || anchored.is_match(&line_lower) {
            return Some(section);
        }
    }
    None
}

/// Contact fields are matched over the whole document since contact lines are
/// often unlabeled. First match wins for each field.
fn extract_contact_info(text: &str) -> ContactInfo {
    let mut contact = ContactInfo::default();

    if let Some(m) = EMAIL_RE.find(text) {
        contact.email = Some(m.as_str().to_string());
    }
    if let Some(m) = PHONE_RE.find(text) {
        contact.phone = Some(m.as_str().to_string());
    }
    if let Some(caps) = LINKEDIN_RE.captures(text) {
        contact.linkedin = Some(format!("linkedin.com/in/{}", &caps[1]));
    }
    if let Some(caps) = GITHUB_RE.captures(text) {
        contact.github = Some(format!("github.com/{}", &caps[1]));
    }
    // First URL that is not a profile host already captured above.
    contact.website = WEBSITE_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .find(|url| {
            let lower = url.to_lowercase();
            !lower.contains("linkedin") && !lower.contains("github")
        });

    contact
}

fn extract_summary(summary_text: &str) -> Option<String> {
    if summary_text.is_empty() {
        return None;
    }
    let summary = WHITESPACE_RE.replace_all(summary_text, " ");
    let summary = SUMMARY_HEADER_RE.replace(summary.trim(), "").into_owned();

    if summary.len() > 20 {
        Some(summary)
    } else {
        None
    }
}

// ── Work experience ─────────────────────────────────────────────────────────

fn extract_work_experience(experience_text: &str) -> Vec<WorkExperience> {
    if experience_text.is_empty() {
        return Vec::new();
    }
    split_experience_entries(experience_text)
        .into_iter()
        .filter_map(|entry| parse_experience_entry(&entry))
        .collect()
}

/// Splits the experience section on lines that look like the start of a new
/// entry, falling back to blank-line gaps.
fn split_experience_entries(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut boundaries: Vec<usize> = Vec::new();

    for (i, line) in lines.iter().enumerate().skip(1) {
        let trimmed = line.trim();
        if ENTRY_START_RES.iter().any(|re| re.is_match(trimmed)) {
            boundaries.push(i);
        }
    }

    if boundaries.is_empty() {
        // Fallback: blank-line gaps.
        return text
            .split("\n\n")
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
    }

    let mut entries = Vec::new();
    let mut start = 0;
    for boundary in boundaries.into_iter().chain(std::iter::once(lines.len())) {
        let entry = lines[start..boundary].join("\n");
        let entry = entry.trim();
        if !entry.is_empty() {
            entries.push(entry.to_string());
        }
        start = boundary;
    }
    entries
}

fn parse_experience_entry(entry_text: &str) -> Option<WorkExperience> {
    if entry_text.len() < 20 {
        return None;
    }
    let lines: Vec<&str> = entry_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let first = *lines.first()?;

    let mut company: Option<String> = None;
    let mut position: Option<String> = None;

    if let Some(caps) = POSITION_AT_RE.captures(first) {
        position = Some(caps[1].trim().to_string());
        company = Some(caps[2].trim().to_string());
    } else if lines.len() > 1 {
        position = Some(first.to_string());
        let second_lower = lines[1].to_lowercase();
        if ["inc", "llc", "corp", "company", "ltd", "group"]
            .iter()
            .any(|ind| second_lower.contains(ind))
        {
            company = Some(lines[1].to_string());
        } else if let Some((pos, comp)) = first.split_once(" - ") {
            position = Some(pos.trim().to_string());
            company = Some(comp.trim().to_string());
        }
    }

    if company.is_none() && position.is_none() {
        return None;
    }

    // Dates live in the first three lines when present.
    let mut start_date = None;
    let mut end_date = None;
    'outer: for line in lines.iter().take(3) {
        for re in DATE_RANGE_RES.iter() {
            if let Some(caps) = re.captures(line) {
                start_date = Some(caps[1].to_string());
                end_date = Some(caps[2].to_string());
                break 'outer;
            }
        }
    }

    let mut location = None;
    let mut description = Vec::new();
    for line in lines.iter().skip(1) {
        if YEAR_RE.is_match(line)
            || line.to_lowercase().contains("present")
            || line.to_lowercase().contains("current")
        {
            continue;
        }
        if CITY_STATE_RE.is_match(line) {
            location = Some(line.to_string());
            continue;
        }
        let clean = BULLET_RE.replace(line, "").into_owned();
        if clean.len() > 10 {
            description.push(clean);
        }
    }

    let technologies = tech_matches(entry_text);

    Some(WorkExperience {
        company: company.unwrap_or_else(|| "Unknown Company".to_string()),
        position: position.unwrap_or_else(|| "Unknown Position".to_string()),
        start_date,
        end_date,
        location,
        description,
        technologies,
    })
}

/// Deduplicated, sorted technology keyword matches.
fn tech_matches(text: &str) -> Vec<String> {
    let set: BTreeSet<String> = TECH_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    set.into_iter().collect()
}

// ── Education ───────────────────────────────────────────────────────────────

fn extract_education(education_text: &str) -> Vec<Education> {
    if education_text.is_empty() {
        return Vec::new();
    }

    education_text
        .split("\n\n")
        .map(str::trim)
        .filter(|entry| entry.len() >= 10)
        .filter_map(parse_education_entry)
        .collect()
}

fn parse_education_entry(entry: &str) -> Option<Education> {
    let lines: Vec<&str> = entry
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut degree = None;
    let mut field_of_study = None;
    'degree: for line in &lines {
        for re in DEGREE_RES.iter() {
            if let Some(m) = re.find(line) {
                degree = Some(m.as_str().trim().to_string());
                if let Some(caps) = FIELD_OF_STUDY_RE.captures(line) {
                    field_of_study = Some(caps[1].trim().to_string());
                }
                break 'degree;
            }
        }
    }

    let institution = lines
        .iter()
        .find(|line| {
            let lower = line.to_lowercase();
            ["university", "college", "institute", "school"]
                .iter()
                .any(|kw| lower.contains(kw))
        })
        .map(|line| line.to_string());

    let graduation_date = lines
        .iter()
        .find_map(|line| YEAR_RE.find(line))
        .map(|m| m.as_str().to_string());

    let gpa = lines
        .iter()
        .find_map(|line| GPA_RE.captures(line))
        .map(|caps| caps[1].to_string());

    // An entry with neither institution nor degree is noise.
    if institution.is_none() && degree.is_none() {
        return None;
    }

    Some(Education {
        institution: institution.unwrap_or_else(|| "Unknown Institution".to_string()),
        degree: degree.unwrap_or_else(|| "Unknown Degree".to_string()),
        field_of_study,
        graduation_date,
        gpa,
    })
}

// ── Skills ──────────────────────────────────────────────────────────────────

/// Union of delimited skills-section tokens, technology keyword matches over
/// the full document, and known soft-skill keywords found anywhere.
/// Deduplicated and sorted.
fn extract_skills(skills_text: &str, full_text: &str) -> Vec<String> {
    let mut skills: BTreeSet<String> = BTreeSet::new();

    if !skills_text.is_empty() {
        for item in skills_text.split([',', ';', '|', '\n', '•', '·', '▪', '▫', '◦', '‣', '⁃']) {
            let item = item.trim();
            if item.len() > 1 && item.len() < 50 {
                skills.insert(item.to_string());
            }
        }
    }

    for tech in tech_matches(full_text) {
        skills.insert(tech);
    }

    let full_lower = full_text.to_lowercase();
    for keyword in SKILL_KEYWORDS {
        if full_lower.contains(&keyword.to_lowercase()) {
            skills.insert(keyword.to_string());
        }
    }

    skills.into_iter().collect()
}

// ── Projects / certifications / languages ───────────────────────────────────

fn extract_projects(projects_text: &str) -> Vec<Project> {
    if projects_text.is_empty() {
        return Vec::new();
    }

    projects_text
        .split("\n\n")
        .map(str::trim)
        .filter(|entry| entry.len() >= 20)
        .filter_map(|entry| {
            let lines: Vec<&str> = entry
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            let name = (*lines.first()?).to_string();
            let description = if lines.len() > 1 {
                lines[1..].join(" ")
            } else {
                name.clone()
            };
            let url = WEBSITE_RE.find(entry).map(|m| m.as_str().to_string());

            Some(Project {
                name,
                description,
                technologies: tech_matches(entry),
                url,
            })
        })
        .collect()
}

/// Splits on common delimiters and keeps items longer than `min_len`.
fn split_delimited(text: &str, min_len: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split([',', ';', '\n', '•', '·', '▪', '▫', '◦', '‣', '⁃'])
        .map(str::trim)
        .filter(|item| item.len() > min_len)
        .map(str::to_string)
        .collect()
}

static LANG_PROFICIENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)|\s*[-–]\s*\w+$").unwrap());

fn extract_languages(lang_text: &str) -> Vec<String> {
    if lang_text.is_empty() {
        return Vec::new();
    }
    lang_text
        .split([',', ';', '\n', '•', '·', '▪', '▫', '◦', '‣', '⁃'])
        .map(|item| LANG_PROFICIENCY_RE.replace_all(item, "").trim().to_string())
        .filter(|item| item.len() > 1)
        .collect()
}
