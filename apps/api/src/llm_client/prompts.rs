// All prompt constants for the analysis workflow, one pair per generative
// step. Templates carry {placeholders} filled by the step executors.

/// System prompt for job description analysis. Enforces JSON-only output;
/// the executor still tolerates prose responses.
pub const JOB_ANALYSIS_SYSTEM: &str =
    "You are an expert job market analyst. Analyze a job description and \
    extract structured information. \
    Respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Job analysis prompt template. Replace `{job_description}` and
/// `{additional_context}` before sending.
pub const JOB_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following job description and extract key information.

Return a JSON object with this EXACT schema (omit nothing, use null or [] when unknown):
{
  "job_title": "Senior Backend Engineer",
  "company_name": "Acme Corp",
  "industry": "Technology",
  "location": "Remote",
  "employment_type": "full-time",
  "experience_level": "senior",
  "requirements": ["5+ years Python", "PostgreSQL at scale"],
  "responsibilities": ["Design and operate ingestion services"],
  "preferred_qualifications": ["Kubernetes experience"],
  "keywords": ["Python", "PostgreSQL", "distributed systems"]
}

Rules:
- "requirements" are explicit must-haves: phrases like "required", "must have", minimum years.
- "preferred_qualifications" are nice-to-haves: "preferred", "bonus", "a plus".
- "keywords" are the ATS terms a resume for this role should contain: technologies, methodologies, industry terminology.
- "company_name" must be null unless the company is actually named in the posting.

ADDITIONAL CONTEXT: {additional_context}

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for company research.
pub const COMPANY_RESEARCH_SYSTEM: &str =
    "You are a business research specialist. Build a company profile from \
    the name and context provided. \
    Respond with valid JSON only. \
    Do NOT use markdown code fences. \
    If specific information is not known, say so in the field value rather \
    than inventing specifics.";

/// Company research prompt template. Replace `{company_name}` and `{context}`.
pub const COMPANY_RESEARCH_PROMPT_TEMPLATE: &str = r#"Research the company below and return a profile.

Return a JSON object with this EXACT schema:
{
  "company_name": "Acme Corp",
  "industry": "Developer tooling",
  "research_summary": "Two-paragraph overview of the business, its market and stage",
  "culture_insights": ["Values written communication", "Distributed-first"],
  "recent_developments": ["Series B announced this year"]
}

COMPANY NAME: {company_name}
ADDITIONAL CONTEXT: {context}"#;

/// System prompt for resume enhancement analysis.
pub const RESUME_ANALYSIS_SYSTEM: &str =
    "You are a professional resume consultant and career advisor. Analyze a \
    resume against job requirements and produce actionable feedback. \
    Respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Resume enhancement prompt template. Replace `{resume_content}` and
/// `{job_requirements}`.
pub const RESUME_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze this resume against the job requirements.

Return a JSON object with this EXACT schema:
{
  "overall_score": 7.5,
  "strengths": ["Strong distributed-systems background"],
  "weaknesses": ["No quantified outcomes"],
  "improvements": ["Add metrics to the top three bullets", "Surface PostgreSQL experience in the summary"],
  "ats_keywords": ["Kubernetes", "CI/CD"],
  "recommendations": "One short paragraph summarizing the highest-leverage changes"
}

"overall_score" is a 1-10 resume strength rating. "improvements" must be
ordered by priority, most impactful first.

RESUME:
{resume_content}

JOB REQUIREMENTS:
{job_requirements}"#;

/// System prompt for cover letter generation. Output is the letter itself,
/// not JSON.
pub const COVER_LETTER_SYSTEM: &str =
    "You are an expert cover letter writer with experience across industries. \
    Write a compelling, personalized cover letter of 3-4 paragraphs. \
    Use specific examples over generic phrases, and complement the resume \
    without repeating it. \
    Respond with the letter text only: no preamble, no commentary.";

/// Cover letter prompt template. Replace `{job_description}`, `{company_info}`,
/// `{resume_summary}`, `{tone}`, `{focus_areas}`.
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"Write a cover letter for this application.

TONE: {tone}
FOCUS AREAS: {focus_areas}

Structure:
1. Opening that shows genuine, specific interest in the role
2. Body paragraphs connecting the candidate's strongest relevant experience to the role and company
3. Professional closing with a clear next step

JOB DESCRIPTION:
{job_description}

COMPANY INFORMATION:
{company_info}

CANDIDATE SUMMARY:
{resume_summary}"#;

/// System prompt for skills gap analysis.
pub const SKILLS_ANALYSIS_SYSTEM: &str =
    "You are a skills assessment expert and career development specialist. \
    Compare current capabilities against job requirements. \
    Respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Skills gap prompt template. Replace `{current_skills}`,
/// `{job_requirements}`, `{industry}`.
pub const SKILLS_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the gap between the candidate's current skills and the job requirements.

Return a JSON object with this EXACT schema:
{
  "current_skills": ["Python", "PostgreSQL"],
  "missing_skills": ["Kubernetes", "Terraform"],
  "skill_gaps": ["No infrastructure-as-code experience"],
  "learning_priorities": ["Kubernetes first: it appears in both requirements and responsibilities"],
  "analysis_summary": "One short paragraph on overall skill fit"
}

"missing_skills" must list only skills the job requires that the candidate
lacks, highest-impact first.

CURRENT SKILLS (from resume):
{current_skills}

JOB REQUIREMENTS:
{job_requirements}

INDUSTRY CONTEXT:
{industry}"#;
