use serde::{Deserialize, Serialize};

use super::document::InlineData;

/// Input handed to an analysis backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub resume_text: String,
    pub job_description: String,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub overall_score: f64,
    pub summary: String,
    pub scores: SubScores,
    pub ats_keywords: AtsKeywords,
    pub section_analysis: Vec<SectionAnalysis>,
    pub formatting_issues: Vec<String>,
    pub grammar_issues: Vec<String>,
    pub duplicate_content: Vec<String>,
    pub star_rewrites: Vec<RewrittenItem>,
    pub professional_summary_rewrite: String,
    pub cover_letter: String,
    pub hard_skills: Vec<SkillMatch>,
    pub soft_skills: Vec<SkillMatch>,
    pub optimized_resume_markdown: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubScores {
    pub impact: f64,
    pub brevity: f64,
    pub style: f64,
    pub keywords: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtsKeywords {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionAnalysis {
    pub name: String,
    pub status: SectionStatus,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionStatus {
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Missing,
}

/// A weak bullet point and its rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewrittenItem {
    pub original: String,
    pub improved: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub skill: String,
    pub found: bool,
    pub importance: Importance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    High,
    Medium,
    Low,
}
