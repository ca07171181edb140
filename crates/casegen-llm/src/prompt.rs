//! Prompt construction for guideline-driven test suite generation.

use crate::provider::{CompletionRequest, SamplingParams};

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 20_000;

pub const SYSTEM_INSTRUCTION: &str = "You are an expert healthcare software QA engineer \
specializing in Clinical Decision Support Systems testing.";

const SEPARATOR: &str = "========================================";

const INSTRUCTIONS: &str = "\
CONTEXT:
The document above contains clinical guidelines, treatment protocols, diagnostic pathways, \
hospital SOPs or care guidelines that define decision logic for a Clinical Decision Support \
System: decision paths and branching logic, clinical thresholds, exception handling rules, \
escalation protocols and multi-condition scenarios.

YOUR MISSION:
Generate 8-10 focused, high-value test cases that validate the decision logic and rule-based \
behavior described in this guideline. Cover decision paths, threshold boundaries (just below, \
at, and just above each threshold), combined conditions, incomplete patient data, conflicting \
rules, and unusual but valid clinical situations. Include specific clinical values (vital \
signs, lab results, ages) and prioritize safety-critical scenarios.

OUTPUT FORMAT (Markdown):

# Test Suite: [Clinical Guideline Name]

## Overview
**Guideline Type**: [Treatment Protocol / Diagnostic Pathway / ICU Protocol / Emergency Care]
**Criticality**: Critical
**Focus**: CDSS Decision Logic Validation

## Test Cases

### TC-001: [Title]
**Priority**: [P0-Critical / P1-High / P2-Medium]
**Type**: [Decision Path / Threshold / Combined Conditions / Missing Data / Rule Conflict]
**Scenario**: [clinical scenario]
**Input Conditions**: [patient age, vitals, symptoms, labs, history]
**Expected Decision/Action**: [expected behavior, recommendation, rationale]
**Validation Points**: [checks tied to guideline sections]

Continue through TC-010 following this pattern.

## Implementation Notes
List the key decision points, thresholds and escalation criteria, the test data \
requirements, and compliance checks (de-identified test data, clinical accuracy, safety).

Generate exactly 8-10 concise test cases. Quality over quantity.";

/// Builds bounded prompts from extracted document text.
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    max_chars: usize,
    params: SamplingParams,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_PROMPT_CHARS,
            params: SamplingParams::default(),
        }
    }
}

impl PromptBuilder {
    #[must_use]
    pub fn new(max_chars: usize, params: SamplingParams) -> Self {
        Self { max_chars, params }
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    #[must_use]
    pub fn build(&self, document_text: &str) -> CompletionRequest {
        let excerpt = truncate_chars(document_text, self.max_chars);
        let prompt = format!(
            "CLINICAL GUIDELINE/PROTOCOL DOCUMENT:\n{SEPARATOR}\n{excerpt}\n{SEPARATOR}\n\n{INSTRUCTIONS}\n"
        );
        CompletionRequest {
            system: Some(SYSTEM_INSTRUCTION.to_owned()),
            prompt,
            params: self.params,
        }
    }
}

/// Return the prefix of `text` holding at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
