// Share card rendering

use anyhow::{Context, Result};
use handlebars::Handlebars;
use recoder_common::types::ValidationResult;
use serde::Serialize;

const SHARE_CARD: &str = "share-card";

const SHARE_CARD_TEMPLATE: &str = "Recoder - Day {{day}}
Streak: {{streak}}
{{boxes}}

Can you fix the code?";

#[derive(Serialize)]
struct ShareCardData {
    day: u32,
    streak: u32,
    boxes: String,
}

pub struct ShareCardGenerator {
    handlebars: Handlebars<'static>,
}

impl ShareCardGenerator {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // Plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(SHARE_CARD, SHARE_CARD_TEMPLATE)
            .context("Failed to register share card template")?;
        Ok(Self { handlebars })
    }

    pub fn render(&self, day: u32, streak: u32, result: &ValidationResult) -> Result<String> {
        let data = ShareCardData {
            day,
            streak,
            boxes: result_boxes(result),
        };
        self.handlebars
            .render(SHARE_CARD, &data)
            .context("Failed to render share card")
    }
}

/// One square per case: green passed, red anything else
pub fn result_boxes(result: &ValidationResult) -> String {
    result
        .results
        .iter()
        .map(|r| if r.passed { "🟩" } else { "🟥" })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recoder_common::types::{CaseResult, CaseStatus};
    use serde_json::json;

    fn case(passed: bool) -> CaseResult {
        CaseResult {
            passed,
            status: if passed {
                CaseStatus::Passed
            } else {
                CaseStatus::WrongAnswer
            },
            input: vec![json!(1)],
            expected: json!(1),
            actual: Some(json!(if passed { 1 } else { 2 })),
            error: None,
        }
    }

    #[test]
    fn test_share_card() {
        let result = ValidationResult {
            success: false,
            passed_count: 2,
            total_count: 3,
            error: None,
            results: vec![case(true), case(true), case(false)],
        };
        let card = ShareCardGenerator::new().unwrap().render(42, 7, &result).unwrap();
        assert_eq!(
            card,
            "Recoder - Day 42\nStreak: 7\n🟩🟩🟥\n\nCan you fix the code?"
        );
    }

    #[test]
    fn test_boxes_empty_for_whole_run_error() {
        assert_eq!(result_boxes(&ValidationResult::failed(3, "bad")), "");
    }
}
