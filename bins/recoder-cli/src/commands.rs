// CLI commands for playing and maintaining Recoder
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use recoder_common::challenges::{day_number, ChallengeCatalog};
use recoder_common::progress::{FileProgressStore, ProgressTracker};
use recoder_common::types::{CaseResult, Challenge, ValidationResult};
use recoder_validator::extractor;
use recoder_validator::Validator;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::generator::ShareCardGenerator;

/// `~/.recoder/progress.json`, or a relative path when HOME is unset
pub fn default_progress_path() -> PathBuf {
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(".recoder").join("progress.json")
}

fn print_challenge(challenge: &Challenge) {
    let names = extractor::parameter_names(&challenge.buggy_code);

    println!("🐛 {} ({})\n", challenge.title, challenge.id);
    println!("{}\n", challenge.description);
    println!("{}", "─".repeat(60));
    println!("{}", challenge.buggy_code);
    println!("{}\n", "─".repeat(60));
    println!("📋 Test cases:");
    for (idx, case) in challenge.test_cases.iter().enumerate() {
        println!(
            "  {}. {} → {}",
            idx + 1,
            format_inputs(&names, &case.input),
            format_value(&case.expected_output)
        );
    }
}

/// Show the challenge for `date`
pub fn show_today(catalog: &ChallengeCatalog, date: NaiveDate) {
    println!("📅 Recoder - Day {} ({})\n", day_number(date), date);
    print_challenge(catalog.daily(date));
    println!("\n💡 Fix the function, save it to a file, then run: recoder-cli check --file <file>");
}

pub fn list_challenges(catalog: &ChallengeCatalog, today: NaiveDate) {
    println!("📋 Challenges:\n");
    println!("{:<10} {:<30} {:<6}", "ID", "TITLE", "TESTS");
    println!("{}", "─".repeat(50));

    let todays = &catalog.daily(today).id;
    for challenge in catalog.all() {
        let marker = if &challenge.id == todays { "  ← today" } else { "" };
        println!(
            "{:<10} {:<30} {:<6}{}",
            challenge.id,
            challenge.title,
            challenge.test_cases.len(),
            marker
        );
    }

    println!("\n✅ Total: {} challenge(s)", catalog.len());
}

pub fn show_challenge(catalog: &ChallengeCatalog, id: &str) -> Result<()> {
    let challenge = catalog
        .get(id)
        .with_context(|| format!("Challenge '{}' not found", id))?;
    print_challenge(challenge);
    Ok(())
}

/// Validate a solution file. Returns whether every case passed.
pub async fn check_solution(
    catalog: &ChallengeCatalog,
    validator: &Validator,
    file: &Path,
    challenge_id: Option<&str>,
    progress_file: &Path,
    today: NaiveDate,
) -> Result<bool> {
    let challenge = match challenge_id {
        Some(id) => catalog
            .get(id)
            .with_context(|| format!("Challenge '{}' not found", id))?,
        None => catalog.daily(today),
    };

    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    println!("🧪 Running {} test(s) for {}...\n", challenge.test_cases.len(), challenge.id);

    let result = validator.validate(&source, &challenge.test_cases).await;
    print!("{}", render_report(&result, &extractor::parameter_names(&source)));

    if !result.success {
        return Ok(false);
    }

    if !catalog.is_daily(&challenge.id, today) {
        println!("\n💡 Practice run: only today's challenge counts towards your streak");
        return Ok(true);
    }

    let tracker = ProgressTracker::new(FileProgressStore::new(progress_file));
    let streak = match tracker.record_result(&challenge.id, true, today).await? {
        Some(record) => record.effective_streak(today),
        None => 0,
    };

    println!("\n🔥 Streak: {} day(s)", streak);

    let card = ShareCardGenerator::new()?.render(day_number(today), streak, &result)?;
    println!("\n📣 Share your result:\n\n{}", card);

    Ok(true)
}

pub async fn show_progress(progress_file: &Path, today: NaiveDate) -> Result<()> {
    let record = ProgressTracker::new(FileProgressStore::new(progress_file))
        .progress()
        .await?;

    println!("📊 Progress ({})\n", progress_file.display());
    println!("🔥 Current streak: {}", record.effective_streak(today));
    match record.last_completed_date {
        Some(date) => println!("📅 Last completed: {}", date),
        None => println!("📅 Last completed: never"),
    }
    println!(
        "{}",
        if record.is_completed_on(today) {
            "✅ Today's challenge is done"
        } else {
            "⏳ Today's challenge is still open"
        }
    );

    if !record.completed_challenge_ids.is_empty() {
        let ids: Vec<&str> = record
            .completed_challenge_ids
            .iter()
            .map(String::as_str)
            .collect();
        println!("🏆 Completed: {}", ids.join(", "));
    }

    Ok(())
}

/// Every buggy snippet must fail a case and every reference solution must pass
pub async fn verify_catalog(catalog: &ChallengeCatalog, validator: &Validator) -> Result<()> {
    println!("🔍 Verifying {} challenge(s)...\n", catalog.len());

    let mut problems = Vec::new();

    for challenge in catalog.all() {
        let buggy = validator
            .validate(&challenge.buggy_code, &challenge.test_cases)
            .await;
        if let Some(error) = &buggy.error {
            problems.push(format!("{}: buggy code does not run: {}", challenge.id, error));
        } else if buggy.success {
            problems.push(format!("{}: buggy code passes every test case", challenge.id));
        }

        match &challenge.solution {
            Some(solution) => {
                let fixed = validator.validate(solution, &challenge.test_cases).await;
                if !fixed.success {
                    problems.push(format!(
                        "{}: reference solution passes {}/{}{}",
                        challenge.id,
                        fixed.passed_count,
                        fixed.total_count,
                        fixed
                            .error
                            .as_ref()
                            .map(|e| format!(" ({})", e))
                            .unwrap_or_default()
                    ));
                }
            }
            None => problems.push(format!("{}: no reference solution", challenge.id)),
        }

        let status = if problems.iter().any(|p| p.starts_with(&format!("{}:", challenge.id))) {
            "❌"
        } else {
            "✅"
        };
        println!("  {} {}", status, challenge.id);
    }

    if !problems.is_empty() {
        println!();
        for problem in &problems {
            println!("  ⚠️  {}", problem);
        }
        bail!("{} catalog problem(s) found", problems.len());
    }

    println!("\n✅ Catalog verified");
    Ok(())
}

/// Per-case report; the first failing case is shown in detail
pub fn render_report(result: &ValidationResult, parameter_names: &[String]) -> String {
    let mut out = String::new();

    if let Some(error) = &result.error {
        out.push_str(&format!("💥 Error: {}\n", error));
        return out;
    }

    let first_failure = result.first_failure();

    for (idx, case) in result.results.iter().enumerate() {
        if case.passed {
            out.push_str(&format!("  ✅ Test {}\n", idx + 1));
            continue;
        }

        out.push_str(&format!("  ❌ Test {} [{}]\n", idx + 1, case.status));
        if Some(idx) == first_failure {
            out.push_str(&render_failure(case, parameter_names));
        }
    }

    out.push('\n');
    if result.success {
        out.push_str(&format!("🎉 All {} tests passed!\n", result.total_count));
    } else {
        out.push_str(&format!(
            "📉 {}/{} tests passed\n",
            result.passed_count, result.total_count
        ));
    }
    out
}

fn render_failure(case: &CaseResult, parameter_names: &[String]) -> String {
    let mut out = format!(
        "      input:    {}\n      expected: {}\n",
        format_inputs(parameter_names, &case.input),
        format_value(&case.expected)
    );
    match (&case.error, &case.actual) {
        (Some(error), _) => out.push_str(&format!("      error:    {}\n", error)),
        (None, Some(actual)) => out.push_str(&format!("      actual:   {}\n", format_value(actual))),
        (None, None) => out.push_str("      actual:   undefined\n"),
    }
    out
}

fn format_inputs(parameter_names: &[String], input: &[Value]) -> String {
    input
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            format!(
                "{} = {}",
                extractor::input_label(parameter_names, idx),
                format_value(value)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recoder_common::types::CaseStatus;
    use recoder_validator::ValidatorConfig;
    use serde_json::json;

    fn case(passed: bool, actual: Option<Value>, error: Option<&str>) -> CaseResult {
        let status = match (passed, error) {
            (true, _) => CaseStatus::Passed,
            (false, Some(_)) => CaseStatus::RuntimeError,
            (false, None) => CaseStatus::WrongAnswer,
        };
        CaseResult {
            passed,
            status,
            input: vec![json!("hello")],
            expected: json!("olleh"),
            actual,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_report_highlights_first_failure() {
        let result = ValidationResult {
            success: false,
            passed_count: 1,
            total_count: 3,
            error: None,
            results: vec![
                case(true, Some(json!("olleh")), None),
                case(false, Some(json!("")), None),
                case(false, None, Some("boom")),
            ],
        };
        let report = render_report(&result, &["str".to_string()]);

        assert!(report.contains("✅ Test 1"));
        assert!(report.contains("❌ Test 2 [wrong_answer]"));
        assert!(report.contains("input:    str = \"hello\""));
        assert!(report.contains("actual:   \"\""));
        assert!(report.contains("❌ Test 3 [runtime_error]"));
        // Only the first failure is expanded
        assert!(!report.contains("boom"));
        assert!(report.contains("1/3 tests passed"));
    }

    #[test]
    fn test_report_whole_run_error() {
        let report = render_report(&ValidationResult::failed(3, "Could not find it"), &[]);
        assert_eq!(report, "💥 Error: Could not find it\n");
    }

    #[test]
    fn test_report_undefined_and_unnamed_params() {
        let result = ValidationResult {
            success: false,
            passed_count: 0,
            total_count: 1,
            error: None,
            results: vec![case(false, None, None)],
        };
        let report = render_report(&result, &[]);
        assert!(report.contains("param1 = \"hello\""));
        assert!(report.contains("actual:   undefined"));
    }

    #[tokio::test]
    async fn test_check_records_progress_for_today() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ChallengeCatalog::builtin().unwrap();
        let validator = Validator::from_config(&ValidatorConfig::default());
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let challenge = catalog.daily(today);

        let solution_file = dir.path().join("solution.js");
        fs::write(&solution_file, challenge.solution.as_deref().unwrap()).unwrap();
        let progress_file = dir.path().join("progress.json");

        let solved = check_solution(&catalog, &validator, &solution_file, None, &progress_file, today)
            .await
            .unwrap();
        assert!(solved);

        let record = ProgressTracker::new(FileProgressStore::new(&progress_file))
            .progress()
            .await
            .unwrap();
        assert_eq!(record.current_streak, 1);
        assert_eq!(record.last_completed_date, Some(today));
        assert!(record.has_completed(&challenge.id));
    }

    #[tokio::test]
    async fn test_check_buggy_code_fails_without_progress() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ChallengeCatalog::builtin().unwrap();
        let validator = Validator::from_config(&ValidatorConfig::default());
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let buggy_file = dir.path().join("buggy.js");
        fs::write(&buggy_file, &catalog.daily(today).buggy_code).unwrap();
        let progress_file = dir.path().join("progress.json");

        let solved = check_solution(&catalog, &validator, &buggy_file, None, &progress_file, today)
            .await
            .unwrap();
        assert!(!solved);
        assert!(!progress_file.exists());
    }

    #[tokio::test]
    async fn test_builtin_catalog_verifies() {
        let catalog = ChallengeCatalog::builtin().unwrap();
        let validator = Validator::from_config(&ValidatorConfig::default());
        verify_catalog(&catalog, &validator).await.unwrap();
    }
}
