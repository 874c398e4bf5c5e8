/// End-to-end tests for the validation pipeline
///
/// These tests drive `Validator::validate` through the embedded engine and
/// through a scripted engine:
/// 1. Correct submissions pass, buggy ones fail with the expected actuals
/// 2. Whole-run failures (no function, syntax error) evaluate nothing
/// 3. Case failures stay local to their case
/// 4. Argument mutation and implicit globals never leak between cases
/// 5. Fatal engine errors stop the run and mark the rest not run

#[cfg(test)]
mod pipeline_tests {
    use crate::config::ValidatorConfig;
    use crate::engine::{CompiledProgram, EngineError, EngineLimits, ExecutionEngine};
    use crate::executor::Validator;
    use async_trait::async_trait;
    use recoder_common::challenges::ChallengeCatalog;
    use recoder_common::types::{CaseStatus, TestCase};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn validator() -> Validator {
        Validator::from_config(&ValidatorConfig::default())
    }

    fn case(input: Vec<Value>, expected: Value) -> TestCase {
        TestCase::new(input, expected)
    }

    fn reverse_cases() -> Vec<TestCase> {
        vec![
            case(vec![json!("hello")], json!("olleh")),
            case(vec![json!("recoder")], json!("redocer")),
            case(vec![json!("")], json!("")),
        ]
    }

    /// Test: every reference solution in the catalog passes, every buggy
    /// starter fails at least one case
    #[tokio::test]
    async fn test_catalog_solutions_pass() {
        let catalog = ChallengeCatalog::builtin().unwrap();
        let validator = validator();

        for challenge in catalog.all() {
            let solution = challenge.solution.as_deref().unwrap();
            let result = validator.validate(solution, &challenge.test_cases).await;
            assert!(result.success, "{} solution failed: {:?}", challenge.id, result);
            assert_eq!(result.passed_count, result.total_count);

            let buggy = validator
                .validate(&challenge.buggy_code, &challenge.test_cases)
                .await;
            assert!(!buggy.success, "{} buggy code passed", challenge.id);
            assert!(buggy.error.is_none(), "{} buggy code did not run", challenge.id);
        }
    }

    /// Test: accumulation bug returns the empty string
    #[tokio::test]
    async fn test_buggy_reverse_string() {
        let source = r#"function reverseString(str){let r="";for(let i=str.length-1;i>=0;i--)r+str[i];return r;}"#;
        let result = validator()
            .validate(source, &[case(vec![json!("hello")], json!("olleh"))])
            .await;

        assert!(!result.success);
        assert_eq!(result.results.len(), 1);
        assert!(!result.results[0].passed);
        assert_eq!(result.results[0].status, CaseStatus::WrongAnswer);
        assert_eq!(result.results[0].actual, Some(json!("")));
        assert_eq!(result.results[0].error, None);
    }

    /// Test: the fixed accumulation passes
    #[tokio::test]
    async fn test_fixed_reverse_string() {
        let source = r#"function reverseString(str){let r="";for(let i=str.length-1;i>=0;i--)r+=str[i];return r;}"#;
        let result = crate::validate(source, &reverse_cases()).await;

        assert!(result.success);
        assert_eq!(result.passed_count, 3);
        assert_eq!(result.results[0].actual, Some(json!("olleh")));
        assert!(result.results[0].passed);
    }

    /// Test: unbalanced braces are a whole-run failure
    #[tokio::test]
    async fn test_syntax_error_is_whole_run() {
        let source = "function reverseString(str) {\n  let r = \"\";\n  for (let i = 0; i < str.length; i++) {\n    r = str[i] + r;\n  \n  return r;\n";
        let result = validator().validate(source, &reverse_cases()).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(result.results.is_empty());
        assert_eq!(result.passed_count, 0);
        assert_eq!(result.total_count, 3);
    }

    /// Test: empty or function-less source never reaches the engine
    #[tokio::test]
    async fn test_no_function_is_whole_run() {
        let validator = validator();
        for source in ["", "   \n", "const reverseString = (s) => s;", "return 42;"] {
            let result = validator.validate(source, &reverse_cases()).await;
            assert!(!result.success);
            assert_eq!(
                result.error.as_deref(),
                Some("Could not find a valid function declaration in the code.")
            );
            assert!(result.results.is_empty());
            assert_eq!(result.total_count, 3);
        }
    }

    /// Test: a throw on case 2 does not affect cases 1 and 3
    #[tokio::test]
    async fn test_exception_isolation() {
        let source = r#"
function check(n) {
  if (n === 2) {
    throw new Error("two is not allowed");
  }
  return n * 10;
}
"#;
        let cases = vec![
            case(vec![json!(1)], json!(10)),
            case(vec![json!(2)], json!(20)),
            case(vec![json!(3)], json!(30)),
        ];
        let result = validator().validate(source, &cases).await;

        assert_eq!(result.results.len(), 3);
        assert!(result.results[0].passed);
        assert!(!result.results[1].passed);
        assert_eq!(result.results[1].status, CaseStatus::RuntimeError);
        assert_eq!(result.results[1].error.as_deref(), Some("two is not allowed"));
        assert_eq!(result.results[1].actual, None);
        assert!(result.results[2].passed);
        assert_eq!(result.passed_count, 2);
        assert!(!result.success);
    }

    /// Test: mutating the argument cannot leak into other cases, in either order
    #[tokio::test]
    async fn test_argument_mutation_isolated() {
        let source = r#"
function sumAndClear(arr) {
  let total = 0;
  while (arr.length > 0) {
    total += arr.pop();
  }
  arr.push("mutated");
  return total;
}
"#;
        let shared = json!([1, 2, 3]);
        let forward = vec![
            case(vec![shared.clone()], json!(6)),
            case(vec![shared.clone()], json!(6)),
            case(vec![json!([10])], json!(10)),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let validator = validator();
        let first = validator.validate(source, &forward).await;
        let second = validator.validate(source, &backward).await;

        assert!(first.success, "{:?}", first);
        assert!(second.success, "{:?}", second);
        // Reported inputs are unchanged
        assert_eq!(first.results[0].input, vec![json!([1, 2, 3])]);
        assert_eq!(forward[0].input, vec![json!([1, 2, 3])]);

        let mut reversed_results = second.results.clone();
        reversed_results.reverse();
        assert_eq!(first.results, reversed_results);
    }

    /// Test: two runs with the same inputs give the same result
    #[tokio::test]
    async fn test_idempotent() {
        let source = r#"
var seen = seen || 0;
function reverseString(str) {
  seen += 1;
  return str.split("").reverse().join("") + (seen > 1 ? "!" : "");
}
"#;
        let validator = validator();
        let first = validator.validate(source, &reverse_cases()).await;
        let second = validator.validate(source, &reverse_cases()).await;
        assert_eq!(first, second);
    }

    /// Test: fresh arrays compare structurally
    #[tokio::test]
    async fn test_structural_equality() {
        let source = "function pair() { return [0, 1]; }";
        let result = validator()
            .validate(source, &[case(vec![], json!([0, 1]))])
            .await;
        assert!(result.success);

        let source = "function obj() { return { b: [1, 2], a: null }; }";
        let result = validator()
            .validate(source, &[case(vec![], json!({ "a": null, "b": [1, 2] }))])
            .await;
        assert!(result.success);
    }

    /// Test: JSON projection semantics for undefined and NaN
    #[tokio::test]
    async fn test_json_projection() {
        let undefined = validator()
            .validate("function f() { return undefined; }", &[case(vec![], Value::Null)])
            .await;
        assert!(!undefined.success);
        assert_eq!(undefined.results[0].actual, None);
        assert_eq!(undefined.results[0].error, None);

        let nan = validator()
            .validate("function f() { return NaN; }", &[case(vec![], Value::Null)])
            .await;
        assert!(nan.success);
    }

    /// Test: several arguments are bound positionally
    #[tokio::test]
    async fn test_positional_arguments() {
        let source = "function twoSum(nums, target) { return [nums.length, target]; }";
        let result = validator()
            .validate(source, &[case(vec![json!([3, 2, 4]), json!(6)], json!([3, 6]))])
            .await;
        assert!(result.success);
    }

    /// Test: only the first declared function is called
    #[tokio::test]
    async fn test_first_function_is_entry() {
        let source = r#"
function helper(x) { return x + 1; }
function solve(x) { return helper(x) * 100; }
"#;
        let result = validator()
            .validate(source, &[case(vec![json!(1)], json!(2))])
            .await;
        assert!(result.success);
    }

    /// Test: an endless loop fails its own case and later cases still run
    #[tokio::test]
    async fn test_infinite_loop_is_time_limit() {
        let config = ValidatorConfig {
            limits: EngineLimits {
                loop_iteration_limit: 50_000,
                ..EngineLimits::default()
            },
            ..ValidatorConfig::default()
        };
        let source = "function f(n) { if (n === 0) { for (;;) {} } return n; }";
        let cases = vec![
            case(vec![json!(0)], json!(0)),
            case(vec![json!(1)], json!(1)),
        ];
        let result = Validator::from_config(&config).validate(source, &cases).await;

        assert_eq!(result.results[0].status, CaseStatus::TimeLimitExceeded);
        assert!(result.results[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("time limit exceeded"));
        assert!(result.results[1].passed);
        assert_eq!(result.passed_count, 1);
    }

    /// Test: a recursive solution a thousand frames deep passes
    #[tokio::test]
    async fn test_deep_recursion_passes() {
        let source = r#"
function sumTo(n) {
  if (n === 0) return 0;
  return n + sumTo(n - 1);
}
"#;
        let cases = vec![
            case(vec![json!(10)], json!(55)),
            case(vec![json!(1000)], json!(500500)),
        ];
        let result = validator().validate(source, &cases).await;
        assert!(result.success, "{:?}", result);
    }

    /// Test: runaway recursion is a runtime error for its case only
    #[tokio::test]
    async fn test_infinite_recursion_is_runtime_error() {
        let source = r#"
function fact(n) {
  if (n === 1) return 1;
  return n * fact(n - 1);
}
"#;
        let cases = vec![
            case(vec![json!(0)], json!(1)),
            case(vec![json!(5)], json!(120)),
        ];
        let result = validator().validate(source, &cases).await;

        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].status, CaseStatus::RuntimeError);
        assert_eq!(
            result.results[0].error.as_deref(),
            Some("Maximum call stack size exceeded")
        );
        assert!(result.results[1].passed);
        assert_eq!(result.passed_count, 1);
    }

    /// Test: an implicit global written by one case is gone for the next
    #[tokio::test]
    async fn test_implicit_globals_do_not_leak() {
        let source = r#"
function countCalls(x) {
  if (typeof counter === "undefined") counter = 0;
  counter++;
  return counter;
}
"#;
        let cases = vec![
            case(vec![json!("a")], json!(1)),
            case(vec![json!("b")], json!(1)),
        ];
        let result = validator().validate(source, &cases).await;
        assert!(result.success, "{:?}", result);
    }

    /// Test: oversized submissions are rejected before compilation
    #[tokio::test]
    async fn test_source_size_guardrail() {
        let config = ValidatorConfig {
            max_source_bytes: 32,
            ..ValidatorConfig::default()
        };
        let source = format!("function f() {{ return \"{}\"; }}", "x".repeat(64));
        let result = Validator::from_config(&config)
            .validate(&source, &reverse_cases())
            .await;
        assert!(result.error.unwrap().contains("maximum size"));
        assert!(result.results.is_empty());
    }

    /// Scripted engine: replays a fixed list of outcomes
    struct ScriptedEngine {
        outcomes: Arc<Mutex<VecDeque<Result<Option<Value>, EngineError>>>>,
        invocations: Arc<Mutex<usize>>,
    }

    struct ScriptedProgram {
        outcomes: Arc<Mutex<VecDeque<Result<Option<Value>, EngineError>>>>,
        invocations: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn compile(
            &self,
            _source: &str,
            _entry: &str,
        ) -> Result<Box<dyn CompiledProgram>, EngineError> {
            Ok(Box::new(ScriptedProgram {
                outcomes: self.outcomes.clone(),
                invocations: self.invocations.clone(),
            }))
        }
    }

    #[async_trait]
    impl CompiledProgram for ScriptedProgram {
        async fn invoke(
            &mut self,
            _args: &[Value],
            _timeout: Duration,
        ) -> Result<Option<Value>, EngineError> {
            *self.invocations.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    /// Test: a wall-clock timeout stops the run; later cases are not run
    #[tokio::test]
    async fn test_wall_clock_timeout_halts_run() {
        let invocations = Arc::new(Mutex::new(0));
        let engine = ScriptedEngine {
            outcomes: Arc::new(Mutex::new(VecDeque::from(vec![
                Ok(Some(json!(1))),
                Err(EngineError::TimeLimitExceeded),
                Ok(Some(json!(3))),
            ]))),
            invocations: invocations.clone(),
        };
        let validator = Validator::new(Arc::new(engine), &ValidatorConfig::default());
        let cases = vec![
            case(vec![json!(1)], json!(1)),
            case(vec![json!(2)], json!(2)),
            case(vec![json!(3)], json!(3)),
        ];

        let result = validator.validate("function f(x) { return x; }", &cases).await;

        assert_eq!(*invocations.lock().unwrap(), 2);
        assert_eq!(result.results.len(), 3);
        assert_eq!(result.results[0].status, CaseStatus::Passed);
        assert_eq!(result.results[1].status, CaseStatus::TimeLimitExceeded);
        assert_eq!(result.results[1].error.as_deref(), Some("time limit exceeded"));
        assert_eq!(result.results[2].status, CaseStatus::NotRun);
        assert!(result.results[2].error.as_deref().unwrap().starts_with("not run"));
        assert_eq!(result.passed_count, 1);
        assert!(!result.success);
    }

    /// Test: a compile failure from the engine is a whole-run error
    #[tokio::test]
    async fn test_engine_compile_error_is_whole_run() {
        struct Broken;

        #[async_trait]
        impl ExecutionEngine for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }

            async fn compile(
                &self,
                _source: &str,
                _entry: &str,
            ) -> Result<Box<dyn CompiledProgram>, EngineError> {
                Err(EngineError::Unavailable("no worker".into()))
            }
        }

        let validator = Validator::new(Arc::new(Broken), &ValidatorConfig::default());
        let result = validator
            .validate("function f() {}", &reverse_cases())
            .await;
        assert_eq!(
            result.error.as_deref(),
            Some("execution backend unavailable: no worker")
        );
        assert!(result.results.is_empty());
        assert_eq!(result.total_count, 3);
    }
}
