// JavaScript glue evaluated by the sandbox
//
// The submission is spliced into the body of `run`, which only closes over
// the global object and its `args` parameter. Every call re-evaluates the
// body, so top-level state in the submission starts fresh per case.
// Globals created by a case (sloppy-mode implicit assignments, writes to
// `globalThis`) are deleted before and after every call. Uncatchable engine
// aborts skip `finally`, hence the sweep on entry as well.
// Arguments arrive as JSON text and are re-parsed inside the engine; the
// return value leaves as a JSON envelope.

use crate::engine::EngineError;
use serde_json::Value;

const PRELUDE: &str = r#"if (typeof console === "undefined") {
  globalThis.console = { log() {}, info() {}, warn() {}, error() {}, debug() {} };
}
"#;

/// Script whose completion value is the callable `(argsJson) => envelope`
pub fn build(source: &str, entry: &str) -> String {
    format!(
        r#"{PRELUDE}
(function (run, parse, stringify, names, global) {{
  var baseline = Object.create(null);
  var initial = names(global);
  for (var i = 0; i < initial.length; i++) {{
    baseline[initial[i]] = true;
  }}
  function sweep() {{
    var current = names(global);
    for (var i = 0; i < current.length; i++) {{
      if (!baseline[current[i]]) {{
        try {{
          delete global[current[i]];
        }} catch (_) {{}}
      }}
    }}
  }}
  function describe(e) {{
    try {{
      return (e && e.message) || String(e);
    }} catch (_) {{
      return "uncaught exception";
    }}
  }}
  function invoke(argsJson) {{
    var value;
    try {{
      value = run(parse(argsJson));
    }} catch (e) {{
      return stringify({{ ok: false, message: describe(e) }});
    }}
    try {{
      return stringify({{ ok: true, value: value }});
    }} catch (e) {{
      return stringify({{ ok: false, message: describe(e) }});
    }}
  }}
  return function (argsJson) {{
    sweep();
    try {{
      return invoke(argsJson);
    }} finally {{
      sweep();
    }}
  }};
}})(function (args) {{
{source}
;
return {entry}(...args);
}}, JSON.parse, JSON.stringify, Object.getOwnPropertyNames, globalThis)
"#
    )
}

/// Decode the envelope produced by the callable
///
/// `{"ok":true}` without a `value` key means the function returned
/// something with no JSON projection.
pub fn decode(envelope: &str) -> Result<Option<Value>, EngineError> {
    let envelope: Value =
        serde_json::from_str(envelope).map_err(|e| EngineError::Marshal(e.to_string()))?;

    match envelope.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(envelope.get("value").cloned()),
        Some(false) => Err(EngineError::Runtime(
            envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception")
                .to_string(),
        )),
        None => Err(EngineError::Marshal(format!(
            "malformed result envelope: {}",
            envelope
        ))),
    }
}
