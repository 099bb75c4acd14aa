//! Whole-page rendering through the public engine API.

use anyhow::Result;
use serde_json::{Value, json};
use std::sync::Arc;
use swinf_template::core::TemplateError;
use swinf_template::expr::{EvalError, Evaluator, ExprEvaluator, Scope};
use swinf_template::templating::{Output, RenderOptions, TemplateEngine, TemplateRef};
use swinf_template::test_utils::init_test_logging;

const BLOG: &str = "\
<html>
<head><title>{{ title }}</title></head>
<body>
%% if posts:
<ul>
%% for post in posts:
  <li class=\"{{ 'draft' if post.draft else 'live' }}\">{{ post.title }}</li>
%% end
</ul>
%% else:
<p>No posts</p>
%% endif
{{! footer }}
</body>
</html>
";

#[test]
fn test_blog_page() -> Result<()> {
    init_test_logging(None);
    let engine = TemplateEngine::new();
    let values = json!({
        "title": "Tom & Jerry",
        "posts": [
            {"title": "First <post>", "draft": false},
            {"title": "Second", "draft": true},
        ],
        "footer": "<footer>bye</footer>",
    });

    let page = engine.render(BLOG, &values)?;
    assert_eq!(
        page,
        "<html>\n<head><title>Tom &amp; Jerry</title></head>\n<body>\n<ul>\n  \
         <li class=\"live\">First &lt;post&gt;</li>\n  <li class=\"draft\">Second</li>\n</ul>\n\
         <footer>bye</footer>\n</body>\n</html>\n"
    );

    let empty = engine.render(BLOG, &json!({"title": "t", "posts": [], "footer": ""}))?;
    assert!(empty.contains("<p>No posts</p>\n"));
    assert!(!empty.contains("<ul>"));
    Ok(())
}

#[test]
fn test_multi_line_tag_blocks() -> Result<()> {
    let source = "{%\n  total = 0\n  for n in numbers:\n    total += n\n  end\n%}\nsum={{ total }}";
    let engine = TemplateEngine::new();
    assert_eq!(engine.render(source, &json!({"numbers": [1, 2, 3]}))?, "sum=6");
    Ok(())
}

#[test]
fn test_compile_errors_carry_location() -> Result<()> {
    let engine = TemplateEngine::new();

    let unclosed = engine.render("a\n%% if x:\nb\n", &json!({"x": true})).unwrap_err();
    assert!(matches!(unclosed, TemplateError::UnbalancedBlock { .. }));

    let stray = engine.render("a\nb\n%% else:\n", &Value::Null).unwrap_err();
    assert!(matches!(stray, TemplateError::Syntax { line: 3, .. } | TemplateError::UnbalancedBlock { line: 3, .. }));

    let bad_expr = engine.render("ok\n{{ 1 + }}\n", &Value::Null).unwrap_err();
    assert_eq!(bad_expr.line(), Some(2));
    assert_eq!(bad_expr.template(), Some("<inline>"));
    Ok(())
}

#[test]
fn test_execute_appends_to_output() -> Result<()> {
    let engine = TemplateEngine::new();
    let program = engine.compile(TemplateRef::source("[{{ n }}]"))?;
    let mut output = Output::new();
    for n in 1..=3 {
        engine.execute(&program, &mut output, &json!({"n": n}), &RenderOptions::default())?;
    }
    assert_eq!(output.parts().len(), 9);
    assert_eq!(output.into_string(), "[1][2][3]");
    Ok(())
}

/// Evaluator that resolves every expression to its own source text.
struct EchoEvaluator;

impl Evaluator for EchoEvaluator {
    fn check_expression(&self, _source: &str) -> Result<(), String> {
        Ok(())
    }

    fn check_statement(&self, _source: &str) -> Result<(), String> {
        Ok(())
    }

    fn evaluate(&self, source: &str, _scope: &mut dyn Scope) -> Result<Value, EvalError> {
        Ok(Value::String(source.trim().to_string()))
    }

    fn execute(&self, _source: &str, _scope: &mut dyn Scope) -> Result<(), EvalError> {
        Ok(())
    }
}

#[test]
fn test_pluggable_evaluator() -> Result<()> {
    let engine = TemplateEngine::new();
    let options = RenderOptions::default().with_adapter(Arc::new(EchoEvaluator));
    assert_eq!(engine.render_with("<i>{{ <a.b> }}</i>", &Value::Null, &options)?, "<i>&lt;a.b&gt;</i>");

    let echo_engine = TemplateEngine::new().with_evaluator(Arc::new(EchoEvaluator));
    assert_eq!(echo_engine.render("{{ anything at all }}", &Value::Null)?, "anything at all");

    let default = ExprEvaluator::new();
    assert!(default.check_expression("a +").is_err());
    Ok(())
}
