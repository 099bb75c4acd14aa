//! Template resolution through lookup directories, includes and reload mode.

use anyhow::Result;
use serde_json::{Value, json};
use swinf_template::core::TemplateError;
use swinf_template::templating::{Encoding, RenderOptions, TemplateRef, TemplateSource};
use swinf_template::test_utils::TemplateDir;

#[test]
fn test_layout_with_includes() -> Result<()> {
    let views = TemplateDir::new()?
        .with_template("header.tpl", "<header>{{ site }}</header>\n")?
        .with_template("footer.shtml", "<footer>(c) {{ year }}</footer>\n")?
        .with_template(
            "index.tpl",
            "%% include('header', site=site)\n<main>{{ body }}</main>\n%% include('footer', year=2024)\n",
        )?;
    let engine = views.engine(false)?;

    let page = engine.render(TemplateRef::name("index"), &json!({"site": "swinf", "body": "hello"}))?;
    assert_eq!(page, "<header>swinf</header>\n<main>hello</main>\n<footer>(c) 2024</footer>\n");
    Ok(())
}

#[test]
fn test_nested_directories_and_extension_order() -> Result<()> {
    let views = TemplateDir::new()?
        .with_template("pages/about", "bare")?
        .with_template("pages/about.tpl", "tpl")?
        .with_template("pages/contact.shtml", "shtml")?;
    let engine = views.engine(false)?;
    assert_eq!(engine.render(TemplateRef::name("pages/about"), &Value::Null)?, "bare");
    assert_eq!(engine.render(TemplateRef::name("pages/contact"), &Value::Null)?, "shtml");
    Ok(())
}

#[test]
fn test_first_lookup_directory_wins() -> Result<()> {
    let theme = TemplateDir::new()?.with_template("button.tpl", "theme")?;
    let base = TemplateDir::new()?.with_template("button.tpl", "base")?.with_template("card.tpl", "card")?;
    let options =
        RenderOptions::default().with_lookup(vec![theme.path().to_path_buf(), base.path().to_path_buf()]);
    let engine = base.engine(false)?;

    assert_eq!(engine.render_with(TemplateRef::name("button"), &Value::Null, &options)?, "theme");
    assert_eq!(engine.render_with(TemplateRef::name("card"), &Value::Null, &options)?, "card");
    assert_eq!(engine.render(TemplateRef::name("button"), &Value::Null)?, "base");
    Ok(())
}

#[test]
fn test_unresolved_name_lists_lookup() -> Result<()> {
    let views = TemplateDir::new()?;
    let engine = views.engine(false)?;
    let err = engine.render(TemplateRef::name("missing"), &Value::Null).unwrap_err();
    match err {
        TemplateError::ResolutionFailed {
            name,
            lookup,
        } => {
            assert_eq!(name, "missing");
            assert_eq!(lookup, vec![views.path().to_path_buf()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_include_errors_report_included_template() -> Result<()> {
    let views = TemplateDir::new()?
        .with_template("broken.tpl", "line one\n{{ undefined_thing }}\n")?
        .with_template("page.tpl", "%% include('broken')\n")?;
    let engine = views.engine(false)?;
    let err = engine.render(TemplateRef::name("page"), &Value::Null).unwrap_err();
    assert_eq!(err.template(), Some("broken"));
    assert_eq!(err.line(), Some(2));
    Ok(())
}

#[test]
fn test_reload_mode_sees_included_edits() -> Result<()> {
    let views = TemplateDir::new()?
        .with_template("part.tpl", "old")?
        .with_template("page.tpl", "[{% include('part') %}]")?;
    let engine = views.engine(true)?;
    assert_eq!(engine.render(TemplateRef::name("page"), &Value::Null)?, "[old]");

    views.write("part.tpl", "new")?;
    assert_eq!(engine.render(TemplateRef::name("page"), &Value::Null)?, "[new]");
    Ok(())
}

#[test]
fn test_latin1_templates() -> Result<()> {
    let views = TemplateDir::new()?;
    let path = views.path().join("caf.tpl");
    std::fs::write(&path, b"caf\xe9 {{ n }}")?;

    let mut config = views.config();
    config.encoding = Encoding::Latin1;
    let engine = swinf_template::templating::TemplateEngine::from_config(config)?;
    assert_eq!(engine.render(TemplateRef::name("caf"), &json!({"n": 1}))?, "café 1");

    let utf8 = views.engine(false)?;
    assert!(matches!(utf8.render(TemplateRef::name("caf"), &Value::Null).unwrap_err(), TemplateError::ReadFailed { .. }));

    let source = TemplateSource::from_file(&path, Encoding::Latin1)?;
    assert_eq!(source.text(), "café {{ n }}");
    Ok(())
}

#[test]
fn test_bare_text_is_source_not_a_lookup() -> Result<()> {
    let views = TemplateDir::new()?.with_template("index.tpl", "from file")?;
    let engine = views.engine(false)?;
    assert_eq!(engine.render("index", &Value::Null)?, "index");
    assert_eq!(engine.render(TemplateRef::name("index"), &Value::Null)?, "from file");
    assert_eq!(TemplateRef::from("a\nb"), TemplateRef::source("a\nb"));
    assert_eq!(TemplateRef::source("x").identity(), "<inline>");
    Ok(())
}
