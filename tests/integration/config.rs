//! Configuration files driving the engine.

use anyhow::Result;
use serde_json::json;
use swinf_template::config::TemplateConfig;
use swinf_template::templating::{TemplateEngine, TemplateRef};
use swinf_template::test_utils::TemplateDir;

#[test]
fn test_custom_syntax_from_file() -> Result<()> {
    let views = TemplateDir::new()?.with_template(
        "list.tpl",
        "#: for x in xs:\n- {{ x }}\n#: end\n<? if done ?>done<? endif ?>",
    )?;
    let config_path = views.write(
        "swinf.toml",
        &format!(
            r##"
lookup = ["{}"]
noescape = true

[syntax]
single_line = "#:"
block_start = "<?"
block_end = "?>"
"##,
            views.path().display().to_string().replace('\\', "/")
        ),
    )?;

    let config = TemplateConfig::load(&config_path)?;
    let engine = TemplateEngine::from_config(config)?;
    let rendered = engine.render(TemplateRef::name("list"), &json!({"xs": ["<a>", "b"], "done": true}))?;
    assert_eq!(rendered, "- <a>\n- b\ndone");
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let views = TemplateDir::new()?;
    let path = views.write("swinf.toml", "[syntax]\nblock_start = \"\"\n")?;
    assert!(TemplateConfig::load(&path).is_err());

    let path = views.write("swinf.toml", "extensions = []\n")?;
    assert!(TemplateConfig::load(&path).is_err());
    Ok(())
}

#[test]
fn test_config_round_trips_through_toml() -> Result<()> {
    let config = TemplateConfig::default();
    let text = toml::to_string(&config)?;
    let parsed: TemplateConfig = toml::from_str(&text)?;
    assert_eq!(parsed, config);
    Ok(())
}
