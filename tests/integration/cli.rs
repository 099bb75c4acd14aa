//! The `swinf-tpl` binary.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use swinf_template::test_utils::TemplateDir;

fn swinf_tpl() -> Command {
    let mut cmd = Command::cargo_bin("swinf-tpl").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("SWINF_TEMPLATE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_render_inline() {
    swinf_tpl()
        .args(["render", "--inline", "Hi {{name}}!{% if show %} Welcome{% endif %}"])
        .args(["--var", "name=<Bob>", "--var", "show=true"])
        .assert()
        .success()
        .stdout("Hi &lt;Bob&gt;! Welcome");
}

#[test]
fn test_render_named_with_values_file() -> Result<()> {
    let views = TemplateDir::new()?
        .with_template("page.tpl", "%% for item in items:\n* {{ item }}\n%% end\n{{ note }}\n")?
        .with_template("values.json", r#"{"items": ["a", "b"], "note": "file"}"#)?;

    swinf_tpl()
        .arg("render")
        .arg("page")
        .arg("--lookup")
        .arg(views.path())
        .arg("--values")
        .arg(views.path().join("values.json"))
        .args(["--var", "note=flag"])
        .assert()
        .success()
        .stdout("* a\n* b\nflag\n");
    Ok(())
}

#[test]
fn test_render_to_file_and_append() -> Result<()> {
    let views = TemplateDir::new()?.with_template("line.tpl", "{{ n }}\n")?;
    let out = views.path().join("out.txt");

    for (n, append) in [("1", false), ("2", true)] {
        let mut cmd = swinf_tpl();
        cmd.arg("render").arg("line").arg("-l").arg(views.path()).args(["--var", &format!("n={n}")]);
        cmd.arg("-o").arg(&out);
        if append {
            cmd.arg("--append");
        }
        cmd.assert().success().stdout(predicate::str::is_empty());
    }
    assert_eq!(fs::read_to_string(&out)?, "1\n2\n");
    Ok(())
}

#[test]
fn test_render_missing_template_fails() -> Result<()> {
    let views = TemplateDir::new()?;
    swinf_tpl()
        .arg("render")
        .arg("nowhere")
        .arg("--lookup")
        .arg(views.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Template 'nowhere' not found"))
        .stderr(predicate::str::contains("--lookup"));
    Ok(())
}

#[test]
fn test_render_expression_error_shows_line() {
    swinf_tpl()
        .args(["render", "--inline", "ok\n{{ missing }}\n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at line 2"))
        .stderr(predicate::str::contains("name 'missing' is not defined"));
}

#[test]
fn test_check_tree() -> Result<()> {
    let views = TemplateDir::new()?
        .with_template("good.tpl", "%% if a:\nA\n%% end\n")?
        .with_template("notes.md", "%% if unclosed:\n")?
        .with_template("nested/also_good.shtml", "{{ x }}")?;

    swinf_tpl()
        .arg("check")
        .arg("--lookup")
        .arg(views.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ good.tpl"))
        .stdout(predicate::str::contains("✓ nested/also_good.shtml"))
        .stdout(predicate::str::contains("notes.md").not());

    views.write("bad.tpl", "%% for x in xs:\n{{ x }}\n")?;
    swinf_tpl()
        .arg("check")
        .arg("--lookup")
        .arg(views.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("✗ bad.tpl"))
        .stderr(predicate::str::contains("1 of 3 template(s) failed to compile"));
    Ok(())
}

#[test]
fn test_check_named_with_listing() -> Result<()> {
    let views = TemplateDir::new()?.with_template("index.tpl", "Hi {{ name }}\n%% if admin:\nadmin\n%% end\n")?;
    swinf_tpl()
        .args(["check", "index", "--listing", "--lookup"])
        .arg(views.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ index"))
        .stdout(predicate::str::contains("if admin:"));
    Ok(())
}

#[test]
fn test_config_file_flag() -> Result<()> {
    let views = TemplateDir::new()?.with_template("raw.tpl", "{{ html }}")?;
    let config = views.write(
        "swinf.toml",
        &format!("noescape = true\nlookup = [\"{}\"]\n", views.path().display().to_string().replace('\\', "/")),
    )?;

    swinf_tpl()
        .arg("--config")
        .arg(&config)
        .args(["render", "raw", "--var", "html=<b>x</b>"])
        .assert()
        .success()
        .stdout("<b>x</b>");
    Ok(())
}
