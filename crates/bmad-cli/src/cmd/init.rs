use anyhow::Context;
use bmad_core::{config::Config, paths, state::WorkflowState};
use std::path::Path;

pub fn run(root: &Path, id: Option<&str>, name: Option<&str>) -> anyhow::Result<()> {
    let dir_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let name = name.map(str::to_string).unwrap_or(dir_name);
    let id = match id {
        Some(id) => id.to_string(),
        None => slugify(&name),
    };
    paths::validate_project_id(&id)?;

    println!("Initializing bmad in: {}", root.display());

    let docs = paths::docs_dir(root);
    std::fs::create_dir_all(&docs)
        .with_context(|| format!("failed to create {}", docs.display()))?;

    let created = Config::new(&id, &name)
        .create(root)
        .context("failed to write config.yaml")?;
    report(created, paths::CONFIG_FILE);

    let created = WorkflowState::new(&id)
        .create(root)
        .context("failed to write state.yaml")?;
    report(created, paths::STATE_FILE);

    println!("\nProject id: {id}");
    println!(
        "Put project documents in {}/ (brief.md, prd.md, architecture.md).",
        paths::DOCS_DIR
    );
    Ok(())
}

fn report(created: bool, file: &str) {
    if created {
        println!("  created: {file}");
    } else {
        println!("  exists:  {file}");
    }
}

/// Lowercase, with every run of other characters collapsed to one hyphen.
fn slugify(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let slug = out.trim_matches('-').to_string();
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_directory_names() {
        assert_eq!(slugify("My Shop"), "my-shop");
        assert_eq!(slugify("billing_v2"), "billing-v2");
        assert_eq!(slugify("--Odd__Name--"), "odd-name");
        assert_eq!(slugify("日本"), "project");
    }

    #[test]
    fn slugs_are_valid_project_ids() {
        for name in ["My Shop", "x", "A.B.C", "tmp.Xy12ab"] {
            paths::validate_project_id(&slugify(name)).unwrap();
        }
    }
}
