use super::Project;
use crate::output::{print_json, print_table};
use anyhow::Context;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct RenderedContext<'a> {
    query: &'a str,
    context: String,
}

pub fn run(root: &Path, query: Option<&str>, context: bool, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    let cache = project.shard_cache();

    if let (true, Some(query)) = (context, query) {
        let context = cache
            .build_task_context(project.id(), query)
            .context("failed to load project documents")?;
        if json {
            return print_json(&RenderedContext { query, context });
        }
        println!("{context}");
        return Ok(());
    }

    let shards = match query {
        Some(q) => cache.get_relevant_shards(project.id(), q),
        None => cache.get_document_shards(project.id()),
    }
    .context("failed to load project documents")?;

    if json {
        return print_json(&shards);
    }
    if shards.is_empty() {
        println!("No shards.");
        return Ok(());
    }
    let rows = shards
        .iter()
        .map(|s| {
            vec![
                s.document.clone(),
                s.order.to_string(),
                s.title.clone(),
                s.content.chars().count().to_string(),
            ]
        })
        .collect();
    print_table(&["DOCUMENT", "#", "TITLE", "CHARS"], rows);
    Ok(())
}
