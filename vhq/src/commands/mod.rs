use std::path::Path;

use crate::{
    cli::{
        CreateFileArgs, CreateFolderArgs, ImportArgs, ItemArgs, MoveArgs, ProjectsArgs, ProjectsCommands, RenameArgs,
        RequestArgs, TreeArgs, WriteArgs,
    },
    AppContext,
};
use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use tokio::{fs, io::AsyncReadExt};
use tracing::{info, warn};
use vhq_core::{
    api,
    storage::{FileContent, ImportFile, ImportOutcome, ItemId, Project, ProjectCategory, ProjectStructure},
};

mod output;
pub use output::render_tree;

// --- Helpers ---

/// Finds an item by relative path, falling back to treating `reference` as an ID.
fn find_item(structure: &ProjectStructure, reference: &str) -> ItemId {
    structure
        .item_at(reference)
        .map(|item| item.id.clone())
        .unwrap_or_else(|| ItemId::new(reference))
}

async fn resolve_item(project: &Project, reference: &str) -> Result<ItemId> {
    let structure = project.structure().await?;
    Ok(find_item(&structure, reference))
}

async fn resolve_optional(project: &Project, reference: Option<&str>) -> Result<Option<ItemId>> {
    match reference {
        Some(reference) => Ok(Some(resolve_item(project, reference).await?)),
        None => Ok(None),
    }
}

async fn read_input(from: Option<&Path>) -> Result<String> {
    match from {
        Some(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await.context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

// --- Handler Functions ---

pub async fn handle_projects(args: ProjectsArgs, cx: &AppContext) -> Result<()> {
    match args.command {
        ProjectsCommands::List { json } => {
            let catalog = cx.store.list_projects().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
                return Ok(());
            }
            if catalog.is_empty() {
                println!("No projects found in {}", cx.store.projects_root().display());
                return Ok(());
            }
            for category in ProjectCategory::ALL {
                let projects = catalog.category(category);
                if projects.is_empty() {
                    continue;
                }
                println!("{}", style(format!("{} ({})", category, category.dir_name())).bold());
                for project in projects {
                    println!("  {}  {}", project.title, style(&project.path).dim());
                }
            }
        }
        ProjectsCommands::Create { category, name } => {
            let summary = cx.store.create_project(category, &name).await?;
            info!("Created project {}", summary.path);
            println!("Created project {}", style(&summary.path).green());
        }
        ProjectsCommands::Delete { project, force } => {
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete project '{}' and all of its files?", project))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            cx.store.delete_project(&project).await?;
            println!("Deleted project {}", project);
        }
    }
    Ok(())
}

pub async fn handle_tree(args: TreeArgs, cx: &AppContext) -> Result<()> {
    let structure = cx.project(&args.project).await?.structure().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
    } else {
        print!("{}", render_tree(&structure, args.ids));
    }
    Ok(())
}

pub async fn handle_create_file(args: CreateFileArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let parent = resolve_optional(&project, args.parent.as_deref()).await?;
    let content = match (&args.content, &args.from) {
        (Some(content), _) => content.clone(),
        (None, Some(from)) => read_input(Some(from.as_path())).await?,
        (None, None) => String::new(),
    };
    let structure = project.create_file(&args.name, &content, parent.as_ref()).await?;
    print!("{}", render_tree(&structure, false));
    Ok(())
}

pub async fn handle_create_folder(args: CreateFolderArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let parent = resolve_optional(&project, args.parent.as_deref()).await?;
    let structure = project.create_folder(&args.name, parent.as_ref()).await?;
    print!("{}", render_tree(&structure, false));
    Ok(())
}

pub async fn handle_write(args: WriteArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let item = resolve_item(&project, &args.item).await?;
    let content = read_input(args.from.as_deref()).await?;
    project.update_content(&item, &content).await?;
    println!("Wrote {} bytes to {}", content.len(), args.item);
    Ok(())
}

pub async fn handle_cat(args: ItemArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let item = resolve_item(&project, &args.item).await?;
    match project.read_content(&item).await? {
        FileContent::Text { text } => print!("{}", text),
        FileContent::Binary { size } => println!("{}", style(format!("<binary file, {} bytes>", size)).dim()),
    }
    Ok(())
}

pub async fn handle_rename(args: RenameArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let item = resolve_item(&project, &args.item).await?;
    let structure = project.rename(&item, &args.new_name).await?;
    print!("{}", render_tree(&structure, false));
    Ok(())
}

pub async fn handle_move(args: MoveArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let item = resolve_item(&project, &args.item).await?;
    let target = resolve_optional(&project, args.to.as_deref()).await?;
    let structure = project.move_item(&item, target.as_ref()).await?;
    print!("{}", render_tree(&structure, false));
    Ok(())
}

pub async fn handle_remove(args: ItemArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let item = resolve_item(&project, &args.item).await?;
    let structure = project.delete(&item).await?;
    print!("{}", render_tree(&structure, false));
    Ok(())
}

pub async fn handle_import(args: ImportArgs, cx: &AppContext) -> Result<()> {
    let project = cx.project(&args.project).await?;
    let parent = resolve_optional(&project, args.parent.as_deref()).await?;

    let mut files = Vec::new();
    for path in &args.paths {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                warn!("Skipping {}: not a file name", path.display());
                continue;
            }
        };
        let content = read_input(Some(path.as_path())).await?;
        files.push(ImportFile::new(name, content));
    }

    if args.outline {
        for file in files {
            project.import_outline(&file.name, &file.content, parent.as_ref()).await?;
            println!("  Imported outline: {}", file.name);
        }
        print!("{}", render_tree(&project.structure().await?, false));
        return Ok(());
    }

    let (report, structure) = project.import(files, parent.as_ref()).await?;
    for outcome in &report.outcomes {
        match outcome {
            ImportOutcome::Imported { name, path, .. } => {
                println!("  {} {} -> {}", style("imported").green(), name, path)
            }
            ImportOutcome::Failed { name, message, .. } => {
                println!("  {} {}: {}", style("failed").red(), name, message)
            }
        }
    }
    println!("Imported {} of {} files", report.imported(), report.outcomes.len());
    print!("{}", render_tree(&structure, false));
    Ok(())
}

pub async fn handle_request(args: RequestArgs, cx: &AppContext) -> Result<()> {
    let json = read_input(args.file.as_deref()).await?;
    let response = api::handle_json(&cx.store, &json).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        anyhow::bail!("Request failed: {}", response.message.unwrap_or_default());
    }
    Ok(())
}
