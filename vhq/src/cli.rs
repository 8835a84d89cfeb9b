use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vhq_core::storage::ProjectCategory;

/// Virtual Headquarters: manage project workspaces with stable item IDs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the `libros`, `scripts` and `blog_posts` directories.
    #[arg(long, global = true, env = "VHQ_PROJECTS_ROOT", default_value = "../GHOST_Proyectos")]
    pub projects_root: PathBuf,

    /// Extension given to new files without one (`none` to disable).
    #[arg(long, global = true, env = "VHQ_DEFAULT_EXTENSION", default_value = "md")]
    pub default_extension: String,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, create or delete projects.
    Projects(ProjectsArgs),
    /// Show the item tree of a project.
    Tree(TreeArgs),
    /// Create a file in a project.
    CreateFile(CreateFileArgs),
    /// Create a folder in a project.
    CreateFolder(CreateFolderArgs),
    /// Replace the content of a file (read from --from or stdin).
    Write(WriteArgs),
    /// Print the content of a file.
    Cat(ItemArgs),
    /// Rename a file or folder.
    Rename(RenameArgs),
    /// Move a file or folder to another folder.
    Mv(MoveArgs),
    /// Delete a file or folder with everything below it.
    Rm(ItemArgs),
    /// Import local files into a project.
    Import(ImportArgs),
    /// Handle one JSON request and print the JSON response.
    Request(RequestArgs),
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    pub command: ProjectsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProjectsCommands {
    /// List projects by category.
    List {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create an empty project.
    Create {
        /// book, script or blog (directory names are accepted too).
        category: ProjectCategory,
        /// Directory name of the project.
        name: String,
    },
    /// Delete a project and all of its files.
    Delete {
        /// Project path, e.g. `libros/My_Novel`.
        project: String,
        /// Skip confirmation.
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Project path, e.g. `libros/My_Novel`.
    pub project: String,

    /// Print the structure as JSON.
    #[arg(long)]
    pub json: bool,

    /// Show item IDs next to names.
    #[arg(long)]
    pub ids: bool,
}

#[derive(Args, Debug)]
pub struct CreateFileArgs {
    pub project: String,
    pub name: String,

    /// Parent folder, by ID or path. Defaults to the project root.
    #[arg(long, short)]
    pub parent: Option<String>,

    /// Initial content.
    #[arg(long, short, conflicts_with = "from")]
    pub content: Option<String>,

    /// Read the initial content from a local file.
    #[arg(long)]
    pub from: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CreateFolderArgs {
    pub project: String,
    pub name: String,

    /// Parent folder, by ID or path. Defaults to the project root.
    #[arg(long, short)]
    pub parent: Option<String>,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    pub project: String,
    /// File to overwrite, by ID or path.
    pub item: String,

    /// Read the new content from a local file instead of stdin.
    #[arg(long)]
    pub from: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ItemArgs {
    pub project: String,
    /// Item ID or path relative to the project root.
    pub item: String,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    pub project: String,
    pub item: String,
    pub new_name: String,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    pub project: String,
    pub item: String,

    /// Target folder, by ID or path. Defaults to the project root.
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub project: String,

    /// Local files to import.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target folder, by ID or path. Defaults to the project root.
    #[arg(long, short)]
    pub parent: Option<String>,

    /// Split each Markdown file into one file per heading.
    #[arg(long)]
    pub outline: bool,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Read the request from this file instead of stdin.
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}
