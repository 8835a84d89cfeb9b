use crate::storage::{validate_name, Error, ItemPath, ProjectStore, Result, WorkspaceChange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Kind of creative work; each category is one directory under the projects root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Book,
    Script,
    Blog,
}

impl ProjectCategory {
    pub const ALL: [ProjectCategory; 3] = [ProjectCategory::Book, ProjectCategory::Script, ProjectCategory::Blog];

    /// Directory name of the category under the projects root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ProjectCategory::Book => "libros",
            ProjectCategory::Script => "scripts",
            ProjectCategory::Blog => "blog_posts",
        }
    }

    /// The category stored in the directory `name`, if any.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.dir_name() == name)
    }
}

impl fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProjectCategory::Book => "book",
            ProjectCategory::Script => "script",
            ProjectCategory::Blog => "blog",
        })
    }
}

impl FromStr for ProjectCategory {
    type Err = String;

    /// Accepts both the category name and its directory name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "book" | "libros" => Ok(ProjectCategory::Book),
            "script" | "scripts" => Ok(ProjectCategory::Script),
            "blog" | "blog_posts" => Ok(ProjectCategory::Blog),
            other => Err(format!("unknown project category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Directory name of the project.
    pub id: String,
    /// Directory name with underscores shown as spaces.
    pub title: String,
    pub category: ProjectCategory,
    /// Path to pass to [`ProjectStore::project`].
    pub path: String,
}

impl ProjectSummary {
    fn new(category: ProjectCategory, dir_name: &str) -> Self {
        ProjectSummary {
            id: dir_name.to_string(),
            title: dir_name.replace('_', " "),
            category,
            path: format!("{}/{}", category.dir_name(), dir_name),
        }
    }
}

/// All projects under the projects root, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub books: Vec<ProjectSummary>,
    pub scripts: Vec<ProjectSummary>,
    pub blogs: Vec<ProjectSummary>,
}

impl Catalog {
    pub fn category(&self, category: ProjectCategory) -> &[ProjectSummary] {
        match category {
            ProjectCategory::Book => &self.books,
            ProjectCategory::Script => &self.scripts,
            ProjectCategory::Blog => &self.blogs,
        }
    }

    fn category_mut(&mut self, category: ProjectCategory) -> &mut Vec<ProjectSummary> {
        match category {
            ProjectCategory::Book => &mut self.books,
            ProjectCategory::Script => &mut self.scripts,
            ProjectCategory::Blog => &mut self.blogs,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectSummary> {
        self.books.iter().chain(&self.scripts).chain(&self.blogs)
    }

    pub fn len(&self) -> usize {
        self.books.len() + self.scripts.len() + self.blogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProjectStore {
    /// Lists the project directories of every category, sorted by name.
    ///
    /// Missing category directories are treated as empty. Hidden entries and
    /// plain files are ignored.
    #[instrument(skip(self), fields(root = %self.projects_root().display()))]
    pub async fn list_projects(&self) -> Result<Catalog> {
        let mut catalog = Catalog::default();

        for category in ProjectCategory::ALL {
            let dir = self.projects_root().join(category.dir_name());
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Category directory {} does not exist", dir.display());
                    continue;
                }
                Err(e) => return Err(Error::Io(e)),
            };

            let projects = catalog.category_mut(category);
            while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
                let Ok(name) = entry.file_name().into_string() else {
                    warn!("Skipping project with non UTF-8 name in {}", dir.display());
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                if fs::metadata(entry.path()).await.is_ok_and(|meta| meta.is_dir()) {
                    projects.push(ProjectSummary::new(category, &name));
                }
            }
            projects.sort_by(|a, b| a.id.to_lowercase().cmp(&b.id.to_lowercase()).then_with(|| a.id.cmp(&b.id)));
        }

        debug!("Found {} projects", catalog.len());
        Ok(catalog)
    }

    /// Creates an empty project directory in `category`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] for unusable names, [`Error::AlreadyExists`] if a
    /// project of that name exists in the category.
    #[instrument(skip(self))]
    pub async fn create_project(&self, category: ProjectCategory, name: &str) -> Result<ProjectSummary> {
        validate_name(name)?;
        let category_dir = self.projects_root().join(category.dir_name());
        fs::create_dir_all(&category_dir).await.map_err(Error::Io)?;

        let root = category_dir.join(name);
        fs::create_dir(&root).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(ItemPath::root().join(category.dir_name()).join(name))
            } else {
                Error::Io(e)
            }
        })?;

        let summary = ProjectSummary::new(category, name);
        debug!("Created project {}", root.display());
        self.publish(WorkspaceChange::ProjectCreated { project: summary.path.clone(), root });
        Ok(summary)
    }
}
