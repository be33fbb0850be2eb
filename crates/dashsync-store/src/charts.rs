use std::path::{Path, PathBuf};

use crate::data_dir::DataDirectory;
use crate::documents::ChartLinks;

/// Paths handed to a chart module's `render`: its linked data files that
/// currently exist, in link order.
pub fn resolve_chart_data(links: &ChartLinks, data: &DataDirectory, chart: &str) -> Vec<PathBuf> {
    links
        .linked(chart)
        .iter()
        .filter_map(|file| match data.artifact_path(file) {
            Ok(path) if path.is_file() => Some(path),
            _ => {
                tracing::debug!(chart, file = %file, "linked data file is missing");
                None
            }
        })
        .collect()
}

/// Chart modules in a charts directory, sorted.
pub fn list_chart_modules(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut modules: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.ends_with(".py") && name != "__init__.py")
        .collect();
    modules.sort();
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_existing_links_resolve_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDirectory::new(dir.path());
        std::fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();

        let mut links = ChartLinks::default();
        links.link(
            "sales.py",
            vec!["b.csv".into(), "gone.csv".into(), "a.csv".into(), "../etc".into()],
        );

        let paths = resolve_chart_data(&links, &data, "sales.py");
        assert_eq!(paths, vec![dir.path().join("b.csv"), dir.path().join("a.csv")]);
        assert!(resolve_chart_data(&links, &data, "other.py").is_empty());
    }

    #[test]
    fn chart_modules_are_python_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.py", "a.py", "__init__.py", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(list_chart_modules(dir.path()), vec!["a.py", "b.py"]);
    }
}
