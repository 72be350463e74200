// src/repository/categorize.rs

//! Dependency categorization
//!
//! One bounded pass over the table: first `requires` edges are transposed
//! into `required_by` edges, then packages nobody requires are attached to
//! one of two umbrella packages based on their CTAN path and file tree.
//! Edges are collected before they are applied, so the scan never observes
//! its own mutations.

use crate::dospath;
use crate::package::PackageTable;
use tracing::warn;

/// Umbrella for orphaned LaTeX contrib packages.
pub const LATEX_UMBRELLA: &str = "_miktex-latex-packages";
/// Umbrella for orphaned outline-font packages.
pub const FONTS_UMBRELLA: &str = "_miktex-fonts-type1";

fn is_outline_font(path: &str) -> bool {
    dospath::is_parent_dir("texmf/fonts/type1", path)
        || dospath::is_parent_dir("texmf/fonts/truetype", path)
}

/// Resolve `requires` into `required_by`, then attach orphans to umbrellas.
pub fn categorize(table: &mut PackageTable) {
    // transpose requires -> required_by
    let mut edges: Vec<(String, String)> = Vec::new();
    for info in table.values() {
        for required in &info.required_packages {
            if table.contains(required) {
                edges.push((required.clone(), info.id.clone()));
            } else {
                warn!("dependency problem: {} is required by {}", required, info.id);
            }
        }
    }
    for (required, dependent) in edges {
        if let Some(info) = table.get_mut(&required) {
            info.required_by.push(dependent);
        }
    }

    // attach orphans to umbrella packages
    let have_latex = table.contains(LATEX_UMBRELLA);
    let have_fonts = table.contains(FONTS_UMBRELLA);

    let mut attachments: Vec<(String, &'static str)> = Vec::new();
    for info in table.values() {
        if !info.required_by.is_empty() {
            continue;
        }
        if have_latex && info.ctan_path.starts_with("/macros/latex/contrib/") {
            attachments.push((info.id.clone(), LATEX_UMBRELLA));
        } else if have_fonts
            && info.ctan_path.starts_with("/fonts/")
            && info.run_files.iter().any(|f| is_outline_font(f))
        {
            attachments.push((info.id.clone(), FONTS_UMBRELLA));
        }
    }
    for (orphan, umbrella) in attachments {
        if let Some(info) = table.get_mut(&orphan) {
            info.required_by.push(umbrella.to_string());
        }
        if let Some(info) = table.get_mut(umbrella) {
            info.required_packages.push(orphan);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageInfo;

    fn package(id: &str) -> PackageInfo {
        PackageInfo {
            id: id.to_string(),
            display_name: id.to_string(),
            ..PackageInfo::default()
        }
    }

    #[test]
    fn test_required_by_is_transpose_of_requires() {
        let mut table = PackageTable::new();
        let mut foo = package("foo");
        foo.required_packages = vec!["bar".to_string(), "baz".to_string()];
        table.insert(foo);
        table.insert(package("bar"));
        table.insert(package("baz"));

        categorize(&mut table);

        assert_eq!(table.get("bar").unwrap().required_by, vec!["foo"]);
        assert_eq!(table.get("baz").unwrap().required_by, vec!["foo"]);
        // transpose both ways
        for p in table.values() {
            for q in &p.required_packages {
                assert!(table.get(q).unwrap().required_by.contains(&p.id));
            }
            for q in &p.required_by {
                assert!(table.get(q).unwrap().required_packages.contains(&p.id));
            }
        }
    }

    #[test]
    fn test_unknown_requirement_is_not_fatal() {
        let mut table = PackageTable::new();
        let mut foo = package("foo");
        foo.required_packages = vec!["missing".to_string()];
        table.insert(foo);
        categorize(&mut table);
        assert!(table.get("foo").unwrap().required_by.is_empty());
    }

    #[test]
    fn test_latex_orphan_attaches_to_umbrella() {
        let mut table = PackageTable::new();
        let mut foo = package("foo");
        foo.ctan_path = "/macros/latex/contrib/foo".to_string();
        table.insert(foo);
        table.insert(package(LATEX_UMBRELLA));

        categorize(&mut table);

        assert_eq!(table.get("foo").unwrap().required_by, vec![LATEX_UMBRELLA]);
        assert_eq!(
            table.get(LATEX_UMBRELLA).unwrap().required_packages,
            vec!["foo"]
        );
    }

    #[test]
    fn test_font_orphan_needs_outline_run_file() {
        let mut table = PackageTable::new();
        let mut with_font = package("urwfont");
        with_font.ctan_path = "/fonts/urw".to_string();
        with_font.run_files = vec!["texmf/fonts/type1/urw/a.pfb".to_string()];
        table.insert(with_font);

        let mut metrics_only = package("metrics");
        metrics_only.ctan_path = "/fonts/metrics".to_string();
        metrics_only.run_files = vec!["texmf/fonts/tfm/m.tfm".to_string()];
        table.insert(metrics_only);

        table.insert(package(FONTS_UMBRELLA));

        categorize(&mut table);

        assert_eq!(
            table.get("urwfont").unwrap().required_by,
            vec![FONTS_UMBRELLA]
        );
        assert!(table.get("metrics").unwrap().required_by.is_empty());
    }

    #[test]
    fn test_depended_on_package_is_not_attached() {
        let mut table = PackageTable::new();
        let mut foo = package("foo");
        foo.ctan_path = "/macros/latex/contrib/foo".to_string();
        table.insert(foo);
        let mut user = package("user");
        user.required_packages = vec!["foo".to_string()];
        table.insert(user);
        table.insert(package(LATEX_UMBRELLA));

        categorize(&mut table);

        assert_eq!(table.get("foo").unwrap().required_by, vec!["user"]);
    }

    #[test]
    fn test_no_umbrella_no_attachment() {
        let mut table = PackageTable::new();
        let mut foo = package("foo");
        foo.ctan_path = "/macros/latex/contrib/foo".to_string();
        table.insert(foo);
        categorize(&mut table);
        assert!(table.get("foo").unwrap().required_by.is_empty());
    }
}
