//! Inline script dependency parsing.
//!
//! Notebooks declare their requirements in a PEP 723 style comment block:
//!
//! ```text
//! # /// script
//! # dependencies = [
//! #     "numpy",
//! #     "scikit-image[extra]",
//! #     "mytool @ git+https://github.com/org/mytool",
//! # ]
//! # ///
//! ```
//!
//! Each declaration becomes one [`InstallDirective`], in declaration order.

use nbcolab_shared::RewriteConfig;

/// Markers delimiting and classifying a dependency list.
#[derive(Debug, Clone)]
pub struct DependencySyntax {
    /// Line prefix opening the list; the line itself is not a declaration.
    pub start_marker: String,
    /// Line prefix closing the list.
    pub end_marker: String,
    /// Substring marking a direct install from a source URL.
    pub source_url_marker: String,
}

impl From<&RewriteConfig> for DependencySyntax {
    fn from(config: &RewriteConfig) -> Self {
        Self {
            start_marker: config.start_marker.clone(),
            end_marker: config.end_marker.clone(),
            source_url_marker: config.source_url_marker.clone(),
        }
    }
}

impl Default for DependencySyntax {
    fn default() -> Self {
        Self::from(&RewriteConfig::default())
    }
}

/// One package to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallDirective {
    /// A package index requirement, possibly with extras.
    Package(String),
    /// A direct install from a VCS URL.
    Source(String),
}

impl InstallDirective {
    /// Render as a single line, e.g. `%pip install numpy`.
    ///
    /// Requirements with extras are quoted so the shell does not glob the brackets.
    pub fn render(&self, install_command: &str) -> String {
        match self {
            Self::Package(name) if name.contains('[') || name.contains(']') => {
                format!("{install_command} \"{name}\"")
            }
            Self::Package(name) => format!("{install_command} {name}"),
            Self::Source(url) => format!("{install_command} {url}"),
        }
    }
}

/// Collect the install directives declared in `source`.
///
/// A missing closing marker is tolerated: the list then runs to the end.
pub fn parse_dependencies(source: &str, syntax: &DependencySyntax) -> Vec<InstallDirective> {
    let mut directives = Vec::new();
    let mut inside = false;

    for line in source.lines().map(str::trim) {
        if line.starts_with(&syntax.start_marker) {
            inside = true;
            continue;
        }
        if !inside {
            continue;
        }
        if line.starts_with(&syntax.end_marker) {
            break;
        }
        if let Some(dep) = declared_identifier(line) {
            directives.push(classify(dep, syntax));
        }
    }

    directives
}

/// The first quoted string on a comment line, if any.
fn declared_identifier(line: &str) -> Option<&str> {
    if !line.starts_with('#') {
        return None;
    }
    line.split('"').nth(1).filter(|dep| !dep.is_empty())
}

fn classify(dep: &str, syntax: &DependencySyntax) -> InstallDirective {
    if dep.contains(&syntax.source_url_marker) {
        let url = dep.split_once("@ ").map_or(dep, |(_, url)| url);
        InstallDirective::Source(url.to_string())
    } else {
        InstallDirective::Package(dep.to_string())
    }
}
